//! Configuration types for comment-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// API endpoint and credential configuration
///
/// Groups settings related to how the Bilibili web API is reached.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the web API (default: "https://api.bilibili.com")
    ///
    /// Overridable so tests and proxies can point the client elsewhere.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Referer header sent with every request (default: "https://www.bilibili.com/")
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Session cookie string, if the embedding application has one
    ///
    /// Some comment spaces return partial data without a logged-in session.
    /// Login itself is out of scope; the cookie is taken as-is.
    #[serde(default)]
    pub cookie: Option<String>,

    /// Per-request timeout (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            referer: default_referer(),
            cookie: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Request pacing and pagination bounds
///
/// Groups the politeness contract with the platform: how often requests may
/// be issued and how far pagination may run before it is treated as a
/// protocol anomaly. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum interval between any two network calls (default: 300ms)
    ///
    /// This is a rate-limit contract, not a tuning knob; shortening it risks
    /// upstream throttling or bans.
    #[serde(default = "default_request_interval")]
    pub request_interval: Duration,

    /// Page size for reply-thread pages (default: 20)
    #[serde(default = "default_sub_page_size")]
    pub sub_page_size: u32,

    /// Hard ceiling on pages fetched by any single pagination loop (default: 5000)
    ///
    /// Guards against the platform returning a non-advancing cursor forever.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_interval: default_request_interval(),
            sub_page_size: default_sub_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

/// Output artifact configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Gzip-compress the serialized document (default: false)
    #[serde(default)]
    pub gzip: bool,

    /// Pretty-print the JSON document with two-space indentation (default: true)
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Directory used by [`export_to_dir`](crate::CommentExporter::export_to_dir)
    /// when no explicit directory is given (default: "./exports")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            gzip: false,
            pretty: true,
            output_dir: default_output_dir(),
        }
    }
}

/// Main configuration for [`CommentExporter`](crate::CommentExporter)
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — endpoints, credentials, timeouts
/// - [`pacing`](PacingConfig) — request interval and pagination ceilings
/// - [`output`](OutputConfig) — compression and artifact placement
///
/// All sub-config fields are flattened for serialization, so the JSON/TOML
/// format stays flat (no nesting).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// API endpoint and credential settings
    #[serde(flatten)]
    pub api: ApiConfig,

    /// Request pacing and pagination bounds
    #[serde(flatten)]
    pub pacing: PacingConfig,

    /// Output artifact settings
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Comment space type (default: 1, video comment spaces)
    #[serde(default = "default_comment_type")]
    pub comment_type: u32,

    /// Sort mode for the main comment listing (default: 2, by time)
    #[serde(default = "default_sort_mode")]
    pub sort_mode: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            pacing: PacingConfig::default(),
            output: OutputConfig::default(),
            comment_type: default_comment_type(),
            sort_mode: default_sort_mode(),
        }
    }
}

impl Config {
    /// Validate configuration values that would silently break the pipeline
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.pacing.sub_page_size == 0 {
            return Err(crate::error::Error::Config {
                message: "sub_page_size must be at least 1".to_string(),
                key: Some("sub_page_size".to_string()),
            });
        }
        if self.pacing.max_pages == 0 {
            return Err(crate::error::Error::Config {
                message: "max_pages must be at least 1".to_string(),
                key: Some("max_pages".to_string()),
            });
        }
        if self.api.base_url.is_empty() {
            return Err(crate::error::Error::Config {
                message: "base_url must not be empty".to_string(),
                key: Some("base_url".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.bilibili.com".to_string()
}

fn default_referer() -> String {
    "https://www.bilibili.com/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_interval() -> Duration {
    Duration::from_millis(300)
}

fn default_sub_page_size() -> u32 {
    20
}

fn default_max_pages() -> u32 {
    5000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_comment_type() -> u32 {
    1
}

fn default_sort_mode() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_pacing() {
        let config = Config::default();
        assert_eq!(config.pacing.request_interval, Duration::from_millis(300));
        assert_eq!(config.pacing.sub_page_size, 20);
        assert_eq!(config.pacing.max_pages, 5000);
        assert_eq!(config.comment_type, 1);
        assert_eq!(config.sort_mode, 2);
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_page_size_fails_validation() {
        let mut config = Config::default();
        config.pacing.sub_page_size = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "config_error");
        assert!(err.to_string().contains("sub_page_size"));
    }

    #[test]
    fn zero_max_pages_fails_validation() {
        let mut config = Config::default();
        config.pacing.max_pages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_base_url_fails_validation() {
        let mut config = Config::default();
        config.api.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        // An empty JSON object should deserialize into the full default config
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api.base_url, "https://api.bilibili.com");
        assert_eq!(config.pacing.sub_page_size, 20);
        assert!(config.output.pretty);
        assert!(!config.output.gzip);
    }

    #[test]
    fn flattened_fields_round_trip() {
        let mut config = Config::default();
        config.output.gzip = true;
        config.api.cookie = Some("SESSDATA=abc".to_string());

        let json = serde_json::to_string(&config).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        // flatten keeps the serialized form flat
        assert_eq!(parsed["gzip"], true);
        assert_eq!(parsed["cookie"], "SESSDATA=abc");

        let back: Config = serde_json::from_str(&json).unwrap();
        assert!(back.output.gzip);
        assert_eq!(back.api.cookie.as_deref(), Some("SESSDATA=abc"));
    }
}
