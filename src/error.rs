//! Error types for comment-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific failures (upstream API errors, pagination overruns, signing)
//! - Ambient failures (network, serialization, I/O) with `#[from]` conversions
//! - The fatal/isolated split used by the export pipeline: outer-loop errors
//!   abort the export, per-thread errors skip a single reply thread

use thiserror::Error;

/// Result type alias for comment-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for comment-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// The API reported a non-zero status code inside a 200 response
    ///
    /// Bilibili multiplexes application errors inside successful HTTP
    /// responses; the envelope's `code` field is authoritative.
    #[error("upstream error from {endpoint}: code {code}: {message}")]
    Upstream {
        /// Which endpoint produced the error (e.g. "view", "main", "reply", "nav")
        endpoint: String,
        /// The application status code from the response envelope
        code: i64,
        /// The message carried in the response envelope
        message: String,
    },

    /// A response parsed as JSON but did not carry the expected envelope shape
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Which endpoint produced the response
        endpoint: String,
        /// What was missing or wrong
        reason: String,
    },

    /// A pagination loop exceeded its safety ceiling
    ///
    /// Treated as a protocol anomaly (e.g. a non-advancing cursor), not a
    /// transient fault.
    #[error("pagination overrun on {context}: exceeded {limit} pages")]
    PaginationOverrun {
        /// Which loop overran (e.g. "main comments", "thread 123456")
        context: String,
        /// The page ceiling that was exceeded
        limit: u32,
    },

    /// WBI key derivation failed or produced an empty mixin key
    #[error("signing error: {0}")]
    Signing(String),

    /// Gzip output was requested but the `gzip` feature is compiled out
    #[error("gzip compression requested but no gzip implementation is available")]
    CompressionUnavailable,

    /// The export was cancelled before completion
    #[error("export cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "request_interval")
        key: Option<String>,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable error code for event payloads and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Upstream { .. } => "upstream_error",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::PaginationOverrun { .. } => "pagination_overrun",
            Error::Signing(_) => "signing_error",
            Error::CompressionUnavailable => "compression_unavailable",
            Error::Cancelled => "cancelled",
            Error::Config { .. } => "config_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
        }
    }
}
