//! HTTP client for the Bilibili web API
//!
//! All endpoints answer with a JSON envelope `{code, message, data}` and
//! multiplex application errors inside transport-level 200 responses, so the
//! envelope's `code` field is checked on every call. The [`ReplyApi`] trait
//! is the seam the pagination and export layers depend on; tests inject a
//! synthetic implementation instead of the real [`BiliClient`].

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{Comment, ReplyId};
use crate::wbi;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Browser-like user agent; the comment endpoints reject obvious bots
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Response envelope shared by every endpoint
#[derive(Clone, Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Deserialize JSON `null` as the type's default
///
/// The platform serializes empty reply lists as `"replies": null`.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Payload of the resource-lookup endpoint
#[derive(Clone, Debug, Default, Deserialize)]
struct ViewData {
    #[serde(default)]
    aid: u64,
}

/// Payload of the profile-info endpoint, reduced to the WBI key material
#[derive(Clone, Debug, Default, Deserialize)]
struct NavData {
    #[serde(default)]
    wbi_img: WbiImg,
}

/// The two rotating image URLs whose filename stems form the mixin key
#[derive(Clone, Debug, Default, Deserialize)]
struct WbiImg {
    #[serde(default)]
    img_url: String,
    #[serde(default)]
    sub_url: String,
}

/// One raw comment record as the platform serializes it
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawReply {
    /// Unique comment id
    #[serde(default)]
    pub rpid: u64,
    /// Author's user id
    #[serde(default)]
    pub mid: u64,
    /// Author profile block
    #[serde(default)]
    pub member: RawMember,
    /// Message body block
    #[serde(default)]
    pub content: RawContent,
    /// Like count
    #[serde(default)]
    pub like: u64,
    /// Creation time, Unix seconds
    #[serde(default)]
    pub ctime: i64,
    /// Thread root id, 0 for top-level comments
    #[serde(default)]
    pub root: u64,
    /// Direct parent id, 0 for top-level comments
    #[serde(default)]
    pub parent: u64,
    /// Display-control block carrying location and relative-time labels
    #[serde(default)]
    pub reply_control: ReplyControl,
}

/// Author profile block of a raw comment record
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawMember {
    /// Display name
    #[serde(default)]
    pub uname: String,
    /// Avatar URL
    #[serde(default)]
    pub avatar: String,
}

/// Message body block of a raw comment record
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawContent {
    /// Raw message text
    #[serde(default)]
    pub message: String,
}

/// Display-control block of a raw comment record
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReplyControl {
    /// Approximate geolocation label (e.g. "IP属地：北京"), may be absent
    #[serde(default)]
    pub location: String,
    /// Relative-time label (e.g. "142天前发布"), may be absent
    #[serde(default)]
    pub time_desc: String,
}

impl RawReply {
    /// Shape a raw record into an export [`Comment`] with an empty subtree
    pub fn into_comment(self) -> Comment {
        Comment {
            rpid: ReplyId::new(self.rpid),
            mid: self.mid,
            uname: self.member.uname,
            avatar: self.member.avatar,
            message: self.content.message,
            like: self.like,
            ctime: self.ctime,
            time_desc: self.reply_control.time_desc,
            location: self.reply_control.location,
            root: ReplyId::new(self.root),
            parent: ReplyId::new(self.parent),
            children: Vec::new(),
        }
    }
}

/// One page of the signed main-comment listing
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MainPageData {
    /// Cursor state for the next page
    #[serde(default)]
    pub cursor: MainCursor,
    /// Top-level comment batch, in platform order
    #[serde(default, deserialize_with = "null_as_default")]
    pub replies: Vec<RawReply>,
}

/// Cursor block of a main-comment page
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MainCursor {
    /// Whether the stream is exhausted
    #[serde(default)]
    pub is_end: bool,
    /// Platform-reported total comment count hint
    #[serde(default)]
    pub all_count: u64,
    /// Token container for the next page
    #[serde(default)]
    pub pagination_reply: PaginationReply,
}

/// Next-offset container inside the main cursor
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaginationReply {
    /// Opaque token for the next page, empty at the end
    #[serde(default)]
    pub next_offset: String,
}

/// One page of a thread's reply listing
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReplyPageData {
    /// Page bookkeeping
    #[serde(default)]
    pub page: ReplyPageInfo,
    /// Reply batch for this page
    #[serde(default, deserialize_with = "null_as_default")]
    pub replies: Vec<RawReply>,
}

/// Page bookkeeping of a reply listing
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReplyPageInfo {
    /// Total reply count for the thread
    #[serde(default)]
    pub count: u64,
}

/// Parameters of one signed main-listing request
#[derive(Clone, Debug)]
pub struct MainPageQuery {
    /// Resolved resource id
    pub oid: u64,
    /// Comment space type
    pub comment_type: u32,
    /// Sort mode
    pub sort_mode: u32,
    /// Opaque pagination token, empty for the first page
    pub offset: String,
    /// Derived mixin key used to sign the request
    pub mixin_key: String,
}

/// Parameters of one unsigned reply-page request
#[derive(Clone, Copy, Debug)]
pub struct ReplyPageQuery {
    /// Resolved resource id
    pub oid: u64,
    /// Comment space type
    pub comment_type: u32,
    /// The thread's root comment id
    pub root: ReplyId,
    /// Page size (1 for the probe)
    pub page_size: u32,
    /// 1-based page number
    pub page: u32,
}

/// The four upstream operations the export pipeline needs
///
/// [`BiliClient`] is the production implementation; tests drive the pipeline
/// with synthetic implementations instead of a live server.
#[async_trait]
pub trait ReplyApi: Send + Sync {
    /// Fetch the two WBI key fragments from the profile-info endpoint
    async fn wbi_keys(&self) -> Result<(String, String)>;

    /// Resolve a human-facing video id to the internal resource id
    async fn resolve_oid(&self, bvid: &str) -> Result<u64>;

    /// Fetch one signed page of the main comment listing
    async fn main_page(&self, query: &MainPageQuery) -> Result<MainPageData>;

    /// Fetch one unsigned page of a thread's replies
    async fn reply_page(&self, query: &ReplyPageQuery) -> Result<ReplyPageData>;
}

/// Production [`ReplyApi`] over the Bilibili web API
pub struct BiliClient {
    http: reqwest::Client,
    base_url: String,
}

impl BiliClient {
    /// Build a client from API configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the underlying HTTP client cannot be
    /// constructed (e.g. an invalid cookie header value).
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json, text/plain, */*"),
        );
        let referer = reqwest::header::HeaderValue::from_str(&config.referer).map_err(|e| {
            Error::Config {
                message: format!("invalid referer header: {e}"),
                key: Some("referer".to_string()),
            }
        })?;
        headers.insert(reqwest::header::REFERER, referer);
        if let Some(cookie) = &config.cookie {
            let value = reqwest::header::HeaderValue::from_str(cookie).map_err(|e| {
                Error::Config {
                    message: format!("invalid cookie header: {e}"),
                    key: Some("cookie".to_string()),
                }
            })?;
            headers.insert(reqwest::header::COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {e}"),
                key: None,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a URL and unwrap the response envelope
    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        url: String,
    ) -> Result<T> {
        debug!(endpoint, %url, "GET");
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                endpoint: endpoint.to_string(),
                code: i64::from(status.as_u16()),
                message: format!("HTTP {status}"),
            });
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if envelope.code != 0 {
            return Err(Error::Upstream {
                endpoint: endpoint.to_string(),
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope.data.ok_or_else(|| Error::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: "envelope has no data field".to_string(),
        })
    }
}

#[async_trait]
impl ReplyApi for BiliClient {
    async fn wbi_keys(&self) -> Result<(String, String)> {
        let url = format!("{}/x/web-interface/nav", self.base_url);
        let nav: NavData = self.get_data("nav", url).await?;
        if nav.wbi_img.img_url.is_empty() || nav.wbi_img.sub_url.is_empty() {
            return Err(Error::Signing(
                "nav response carried no wbi image urls".to_string(),
            ));
        }
        let img_key = wbi::key_fragment(&nav.wbi_img.img_url)?;
        let sub_key = wbi::key_fragment(&nav.wbi_img.sub_url)?;
        Ok((img_key, sub_key))
    }

    async fn resolve_oid(&self, bvid: &str) -> Result<u64> {
        let url = format!(
            "{}/x/web-interface/view?bvid={}",
            self.base_url,
            urlencoding::encode(bvid)
        );
        let view: ViewData = self.get_data("view", url).await?;
        if view.aid == 0 {
            return Err(Error::MalformedResponse {
                endpoint: "view".to_string(),
                reason: format!("no aid for bvid {bvid}"),
            });
        }
        Ok(view.aid)
    }

    async fn main_page(&self, query: &MainPageQuery) -> Result<MainPageData> {
        let pagination_str = serde_json::json!({ "offset": query.offset }).to_string();
        let params = [
            ("oid", query.oid.to_string()),
            ("type", query.comment_type.to_string()),
            ("mode", query.sort_mode.to_string()),
            ("pagination_str", pagination_str),
            ("plat", "1".to_string()),
            ("seek_rpid", String::new()),
            ("web_location", "1315875".to_string()),
        ];
        let signed = wbi::sign(&params, &query.mixin_key);
        let url = format!("{}/x/v2/reply/wbi/main?{}", self.base_url, signed);
        self.get_data("main", url).await
    }

    async fn reply_page(&self, query: &ReplyPageQuery) -> Result<ReplyPageData> {
        let url = format!(
            "{}/x/v2/reply/reply?oid={}&type={}&root={}&ps={}&pn={}&web_location=333.788",
            self.base_url, query.oid, query.comment_type, query.root, query.page_size, query.page
        );
        self.get_data("reply", url).await
    }
}
