//! Core types and events for comment-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a comment (the platform's `rpid`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyId(pub u64);

impl ReplyId {
    /// Create a new ReplyId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Whether this is the zero sentinel the platform uses for "no parent"
    pub fn is_root_sentinel(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ReplyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ReplyId> for u64 {
    fn from(id: ReplyId) -> Self {
        id.0
    }
}

impl PartialEq<u64> for ReplyId {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<ReplyId> for u64 {
    fn eq(&self, other: &ReplyId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for ReplyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One comment node in the exported tree
///
/// Field names match the export format consumed by downstream tooling, which
/// in turn mirrors the platform's own record names (`rpid`, `mid`, `ctime`).
/// Top-level comments carry `root == 0` and `parent == 0`; their `children`
/// subtree is empty until the thread has been fetched and rebuilt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique comment id within the video's comment space
    pub rpid: ReplyId,
    /// Author's user id
    pub mid: u64,
    /// Author's display name
    pub uname: String,
    /// Author's avatar URL
    pub avatar: String,
    /// Raw message body
    pub message: String,
    /// Like count
    pub like: u64,
    /// Creation time, Unix seconds
    pub ctime: i64,
    /// Platform-supplied relative-time label (e.g. "142 days ago"), may be empty
    pub time_desc: String,
    /// Platform-supplied approximate geolocation label, may be empty
    pub location: String,
    /// Id of the thread root, 0 if this node is itself top-level
    pub root: ReplyId,
    /// Id of the comment this replies to, 0 if top-level
    pub parent: ReplyId,
    /// Nested replies, sorted by `ctime` ascending at every depth
    pub children: Vec<Comment>,
}

/// Opaque state for the outer (main comment) pagination loop
///
/// The offset token is platform-opaque; it only ever advances forward.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// Opaque pagination token, empty for the first page
    pub offset: String,
    /// Whether the platform reported the end of the stream
    pub is_end: bool,
}

impl PageCursor {
    /// Cursor for the first main-comment page
    pub fn start() -> Self {
        Self::default()
    }
}

/// Metadata block of an [`ExportDocument`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportMeta {
    /// The human-facing video identifier the export was requested for
    pub bvid: String,
    /// The resolved internal resource id
    pub oid: u64,
    /// Comment space type used for all requests
    #[serde(rename = "type")]
    pub comment_type: u32,
    /// Sort mode used for the main listing
    pub mode: u32,
    /// Number of top-level comments in the export
    pub main_total: u64,
    /// Number of reply fragments fetched across all threads
    pub sub_total_fetched: u64,
    /// main_total + sub_total_fetched
    pub all_total_fetched: u64,
    /// The platform-reported total from the main-listing cursor (latest non-zero)
    pub cursor_all_count: u64,
    /// Reply page size used for thread pagination
    pub sub_page_size: u32,
    /// Pacing interval used between network calls, milliseconds
    pub sleep_ms: u64,
    /// Generation timestamp, RFC 3339
    pub generated_at: String,
}

/// Root export artifact: metadata plus the full comment forest
///
/// Built exactly once per export run and immutable once returned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Resource identifiers, aggregate counts, and pacing parameters
    pub meta: ExportMeta,
    /// Top-level comments in platform order, each with its built subtree
    pub comments: Vec<Comment>,
}

/// Finished export: the document, its serialized (possibly gzipped) bytes,
/// and the deterministic filename derived from the video id
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    /// Deterministic output filename (`comments_{bvid}_{plain|gzip}.json[.gz]`)
    pub filename: String,
    /// The assembled document
    pub document: ExportDocument,
    /// Serialized document bytes, gzip-compressed when requested
    pub bytes: Vec<u8>,
    /// Whether `bytes` is gzip-compressed
    pub gzip: bool,
}

/// Event emitted during an export run
///
/// Subscribe via [`CommentExporter::subscribe`](crate::CommentExporter::subscribe).
/// Every paginated network call produces one event, and each run ends with
/// exactly one terminal event: [`Event::Completed`] or [`Event::Failed`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The video id was resolved to an internal resource id
    ResourceResolved {
        /// The requested video id
        bvid: String,
        /// The resolved resource id
        oid: u64,
    },

    /// WBI key material was fetched and the mixin key derived
    SignerReady,

    /// One main-comment page landed
    MainPage {
        /// 1-based page number
        page: u32,
        /// Comments in this batch
        got: usize,
        /// Top-level comments accumulated so far
        main_total: usize,
        /// Whether the platform reported end-of-stream
        is_end: bool,
    },

    /// One reply page landed for a thread
    SubPage {
        /// The thread's root comment id
        root: ReplyId,
        /// 1-based page number within the thread
        page: u32,
        /// Total pages for the thread
        pages: u32,
        /// Replies in this batch
        got: usize,
        /// Reply fragments accumulated across all threads so far
        sub_total: usize,
    },

    /// A reply thread was skipped after a probe or page failure
    ThreadSkipped {
        /// The thread's root comment id
        root: ReplyId,
        /// Why the thread was skipped
        error: String,
    },

    /// The serialized document is large and uncompressed output was requested
    LargeOutput {
        /// Serialized size in bytes
        bytes: usize,
    },

    /// The document is being gzip-compressed
    Compressing,

    /// The export finished successfully
    Completed {
        /// The artifact filename
        filename: String,
        /// Number of top-level comments
        main_total: u64,
        /// Number of reply fragments fetched
        sub_total_fetched: u64,
        /// Grand total
        all_total_fetched: u64,
    },

    /// The export aborted with a fatal error
    Failed {
        /// Machine-readable error code
        code: String,
        /// Human-readable error message
        error: String,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::ResourceResolved { bvid, oid } => write!(f, "resolved {bvid} to oid {oid}"),
            Event::SignerReady => write!(f, "wbi keys ok"),
            Event::MainPage {
                page,
                got,
                main_total,
                is_end,
            } => write!(
                f,
                "[main] page={page} got={got} main_total={main_total} is_end={is_end}"
            ),
            Event::SubPage {
                root,
                page,
                pages,
                got,
                sub_total,
            } => write!(
                f,
                "[sub] root={root} pn={page}/{pages} got={got} sub_total={sub_total}"
            ),
            Event::ThreadSkipped { root, error } => {
                write!(f, "thread {root} skipped: {error}")
            }
            Event::LargeOutput { bytes } => write!(
                f,
                "serialized output is {bytes} bytes; consider enabling gzip"
            ),
            Event::Compressing => write!(f, "compressing (gzip)"),
            Event::Completed {
                filename,
                main_total,
                sub_total_fetched,
                all_total_fetched,
            } => write!(
                f,
                "done: {filename} main={main_total} sub={sub_total_fetched} total={all_total_fetched}"
            ),
            Event::Failed { code, error } => write!(f, "failed ({code}): {error}"),
        }
    }
}
