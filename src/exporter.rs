//! Export orchestration
//!
//! [`CommentExporter`] drives the full pipeline for one video: resolve the
//! resource id, derive the signing key, walk the main listing, enrich every
//! top-level comment with its rebuilt reply subtree, assemble the export
//! document, serialize, compress, and hand the artifact back (or write it to
//! disk). Consumers observe progress through a broadcast event channel and
//! get exactly one terminal event per run.

use crate::client::{BiliClient, ReplyApi};
use crate::compress::{Compression, compress};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pacer::Pacer;
use crate::pagination;
use crate::tree;
use crate::types::{Event, ExportArtifact, ExportDocument, ExportMeta};
use crate::wbi;
use chrono::SecondsFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Uncompressed outputs past this size get a warning event
const LARGE_OUTPUT_BYTES: usize = 8_000_000;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Exports the full comment tree of a video into a JSON (optionally gzip)
/// artifact
///
/// Cloneable — all state is shared behind `Arc`s, so clones observe the same
/// cancellation token and event channel.
#[derive(Clone)]
pub struct CommentExporter {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Upstream API implementation (trait object so tests can inject one)
    api: Arc<dyn ReplyApi>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Cancellation signal checked before every network call
    cancel: CancellationToken,
    /// Politeness limiter shared by every network call of this exporter
    pacer: Arc<Pacer>,
}

impl std::fmt::Debug for CommentExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentExporter")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl CommentExporter {
    /// Create an exporter backed by the live web API
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(BiliClient::new(&config.api)?);
        Ok(Self::assemble(config, api))
    }

    /// Create an exporter with an injected API implementation
    ///
    /// This is the seam the test suites use; production code normally calls
    /// [`CommentExporter::new`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_api(config: Config, api: Arc<dyn ReplyApi>) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, api))
    }

    fn assemble(config: Config, api: Arc<dyn ReplyApi>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let pacer = Arc::new(Pacer::new(config.pacing.request_interval));
        Self {
            config: Arc::new(config),
            api,
            event_tx,
            cancel: CancellationToken::new(),
            pacer,
        }
    }

    /// Subscribe to progress and terminal events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// A handle that cancels any in-flight export when triggered
    ///
    /// Cancellation is observed before the next network call; the run unwinds
    /// with [`Error::Cancelled`] and nothing is written to disk.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel any in-flight export
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Export the full comment tree of `bvid` and return the artifact
    ///
    /// Emits one event per paginated call and exactly one terminal event:
    /// [`Event::Completed`] on success or [`Event::Failed`] on a fatal error.
    /// Per-thread failures are isolated (the thread is skipped with an
    /// [`Event::ThreadSkipped`] warning); failures while resolving the
    /// resource, deriving the signing key, or walking the main listing abort
    /// the run.
    pub async fn export(&self, bvid: &str) -> Result<ExportArtifact> {
        match self.run(bvid).await {
            Ok(artifact) => {
                info!(
                    bvid,
                    filename = %artifact.filename,
                    main_total = artifact.document.meta.main_total,
                    sub_total = artifact.document.meta.sub_total_fetched,
                    "export finished"
                );
                self.event_tx
                    .send(Event::Completed {
                        filename: artifact.filename.clone(),
                        main_total: artifact.document.meta.main_total,
                        sub_total_fetched: artifact.document.meta.sub_total_fetched,
                        all_total_fetched: artifact.document.meta.all_total_fetched,
                    })
                    .ok();
                Ok(artifact)
            }
            Err(err) => {
                warn!(bvid, error = %err, "export failed");
                self.event_tx
                    .send(Event::Failed {
                        code: err.error_code().to_string(),
                        error: err.to_string(),
                    })
                    .ok();
                Err(err)
            }
        }
    }

    /// Export and persist the artifact into the configured output directory
    ///
    /// See [`CommentExporter::export_to_dir`].
    pub async fn export_to_default_dir(&self, bvid: &str) -> Result<(PathBuf, ExportArtifact)> {
        let dir = self.config.output.output_dir.clone();
        self.export_to_dir(bvid, &dir).await
    }

    /// Export and persist the artifact into `dir`
    ///
    /// The file is only written after the whole pipeline succeeded; a fatal
    /// failure leaves no partial file behind.
    pub async fn export_to_dir(
        &self,
        bvid: &str,
        dir: &Path,
    ) -> Result<(PathBuf, ExportArtifact)> {
        let artifact = self.export(bvid).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&artifact.filename);
        tokio::fs::write(&path, &artifact.bytes).await?;
        info!(path = %path.display(), bytes = artifact.bytes.len(), "artifact written");
        Ok((path, artifact))
    }

    async fn run(&self, bvid: &str) -> Result<ExportArtifact> {
        let config = &self.config;
        info!(bvid, "starting comment export");

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.pacer.pace().await;
        let oid = self.api.resolve_oid(bvid).await?;
        self.event_tx
            .send(Event::ResourceResolved {
                bvid: bvid.to_string(),
                oid,
            })
            .ok();

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.pacer.pace().await;
        let (img_key, sub_key) = self.api.wbi_keys().await?;
        let mixin_key = wbi::mixin_key(&img_key, &sub_key)?;
        self.event_tx.send(Event::SignerReady).ok();

        let listing = pagination::collect_main_pages(
            self.api.as_ref(),
            &self.pacer,
            &self.cancel,
            &self.event_tx,
            config,
            oid,
            &mixin_key,
        )
        .await?;
        info!(main_total = listing.comments.len(), "main listing complete");

        let mut comments = listing.comments;
        let mut sub_total: usize = 0;
        for index in 0..comments.len() {
            let root = comments[index].rpid;
            let fetched = pagination::collect_thread_replies(
                self.api.as_ref(),
                &self.pacer,
                &self.cancel,
                &self.event_tx,
                config,
                oid,
                root,
                sub_total,
            )
            .await;
            match fetched {
                Ok(fragments) => {
                    sub_total += fragments.len();
                    comments[index].children = tree::build_thread(root, fragments);
                }
                Err(err @ (Error::Cancelled | Error::PaginationOverrun { .. })) => {
                    return Err(err);
                }
                Err(err) => {
                    // Partial-failure isolation at thread granularity: one
                    // broken thread must not cost the whole export
                    warn!(%root, error = %err, "skipping reply thread");
                    self.event_tx
                        .send(Event::ThreadSkipped {
                            root,
                            error: err.to_string(),
                        })
                        .ok();
                }
            }
        }

        let main_total = comments.len() as u64;
        let sub_total_fetched = sub_total as u64;
        let meta = ExportMeta {
            bvid: bvid.to_string(),
            oid,
            comment_type: config.comment_type,
            mode: config.sort_mode,
            main_total,
            sub_total_fetched,
            all_total_fetched: main_total + sub_total_fetched,
            cursor_all_count: listing.cursor_all_count,
            sub_page_size: config.pacing.sub_page_size,
            sleep_ms: config.pacing.request_interval.as_millis() as u64,
            generated_at: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let document = ExportDocument { meta, comments };

        let json = if config.output.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };

        let compression = if config.output.gzip {
            Compression::Gzip
        } else {
            Compression::None
        };
        if compression == Compression::None && json.len() > LARGE_OUTPUT_BYTES {
            warn!(bytes = json.len(), "large uncompressed output");
            self.event_tx
                .send(Event::LargeOutput { bytes: json.len() })
                .ok();
        }
        if compression == Compression::Gzip {
            self.event_tx.send(Event::Compressing).ok();
        }
        let bytes = compress(&json, compression)?;

        let filename = format!(
            "comments_{}_{}{}",
            bvid,
            compression.label(),
            compression.file_suffix()
        );
        Ok(ExportArtifact {
            filename,
            document,
            bytes,
            gzip: compression == Compression::Gzip,
        })
    }
}
