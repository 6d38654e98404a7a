//! # comment-dl
//!
//! Backend library for exporting the full comment tree of a Bilibili video
//! into a self-contained JSON (optionally gzip) archive.
//!
//! ## Design Philosophy
//!
//! comment-dl is designed to be:
//! - **Polite by contract** - One paced request at a time, never concurrent fetches
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use comment_dl::{CommentExporter, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.output.gzip = true;
//!
//!     let exporter = CommentExporter::new(config)?;
//!
//!     // Subscribe to progress events
//!     let mut events = exporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event}");
//!         }
//!     });
//!
//!     let (path, _artifact) = exporter.export_to_default_dir("BV1xx411c7mD").await?;
//!     println!("saved to {}", path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP client for the Bilibili web API
pub mod client;
/// Output compression
pub mod compress;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Export orchestration
pub mod exporter;
/// Request pacing with a fixed minimum interval
pub mod pacer;
/// Pagination loops over the comment hierarchy
pub mod pagination;
/// Reply-tree reconstruction
pub mod tree;
/// Core types and events
pub mod types;
/// WBI request signing
pub mod wbi;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_api;

// Re-export commonly used types
pub use client::{BiliClient, ReplyApi};
pub use compress::Compression;
pub use config::{ApiConfig, Config, OutputConfig, PacingConfig};
pub use error::{Error, Result};
pub use exporter::CommentExporter;
pub use types::{
    Comment, Event, ExportArtifact, ExportDocument, ExportMeta, PageCursor, ReplyId,
};

/// Helper function to run one export with graceful signal handling.
///
/// Races the export against a termination signal; on signal the exporter is
/// cancelled and the run ends with [`Error::Cancelled`], leaving no partial
/// file behind.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with a Ctrl+C fallback if
///   signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use comment_dl::{CommentExporter, Config, export_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let exporter = CommentExporter::new(Config::default())?;
///     let artifact = export_with_shutdown(&exporter, "BV1xx411c7mD").await?;
///     println!("{} bytes", artifact.bytes.len());
///     Ok(())
/// }
/// ```
pub async fn export_with_shutdown(
    exporter: &CommentExporter,
    bvid: &str,
) -> Result<ExportArtifact> {
    tokio::select! {
        result = exporter.export(bvid) => result,
        () = wait_for_signal() => {
            exporter.cancel();
            Err(Error::Cancelled)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
