//! ytd - A library for downloading online videos and merging their streams.
//!
//! A video is resolved through a [`Catalog`] into its encoded variants, the
//! best video (under a resolution ceiling) and best audio variants are
//! selected, both are fetched with live progress, and an external muxer
//! combines them into a single output file.
//!
//! # Example
//!
//! ```no_run
//! use ytd::{DownloadConfig, Downloader, YouTubeCatalog};
//!
//! # async fn example() -> ytd::Result<()> {
//! let http = YouTubeCatalog::build_http_client()?;
//! let catalog = YouTubeCatalog::new(http);
//!
//! let config = DownloadConfig::new().with_max_resolution(720);
//! let downloader = Downloader::new(catalog, config);
//!
//! let outcome = downloader.download("https://youtu.be/dQw4w9WgXcQ").await?;
//! println!("Saved {}", outcome.output.display());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod paths;
pub mod progress;
pub mod select;
pub mod transcode;
pub mod url;
pub mod variant;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use catalog::{Catalog, VariantStream, VideoInfo, YouTubeCatalog};
pub use config::{AppConfig, DownloadConfig};
pub use download::{
    Downloader, MergeOutcome, NoEvents, PipelineEvents, StepOutcome, VideoOutcome,
};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration, format_media_time};
pub use fs::{FileSystem, TokioFileSystem};
pub use paths::{ArtifactPaths, sanitize_filename};
pub use progress::{ProgressSnapshot, ProgressTracker, TrackerMode};
pub use select::{SelectionResult, select};
pub use transcode::{FfmpegTranscoder, ProgressEvent, Transcoder};
pub use variant::{EncodedVariant, MediaKind};
