//! Error types for the ytd library.

use thiserror::Error;

/// Errors that can occur while resolving, downloading or merging a video.
#[derive(Error, Debug)]
pub enum Error {
    /// No acceptable video or audio variant in the catalog.
    #[error("no suitable {kind} format found")]
    FormatSelection {
        /// Which half of the selection failed ("video" or "audio").
        kind: &'static str,
    },

    /// Metadata or stream resolution failed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream copy failed mid-flight.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The external muxer could not be started or exited unsuccessfully.
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A specialized `Result` type for ytd operations.
pub type Result<T> = std::result::Result<T, Error>;
