//! Error types for linkflash-core

use std::path::PathBuf;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A flag source existed but could not be read
    #[error("failed to read flag source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Git could not be queried for build identity
    #[error("git query failed: {0}")]
    Git(String),

    /// Build metadata could not be serialized
    #[error("failed to serialize build metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// I/O error while writing build outputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration problem that must halt the build
    #[error("!!! {0} !!!")]
    FatalConfiguration(String),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
