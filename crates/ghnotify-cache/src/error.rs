use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading or persisting the cache.
///
/// Each variant carries the path it was working on so the caller can
/// tell the user which file is broken.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Could not determine the user cache directory")]
    NoCacheDir,
}

pub type Result<T> = std::result::Result<T, CacheError>;
