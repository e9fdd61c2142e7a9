use thiserror::Error;

/// All the ways a sync cycle can go wrong
///
/// Lower layers keep their own error types; we wrap them so the context
/// survives up to the binary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    Api(#[from] ghnotify_api::ApiError),

    #[error("Cache error: {0}")]
    Cache(#[from] ghnotify_cache::CacheError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing GitHub token: set github.token in the config file or GITHUB_TOKEN")]
    MissingToken,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Failure category for log lines. Only API errors carry a useful one.
    pub fn kind(&self) -> ghnotify_api::ErrorKind {
        match self {
            Error::Api(e) => ghnotify_api::classify(e),
            _ => ghnotify_api::ErrorKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghnotify_api::{ApiError, ErrorKind};

    #[test]
    fn test_kind_follows_api_error() {
        let err = Error::from(ApiError::NotFound("octo/gone".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::ConfigError("bad".into());
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
