use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cache mount {path} does not exist")]
    MissingCacheMount { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
