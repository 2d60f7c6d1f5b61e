use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("visit {0} is not in the outbox")]
    NotQueued(String),

    #[error("{0}")]
    Other(String),
}
