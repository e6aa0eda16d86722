use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a session log into messages.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transcript {path} has no readable entries ({lines} malformed lines)")]
    Malformed { path: PathBuf, lines: usize },
}

/// Failure reading from or writing to a transcript store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("message encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Failure of one background sync run (parse, merge, re-read).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("sync worker failed: {0}")]
    Worker(String),
}
