use thiserror::Error;

use logdash_shared::{Guid, SharedError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] logdash_store::StoreError),

    #[error("Remote API error: {0}")]
    Net(#[from] logdash_net::NetError),

    #[error(transparent)]
    Shared(#[from] SharedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown visualization: {0}")]
    UnknownVisualization(Guid),

    #[error("Unknown section: {0}")]
    UnknownSection(Guid),

    #[error("Index {index} out of range for {len} items")]
    InvalidIndex { index: usize, len: usize },

    #[error("Remote API returned {found} data for a {expected} query")]
    UnexpectedPayload {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Malformed persisted state: {0}")]
    MalformedPersistedState(String),

    #[error("Persisted state v{found} is newer than supported v{supported}")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import failed: {0}")]
    Import(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
