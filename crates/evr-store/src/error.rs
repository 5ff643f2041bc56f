/// Errors from world-state and transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend failed to serve a read, write, or iteration.
    #[error("backend failure: {0}")]
    Backend(String),

    /// A key observed by the transaction was changed by a concurrent commit.
    #[error("read conflict on key '{key}': observed version {observed:?}, current {current:?}")]
    Conflict {
        key: String,
        observed: Option<u64>,
        current: Option<u64>,
    },

    /// The rich-query expression could not be parsed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the snapshot file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the world state was poisoned by a panicking writer.
    #[error("world state lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
