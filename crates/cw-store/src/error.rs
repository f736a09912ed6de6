use cw_types::ContentHash;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required argument was missing or empty.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// No entry or blob matches the lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// Blob bytes do not hash to the address they are stored under.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },

    /// A persisted database could not be parsed.
    #[error("corrupt database at offset {offset}: {reason}")]
    CorruptDatabase { offset: usize, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptDatabase {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
