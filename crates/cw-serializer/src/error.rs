use cw_types::{Revision, TypeError};
use thiserror::Error;

/// Errors raised while encoding or decoding a resource payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SerializerError {
    /// Malformed payload: bad length prefix, truncated buffer, unknown tag.
    #[error("format error at offset {offset}: {reason}")]
    Format { offset: usize, reason: String },

    /// The revision/branch combination does not select any known layout.
    #[error("unsupported revision {revision}: {source}")]
    UnsupportedRevision {
        revision: Revision,
        #[source]
        source: TypeError,
    },

    /// Re-serializing a decoded value did not reproduce the original bytes.
    #[error("re-serialization diverged at byte {offset}: expected {expected} bytes, got {actual}")]
    Consistency {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    #[error("container error: {0}")]
    Container(String),
}

impl SerializerError {
    pub fn format(offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to the format family (bad bytes or bad revision).
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::UnsupportedRevision { .. })
    }
}

/// Result alias for serializer operations.
pub type SerializerResult<T> = Result<T, SerializerError>;
