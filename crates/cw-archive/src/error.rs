use cw_store::StoreError;
use cw_types::ContentHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("malformed archive at offset {offset}: {reason}")]
    Format { offset: u64, reason: String },

    #[error("decrypted archive failed its sanity check: {0}")]
    Crypto(String),

    #[error("CRC32 mismatch in fragment {index}: footer {expected:08x}, computed {actual:08x}")]
    FragmentChecksum { index: u32, expected: u32, actual: u32 },

    #[error("entry not found in archive: {0}")]
    EntryNotFound(ContentHash),

    #[error("archive exceeds the 32-bit offset range ({size} bytes)")]
    TooLarge { size: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            offset: offset as u64,
            reason: reason.into(),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
