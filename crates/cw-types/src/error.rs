use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown branch id {0:#06x}")]
    UnknownBranch(u16),

    #[error("revision {version:#x} does not belong to branch {branch} (head {head:#x})")]
    BranchHeadMismatch {
        branch: &'static str,
        head: u32,
        version: u32,
    },

    #[error("unknown compression flag bits {0:#04x}")]
    UnknownCompressionFlags(u8),

    #[error("unknown resource type {0}")]
    UnknownResourceType(u32),
}
