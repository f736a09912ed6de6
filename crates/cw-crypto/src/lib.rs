//! Cryptographic primitives for the Craftworld toolkit.
//!
//! Provides streaming SHA-1 content hashing and the block cipher applied to
//! archive fragments before any structural parsing.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod cipher;
pub mod hasher;

pub use cipher::{FragmentCipher, BLOCK_SIZE, DEFAULT_KEY};
pub use hasher::ContentHasher;
