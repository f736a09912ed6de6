//! SHA-1 content addresses.
//!
//! Archives key their FAT entries by the SHA-1 of each blob, and resource
//! references that point at content rather than a GUID carry the same 20
//! bytes. The zero hash stands for "no content" in both places.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::TypeError;

/// SHA-1 of a blob.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 20]);

impl ContentHash {
    pub const LEN: usize = 20;

    /// Hash a whole payload in one call. Use `cw_crypto::ContentHasher` to
    /// hash a stream.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hash = [0u8; Self::LEN];
        hash.copy_from_slice(&Sha1::digest(data));
        Self(hash)
    }

    /// Wrap a digest read off the wire or out of a FAT entry.
    pub const fn from_hash(digest: [u8; Self::LEN]) -> Self {
        Self(digest)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| TypeError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            })
    }

    pub const fn null() -> Self {
        Self([0; Self::LEN])
    }

    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lower-case hex; extracted blobs are written under this name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four bytes in hex, for listings and log fields.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for ContentHash {
    type Err = TypeError;

    /// Parse 40 hex digits, either case.
    fn from_str(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha1:{}", self.short_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
