//! Archive fragment cipher.
//!
//! Fragments are encrypted with AES-128 in counter mode under a fixed key.
//! Each fragment restarts the keystream from an IV derived from its index, so
//! fragments can be decrypted independently and in any order.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Shared key material baked into every archive producer.
pub const DEFAULT_KEY: [u8; 16] = [
    0x2a, 0xfd, 0xa3, 0xca, 0x86, 0x02, 0x19, 0xb3, 0x6f, 0x98, 0x31, 0x5d, 0x57, 0x3c, 0x5e, 0x86,
];

const NONCE: [u8; 8] = *b"CWFRAGv1";

/// Symmetric fragment cipher with fixed key material.
#[derive(Clone)]
pub struct FragmentCipher {
    key: [u8; 16],
}

impl FragmentCipher {
    pub const fn new(key: [u8; 16]) -> Self {
        Self { key }
    }

    /// Decrypt fragment `index` in place.
    pub fn decrypt(&self, index: u32, data: &mut [u8]) {
        self.apply(index, data);
    }

    /// Encrypt fragment `index` in place.
    pub fn encrypt(&self, index: u32, data: &mut [u8]) {
        self.apply(index, data);
    }

    fn apply(&self, index: u32, data: &mut [u8]) {
        let iv = Self::iv(index);
        let mut cipher = Aes128Ctr::new(&self.key.into(), &iv.into());
        cipher.apply_keystream(data);
    }

    fn iv(index: u32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..8].copy_from_slice(&NONCE);
        iv[8..12].copy_from_slice(&index.to_be_bytes());
        iv
    }
}

impl Default for FragmentCipher {
    fn default() -> Self {
        Self::new(DEFAULT_KEY)
    }
}

impl std::fmt::Debug for FragmentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("FragmentCipher").finish_non_exhaustive()
    }
}
