//! Encrypted fragment assembly.
//!
//! A `FAR4` archive is shipped as a run of fragment files. The archive body
//! (everything but the trailing magic) is cut into `fragment_size` chunks,
//! each encrypted independently under its index. The final fragment carries
//! a big-endian CRC-32 of its ciphertext as a 4-byte footer. Assembly strips
//! the footer, decrypts, concatenates and appends the magic again.
//!
//! Missing or short non-final fragments are zero-filled and reported as
//! [`SkippedRange`]s. The final fragment holds the table, so losing it is
//! fatal.

use std::io::ErrorKind;
use std::ops::Range;
use std::path::Path;

use cw_crypto::FragmentCipher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ArchiveError, ArchiveResult};
use crate::fat::{ArchiveKind, TRAILER_LEN};
use crate::reader::Archive;

/// Default plaintext bytes per fragment.
pub const FRAGMENT_SIZE: usize = 0x10_0000;

/// Largest accepted fragment size.
pub const MAX_FRAGMENT_SIZE: usize = 0x400_0000;

/// CRC-32 footer on the final fragment.
pub const FOOTER_LEN: usize = 4;

/// FAT offsets are `u32`, so no assembled archive can be larger.
const MAX_ARCHIVE_LEN: usize = u32::MAX as usize;

/// Bytes of the assembled archive that no fragment supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRange {
    pub fragment: u32,
    pub start: u64,
    pub end: u64,
}

impl SkippedRange {
    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Decrypted archive bytes plus what assembly could not recover.
#[derive(Clone, Debug)]
pub struct Assembled {
    pub bytes: Vec<u8>,
    pub skipped: Vec<SkippedRange>,
}

impl Assembled {
    pub fn open(self) -> ArchiveResult<Archive> {
        Archive::from_decrypted(self.bytes, self.skipped)
    }
}

/// Splits archives into encrypted fragments and puts them back together.
#[derive(Clone, Debug)]
pub struct FragmentCodec {
    cipher: FragmentCipher,
    fragment_size: usize,
}

impl Default for FragmentCodec {
    fn default() -> Self {
        Self::new(FragmentCipher::default())
    }
}

impl FragmentCodec {
    pub fn new(cipher: FragmentCipher) -> Self {
        Self {
            cipher,
            fragment_size: FRAGMENT_SIZE,
        }
    }

    /// Use `size` plaintext bytes per fragment, clamped to
    /// `1..=MAX_FRAGMENT_SIZE`.
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        let clamped = size.clamp(1, MAX_FRAGMENT_SIZE);
        if clamped != size {
            warn!(requested = size, used = clamped, "fragment size out of range");
        }
        self.fragment_size = clamped;
        self
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Encrypt a `FAR4` archive into fragments.
    pub fn split(&self, archive: &[u8]) -> ArchiveResult<Vec<Vec<u8>>> {
        if archive.len() < TRAILER_LEN {
            return Err(ArchiveError::format(0, "too short for an archive trailer"));
        }
        let body_len = archive.len() - 4;
        if ArchiveKind::from_magic(&archive[body_len..]) != Some(ArchiveKind::Far4) {
            return Err(ArchiveError::format(body_len, "only FAR4 archives are fragmented"));
        }

        let chunks: Vec<&[u8]> = archive[..body_len].chunks(self.fragment_size).collect();
        u32::try_from(chunks.len()).map_err(|_| ArchiveError::TooLarge {
            size: archive.len() as u64,
        })?;
        let last = chunks.len() - 1;

        let fragments = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let mut fragment = chunk.to_vec();
                self.cipher.encrypt(index as u32, &mut fragment);
                if index == last {
                    let crc = crc32fast::hash(&fragment);
                    fragment.extend_from_slice(&crc.to_be_bytes());
                }
                fragment
            })
            .collect::<Vec<_>>();
        debug!(fragments = fragments.len(), fragment_size = self.fragment_size, "split archive");
        Ok(fragments)
    }

    /// Decrypt and concatenate fragments in index order.
    ///
    /// `None` marks a fragment that could not be read.
    pub fn assemble(&self, fragments: &[Option<Vec<u8>>]) -> ArchiveResult<Assembled> {
        let Some((last, body)) = fragments.split_last() else {
            return Err(ArchiveError::format(0, "no fragments"));
        };
        let size = self.fragment_size;
        let final_offset = body
            .len()
            .checked_mul(size)
            .filter(|&offset| offset <= MAX_ARCHIVE_LEN)
            .ok_or_else(|| {
                let count = fragments.len();
                ArchiveError::format(
                    0,
                    format!("{count} fragments of {size} bytes exceed the archive size limit"),
                )
            })?;
        let final_index = u32::try_from(body.len())
            .map_err(|_| ArchiveError::format(0, "too many fragments"))?;

        let last = last
            .as_deref()
            .ok_or_else(|| ArchiveError::format(final_offset, "final fragment is missing"))?;
        if last.len() < FOOTER_LEN {
            return Err(ArchiveError::format(final_offset, "final fragment has no footer"));
        }
        let (ciphertext, footer) = last.split_at(last.len() - FOOTER_LEN);
        let total = final_offset + ciphertext.len() + TRAILER_LEN;
        if ciphertext.len() > size || total > MAX_ARCHIVE_LEN {
            return Err(ArchiveError::format(
                final_offset,
                format!("final fragment holds {} bytes, more than {size}", ciphertext.len()),
            ));
        }
        let mut expected = [0u8; FOOTER_LEN];
        expected.copy_from_slice(footer);
        let expected = u32::from_be_bytes(expected);
        let actual = crc32fast::hash(ciphertext);
        if expected != actual {
            return Err(ArchiveError::FragmentChecksum {
                index: final_index,
                expected,
                actual,
            });
        }

        let mut bytes = Vec::with_capacity(final_offset + ciphertext.len() + 4);
        let mut skipped = Vec::new();
        for (index, fragment) in body.iter().enumerate() {
            let index = index as u32;
            let start = bytes.len();
            if let Some(data) = fragment {
                if data.len() > size {
                    return Err(ArchiveError::format(
                        start,
                        format!("fragment {index} holds {} bytes, more than {size}", data.len()),
                    ));
                }
                bytes.extend_from_slice(data);
                self.cipher.decrypt(index, &mut bytes[start..]);
            }

            let present = bytes.len() - start;
            if present < size {
                bytes.resize(start + size, 0);
                let range = SkippedRange {
                    fragment: index,
                    start: (start + present) as u64,
                    end: (start + size) as u64,
                };
                warn!(
                    fragment = index,
                    start = range.start,
                    end = range.end,
                    "skipping unreadable archive fragment"
                );
                skipped.push(range);
            }
        }

        bytes.extend_from_slice(ciphertext);
        self.cipher.decrypt(final_index, &mut bytes[final_offset..]);
        bytes.extend_from_slice(ArchiveKind::Far4.magic());
        debug!(
            fragments = fragments.len(),
            bytes = bytes.len(),
            skipped = skipped.len(),
            "assembled archive"
        );
        Ok(Assembled { bytes, skipped })
    }

    /// Assemble fragments and parse the result.
    pub fn open(&self, fragments: &[Option<Vec<u8>>]) -> ArchiveResult<Archive> {
        self.assemble(fragments)?.open()
    }
}

/// Read fragment files in order. A file that does not exist yields `None`;
/// any other I/O failure is returned.
pub fn read_fragment_files<P: AsRef<Path>>(paths: &[P]) -> ArchiveResult<Vec<Option<Vec<u8>>>> {
    paths
        .iter()
        .map(|path| match std::fs::read(path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.as_ref().display(), "fragment file is missing");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        })
        .collect()
}
