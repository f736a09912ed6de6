use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Field-level compression switches stored in the first byte of a payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressionFlags(u8);

impl CompressionFlags {
    /// Every field is stored at fixed width.
    pub const NONE: Self = Self(0);
    /// 32-bit and 64-bit integers are stored as LEB128.
    pub const INTEGERS: Self = Self(1);
    /// Array lengths and `u32` array elements are stored as LEB128.
    pub const VECTORS: Self = Self(2);
    /// 4x4 matrices carry a presence mask and omit identity components.
    pub const MATRICES: Self = Self(4);
    pub const ALL: Self = Self(7);

    /// Parse a flag byte, rejecting unknown bits.
    pub fn from_bits(bits: u8) -> Result<Self, TypeError> {
        if bits & !Self::ALL.0 != 0 {
            return Err(TypeError::UnknownCompressionFlags(bits));
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CompressionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_each_flag() {
        assert!(CompressionFlags::ALL.contains(CompressionFlags::INTEGERS));
        assert!(CompressionFlags::ALL.contains(CompressionFlags::VECTORS));
        assert!(CompressionFlags::ALL.contains(CompressionFlags::MATRICES));
        assert!(!CompressionFlags::NONE.contains(CompressionFlags::INTEGERS));
    }

    #[test]
    fn bitor_combines() {
        let flags = CompressionFlags::INTEGERS | CompressionFlags::MATRICES;
        assert_eq!(flags.bits(), 5);
        assert!(!flags.contains(CompressionFlags::VECTORS));
    }

    #[test]
    fn from_bits_rejects_unknown() {
        assert_eq!(CompressionFlags::from_bits(3).unwrap().bits(), 3);
        assert_eq!(
            CompressionFlags::from_bits(0x08),
            Err(TypeError::UnknownCompressionFlags(0x08))
        );
    }
}
