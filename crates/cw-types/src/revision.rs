use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An independent fork of the format lineage.
///
/// Branched revisions pin `version` to the branch head and count their own
/// changes in `sub_version`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    /// Mainline revisions; `sub_version` is free-running.
    None,
    /// Handheld branch forked from head `0x272`.
    Leerdammer,
    /// Handheld branch forked from head `0x3e2`.
    Double11,
    /// Late branch forked from head `0x021803f9`.
    Mizuki,
}

impl Branch {
    pub const ALL: [Branch; 4] = [
        Branch::None,
        Branch::Leerdammer,
        Branch::Double11,
        Branch::Mizuki,
    ];

    /// Wire id of the branch.
    pub const fn id(self) -> u16 {
        match self {
            Self::None => 0x0000,
            Self::Leerdammer => 0x4c44,
            Self::Double11 => 0x4431,
            Self::Mizuki => 0x4d5a,
        }
    }

    /// The head version every revision on this branch carries.
    pub const fn head(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Leerdammer => 0x272,
            Self::Double11 => 0x3e2,
            Self::Mizuki => 0x021803f9,
        }
    }

    /// Latest known sub-version on this branch.
    pub const fn latest(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Leerdammer => 0x8,
            Self::Double11 => 0x87,
            Self::Mizuki => 0x21b,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Leerdammer => "leerdammer",
            Self::Double11 => "double11",
            Self::Mizuki => "mizuki",
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|branch| branch.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|branch| branch.name().eq_ignore_ascii_case(name))
    }

    /// The newest revision on this branch.
    pub const fn revision(self) -> Revision {
        Revision::new(self.head(), self.latest(), self.id())
    }
}

/// Version/sub-version/branch triple selecting the active on-disk layout.
///
/// A `Revision` is immutable for the duration of a (de)serialize call and is
/// carried alongside, never inside, a resource payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub version: u32,
    pub sub_version: u32,
    pub branch_id: u16,
}

impl Revision {
    /// Byte length of the wire record.
    pub const RECORD_LEN: usize = 10;

    pub const fn new(version: u32, sub_version: u32, branch_id: u16) -> Self {
        Self {
            version,
            sub_version,
            branch_id,
        }
    }

    /// A mainline revision with no sub-version.
    pub const fn head(version: u32) -> Self {
        Self::new(version, 0, 0)
    }

    /// Mainline revision with an explicit sub-version.
    pub const fn with_sub_version(version: u32, sub_version: u32) -> Self {
        Self::new(version, sub_version, 0)
    }

    pub fn branch(&self) -> Option<Branch> {
        Branch::from_id(self.branch_id)
    }

    /// Check that the branch id is known and the version matches its head.
    pub fn validate(&self) -> Result<Branch, TypeError> {
        let branch = self
            .branch()
            .ok_or(TypeError::UnknownBranch(self.branch_id))?;
        if branch != Branch::None && self.version != branch.head() {
            return Err(TypeError::BranchHeadMismatch {
                branch: branch.name(),
                head: branch.head(),
                version: self.version,
            });
        }
        Ok(branch)
    }

    /// Encode as `[version u32][sub_version u32][branch_id u16]`, big-endian.
    pub fn to_bytes(&self) -> [u8; Self::RECORD_LEN] {
        let mut buf = [0u8; Self::RECORD_LEN];
        buf[0..4].copy_from_slice(&self.version.to_be_bytes());
        buf[4..8].copy_from_slice(&self.sub_version.to_be_bytes());
        buf[8..10].copy_from_slice(&self.branch_id.to_be_bytes());
        buf
    }

    /// Decode the wire record.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        if data.len() < Self::RECORD_LEN {
            return Err(TypeError::InvalidLength {
                expected: Self::RECORD_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            version: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            sub_version: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            branch_id: u16::from_be_bytes([data[8], data[9]]),
        })
    }
}

impl Default for Revision {
    /// Latest mainline revision understood by every resource type in the workspace.
    fn default() -> Self {
        Self::with_sub_version(0x3f8, 0x218)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.branch() {
            Some(Branch::None) => write!(f, "r{:#x}.{:#x}", self.version, self.sub_version),
            Some(branch) => write!(
                f,
                "r{:#x}.{:#x}@{}",
                self.version,
                self.sub_version,
                branch.name()
            ),
            None => write!(
                f,
                "r{:#x}.{:#x}@{:#06x}",
                self.version, self.sub_version, self.branch_id
            ),
        }
    }
}
