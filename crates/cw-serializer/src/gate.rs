//! Revision gate: decides whether a field is present in the active layout.
//!
//! Field presence is data, not control flow. Each revision-dependent field
//! declares a table of [`FieldRule`]s and the serializer evaluates it through
//! [`include`]. A field with no rules is always present; a field with rules is
//! present when any one of them passes.

use cw_types::{Branch, Revision};

/// Which part of the active revision a rule's bounds are compared with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Head {
    #[default]
    Version,
    SubVersion,
    /// `(sub_version, version)` compared lexicographically.
    Packed,
}

impl Head {
    fn of(self, revision: &Revision) -> u64 {
        match self {
            Self::Version => u64::from(revision.version),
            Self::SubVersion => u64::from(revision.sub_version),
            Self::Packed => pack(revision.sub_version, revision.version),
        }
    }
}

const fn pack(sub_version: u32, version: u32) -> u64 {
    ((sub_version as u64) << 32) | version as u64
}

/// One presence rule for a field.
///
/// A rule passes when every populated bound holds:
/// - `branch` is unset or equals the active branch id,
/// - `min` is unset or `head >= min`,
/// - `max` is unset or `head <= max`,
///
/// where `head` is the part of the active revision selected by [`Head`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldRule {
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub branch: Option<u16>,
    pub head: Head,
}

impl FieldRule {
    /// A rule with no bounds; passes for every revision.
    pub const ANY: Self = Self {
        min: None,
        max: None,
        branch: None,
        head: Head::Version,
    };

    /// Present from `version` onwards.
    pub const fn min(version: u32) -> Self {
        Self {
            min: Some(version as u64),
            ..Self::ANY
        }
    }

    /// Present up to and including `version`.
    pub const fn max(version: u32) -> Self {
        Self {
            max: Some(version as u64),
            ..Self::ANY
        }
    }

    /// Present for versions in `[min, max]`.
    pub const fn range(min: u32, max: u32) -> Self {
        Self {
            min: Some(min as u64),
            max: Some(max as u64),
            ..Self::ANY
        }
    }

    /// Present once the sub-version passes `sub_version`, or equals it with
    /// a version of at least `version`.
    pub const fn packed_min(sub_version: u32, version: u32) -> Self {
        Self {
            min: Some(pack(sub_version, version)),
            head: Head::Packed,
            ..Self::ANY
        }
    }

    /// Compare bounds against the sub-version instead of the version.
    pub const fn sub_version(self) -> Self {
        Self {
            head: Head::SubVersion,
            ..self
        }
    }

    /// Restrict the rule to one branch.
    pub const fn on_branch(self, branch: Branch) -> Self {
        Self {
            branch: Some(branch.id()),
            ..self
        }
    }

    pub fn passes(&self, revision: &Revision) -> bool {
        let head = self.head.of(revision);
        let branch = self.branch.map_or(true, |id| id == revision.branch_id);
        let min = self.min.map_or(true, |min| head >= min);
        let max = self.max.map_or(true, |max| head <= max);
        branch && min && max
    }
}

/// Whether a field guarded by `rules` is present at `revision`.
pub fn include(rules: &[FieldRule], revision: &Revision) -> bool {
    rules.is_empty() || rules.iter().any(|rule| rule.passes(revision))
}
