//! `cwtool.toml` settings.
//!
//! ```toml
//! compression = 7
//! output = "json"
//! fragment_size = 1048576
//!
//! [revision]
//! version = 0x272
//! sub_version = 8
//! branch = "leerdammer"
//! ```

use std::path::Path;

use anyhow::{anyhow, Context};
use cw_archive::FRAGMENT_SIZE;
use cw_types::{Branch, CompressionFlags, Revision};
use serde::Deserialize;

use crate::cli::OutputFormat;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub revision: RevisionConfig,
    /// Compression flag byte used when re-encoding.
    pub compression: u8,
    pub output: OutputFormat,
    pub fragment_size: usize,
}

/// Target revision for bare payloads and re-encoding.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RevisionConfig {
    pub version: u32,
    pub sub_version: u32,
    /// Branch name: `none`, `leerdammer`, `double11` or `mizuki`.
    pub branch: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            revision: RevisionConfig::default(),
            compression: CompressionFlags::ALL.bits(),
            output: OutputFormat::Text,
            fragment_size: FRAGMENT_SIZE,
        }
    }
}

impl Default for RevisionConfig {
    fn default() -> Self {
        let revision = Revision::default();
        Self {
            version: revision.version,
            sub_version: revision.sub_version,
            branch: Branch::None.name().to_string(),
        }
    }
}

impl ToolConfig {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// The configured revision, validated against its branch.
    pub fn revision(&self) -> anyhow::Result<Revision> {
        let branch = Branch::from_name(&self.revision.branch)
            .ok_or_else(|| anyhow!("unknown branch {:?}", self.revision.branch))?;
        let revision = Revision::new(self.revision.version, self.revision.sub_version, branch.id());
        revision.validate()?;
        Ok(revision)
    }

    pub fn compression(&self) -> anyhow::Result<CompressionFlags> {
        Ok(CompressionFlags::from_bits(self.compression)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolConfig::load(&dir.path().join("cwtool.toml")).unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.revision().unwrap(), Revision::default());
        assert_eq!(config.compression().unwrap(), CompressionFlags::ALL);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ToolConfig::parse("output = \"json\"\n").unwrap();
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.compression, 7);
        assert_eq!(config.fragment_size, FRAGMENT_SIZE);
    }

    #[test]
    fn branch_revision_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cwtool.toml");
        std::fs::write(
            &path,
            "[revision]\nversion = 0x272\nsub_version = 8\nbranch = \"Leerdammer\"\n",
        )
        .unwrap();
        let config = ToolConfig::load(&path).unwrap();
        assert_eq!(config.revision().unwrap(), Branch::Leerdammer.revision());
    }

    #[test]
    fn invalid_settings_are_errors() {
        let config = ToolConfig::parse("compression = 9\n[revision]\nbranch = \"cheddar\"\n").unwrap();
        assert!(config.revision().is_err());
        assert!(config.compression().is_err());

        let mismatched = ToolConfig::parse("[revision]\nversion = 0x300\nbranch = \"mizuki\"\n").unwrap();
        assert!(mismatched.revision().is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(ToolConfig::parse("compression = [").is_err());
    }
}
