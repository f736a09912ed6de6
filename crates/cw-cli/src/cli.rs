use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(
    name = "cwtool",
    about = "Craftworld toolkit: inspect archives and decode resources",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format; overrides the config file.
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// TOML configuration file. A missing file means defaults.
    #[arg(long, global = true, default_value = "cwtool.toml")]
    pub config: PathBuf,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the file allocation table of a decrypted archive
    Fat(FatArgs),
    /// Extract every recoverable entry of an archive
    Extract(ExtractArgs),
    /// Decrypt and join archive fragments
    Assemble(AssembleArgs),
    /// Decode a resource file
    Decode(DecodeArgs),
    /// Check that a resource file re-encodes byte for byte
    Verify(VerifyArgs),
    /// Print SHA-1 content hashes
    Hash(HashArgs),
}

#[derive(Args)]
pub struct FatArgs {
    pub archive: PathBuf,
}

#[derive(Args)]
pub struct ExtractArgs {
    pub archive: PathBuf,
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct AssembleArgs {
    /// Fragment files in index order; the last one carries the table.
    #[arg(required = true)]
    pub fragments: Vec<PathBuf>,
    #[arg(short, long)]
    pub out: PathBuf,
    /// Plaintext bytes per fragment; overrides the config file.
    #[arg(long)]
    pub fragment_size: Option<usize>,
}

#[derive(Args)]
pub struct DecodeArgs {
    pub resource: PathBuf,
    /// Print the decoded value as JSON.
    #[arg(long)]
    pub json: bool,
    /// Treat the input as a bare payload of this kind at the configured revision.
    #[arg(long, value_enum)]
    pub raw: Option<RawKind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RawKind {
    Level,
    Material,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub resource: PathBuf,
}

#[derive(Args)]
pub struct HashArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assemble_with_global_flags() {
        let cli = Cli::try_parse_from([
            "cwtool", "-v", "assemble", "a.000", "a.001", "--out", "a.far4", "--format", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.config, PathBuf::from("cwtool.toml"));
        match cli.command {
            Command::Assemble(args) => {
                assert_eq!(args.fragments.len(), 2);
                assert_eq!(args.out, PathBuf::from("a.far4"));
                assert_eq!(args.fragment_size, None);
            }
            _ => panic!("expected assemble"),
        }
    }

    #[test]
    fn decode_accepts_raw_kind() {
        let cli = Cli::try_parse_from(["cwtool", "decode", "x.bin", "--raw", "material"]).unwrap();
        match cli.command {
            Command::Decode(args) => {
                assert_eq!(args.raw, Some(RawKind::Material));
                assert!(!args.json);
            }
            _ => panic!("expected decode"),
        }
    }

    #[test]
    fn hash_requires_a_file() {
        assert!(Cli::try_parse_from(["cwtool", "hash"]).is_err());
    }
}
