use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use cw_archive::{read_fragment_files, Archive, FatEntry, FragmentCodec};
use cw_crypto::ContentHasher;
use cw_sdk::{DecodedResource, GfxMaterialHeader, Level, ResourceReport, Toolkit};
use cw_types::{ContentHash, ResourceType};
use serde::Serialize;
use tracing::info;

use crate::cli::*;
use crate::config::ToolConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ToolConfig::load(&cli.config)?;
    let format = cli.format.unwrap_or(config.output);
    match cli.command {
        Command::Fat(args) => cmd_fat(args, format),
        Command::Extract(args) => cmd_extract(args, format),
        Command::Assemble(args) => cmd_assemble(args, &config),
        Command::Decode(args) => cmd_decode(args, &config, format),
        Command::Verify(args) => cmd_verify(args, &config),
        Command::Hash(args) => cmd_hash(args, format),
    }
}

#[derive(Serialize)]
struct FatRow {
    hash: ContentHash,
    offset: u32,
    size: u32,
    resource_type: Option<ResourceType>,
}

fn open_archive(path: &Path) -> anyhow::Result<Archive> {
    Archive::open(path).with_context(|| format!("opening archive {}", path.display()))
}

/// The resource type named by an entry's header magic, if any.
fn sniff_type(archive: &Archive, entry: &FatEntry) -> Option<ResourceType> {
    let bytes = archive.extract(entry).ok()?;
    ResourceType::from_magic(bytes.get(..3)?)
}

fn cmd_fat(args: FatArgs, format: OutputFormat) -> anyhow::Result<()> {
    let archive = open_archive(&args.archive)?;
    let rows: Vec<FatRow> = archive
        .entries()
        .iter()
        .map(|entry| FatRow {
            hash: entry.hash,
            offset: entry.offset,
            size: entry.size,
            resource_type: sniff_type(&archive, entry),
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            println!(
                "{} {:?} archive, {} entries, {} data bytes",
                args.archive.display().to_string().bold(),
                archive.kind(),
                rows.len().to_string().bold(),
                archive.data_len()
            );
            for row in &rows {
                let kind = row
                    .resource_type
                    .map_or_else(|| "?".dimmed().to_string(), |ty| format!("{ty:?}").cyan().to_string());
                println!(
                    "  {}  {:>10}  {:>9}  {}",
                    row.hash.to_hex().yellow(),
                    row.offset,
                    row.size,
                    kind
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ExtractSummary {
    written: usize,
    lost: Vec<FatEntry>,
    corrupt: Vec<FatEntry>,
}

fn cmd_extract(args: ExtractArgs, format: OutputFormat) -> anyhow::Result<()> {
    let archive = open_archive(&args.archive)?;
    let report = archive.extract_all();
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    for (entry, bytes) in &report.recovered {
        let path = args.out.join(entry.hash.to_hex());
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    }
    info!(written = report.recovered.len(), out = %args.out.display(), "extracted archive");

    let summary = ExtractSummary {
        written: report.recovered.len(),
        lost: report.lost.clone(),
        corrupt: report.corrupt.clone(),
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!(
                "{} Extracted {} entries ({} bytes) to {}",
                "✓".green().bold(),
                summary.written,
                report.recovered_bytes(),
                args.out.display().to_string().bold()
            );
            for entry in &summary.lost {
                println!("  {} {} (skipped fragment)", "lost:".yellow(), entry.hash);
            }
            for entry in &summary.corrupt {
                println!("  {} {} (hash mismatch)", "corrupt:".red(), entry.hash);
            }
        }
    }
    Ok(())
}

fn cmd_assemble(args: AssembleArgs, config: &ToolConfig) -> anyhow::Result<()> {
    let codec = FragmentCodec::default()
        .with_fragment_size(args.fragment_size.unwrap_or(config.fragment_size));
    let fragments = read_fragment_files(&args.fragments)?;
    let assembled = codec.assemble(&fragments)?;
    std::fs::write(&args.out, &assembled.bytes)
        .with_context(|| format!("writing {}", args.out.display()))?;

    let archive = assembled.open()?;
    println!(
        "{} Assembled {} fragments into {} ({} entries)",
        "✓".green().bold(),
        fragments.len(),
        args.out.display().to_string().bold(),
        archive.len()
    );
    for range in archive.skipped() {
        println!(
            "  {} fragment {} zero-filled [{}, {})",
            "skipped:".yellow(),
            range.fragment,
            range.start,
            range.end
        );
    }
    let lost = archive.extract_all().lost.len();
    if lost > 0 {
        println!("  {} {} entries unrecoverable", "lost:".yellow(), lost);
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs, config: &ToolConfig, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.resource)
        .with_context(|| format!("reading {}", args.resource.display()))?;
    let json = args.json || format == OutputFormat::Json;

    if let Some(kind) = args.raw {
        let toolkit = Toolkit::new().with_revision(config.revision()?)?;
        let resource = match kind {
            RawKind::Level => DecodedResource::Level(toolkit.deserialize::<Level>(&bytes)?),
            RawKind::Material => {
                DecodedResource::GfxMaterial(toolkit.deserialize::<GfxMaterialHeader>(&bytes)?)
            }
        };
        if json {
            println!("{}", serde_json::to_string_pretty(&resource)?);
        } else {
            print_resource(&resource);
        }
        return Ok(());
    }

    let report = Toolkit::new().inspect(&bytes)?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ResourceReport) {
    let revision = report.revision;
    println!(
        "{:?} resource, revision {:#x}/{:#x} ({}), compression {:#04x}",
        report.resource.resource_type(),
        revision.version,
        revision.sub_version,
        revision.branch().map_or("unknown", |branch| branch.name()),
        report.compression
    );
    if !report.dependencies.is_empty() {
        println!("  {}", "dependencies:".bold());
        for dependency in &report.dependencies {
            println!("    {dependency}");
        }
    }
    print_resource(&report.resource);
}

fn print_resource(resource: &DecodedResource) {
    match resource {
        DecodedResource::Level(level) => {
            println!("  {} things, {} roots", level.graph.len(), level.graph.roots().len());
        }
        DecodedResource::GfxMaterial(material) => {
            println!("  flags {:#x}, {} textures", material.flags, material.bound_textures().count());
            for (slot, texture) in material.bound_textures() {
                println!("    [{slot}] {texture}");
            }
        }
    }
}

fn cmd_verify(args: VerifyArgs, config: &ToolConfig) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.resource)
        .with_context(|| format!("reading {}", args.resource.display()))?;
    let report = Toolkit::new().inspect(&bytes)?;
    let toolkit = Toolkit::new()
        .with_revision(report.revision)?
        .with_compression(config.compression()?);
    let encoded = match &report.resource {
        DecodedResource::Level(level) => toolkit.verify(level)?,
        DecodedResource::GfxMaterial(material) => toolkit.verify(material)?,
    };
    println!(
        "{} {} re-encodes identically ({} payload bytes)",
        "✓".green().bold(),
        args.resource.display().to_string().bold(),
        encoded.len()
    );
    Ok(())
}

#[derive(Serialize)]
struct HashRow {
    path: String,
    hash: ContentHash,
    size: u64,
}

fn hash_file(path: &Path) -> anyhow::Result<HashRow> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        size += read as u64;
    }
    Ok(HashRow {
        path: path.display().to_string(),
        hash: hasher.finalize(),
        size,
    })
}

fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let rows = args
        .files
        .iter()
        .map(|path| hash_file(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            for row in &rows {
                println!("{}  {}", row.hash.to_hex().yellow(), row.path);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_archive::{ArchiveKind, ArchiveWriter};

    #[test]
    fn hash_file_streams_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data = vec![0x42u8; 200_000];
        std::fs::write(&path, &data).unwrap();
        let row = hash_file(&path).unwrap();
        assert_eq!(row.hash, ContentHash::from_bytes(&data));
        assert_eq!(row.size, 200_000);
    }

    #[test]
    fn sniff_reads_header_magic() {
        let toolkit = Toolkit::new();
        let level = toolkit.encode_resource(&Level::default()).unwrap();
        let mut writer = ArchiveWriter::new(ArchiveKind::Farc);
        let level_entry = writer.add(&level).unwrap();
        let blob_entry = writer.add(b"no").unwrap();
        let archive = Archive::from_bytes(writer.finish_to_bytes().unwrap()).unwrap();

        assert_eq!(sniff_type(&archive, &level_entry), Some(ResourceType::Level));
        assert_eq!(sniff_type(&archive, &blob_entry), None);
    }

    #[test]
    fn extract_writes_entries_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("base.farc");
        let mut writer = ArchiveWriter::new(ArchiveKind::Farc);
        writer.add(b"first").unwrap();
        writer.add(b"second").unwrap();
        writer.finish(&archive_path).unwrap();

        let out = dir.path().join("out");
        cmd_extract(
            ExtractArgs {
                archive: archive_path,
                out: out.clone(),
            },
            OutputFormat::Json,
        )
        .unwrap();
        let written = std::fs::read(out.join(ContentHash::from_bytes(b"second").to_hex())).unwrap();
        assert_eq!(written, b"second");
    }

    #[test]
    fn assemble_writes_decrypted_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArchiveWriter::new(ArchiveKind::Far4);
        writer.add(b"fragmented payload").unwrap();
        let plain = writer.finish_to_bytes().unwrap();

        let codec = FragmentCodec::default().with_fragment_size(16);
        let mut paths = Vec::new();
        for (index, fragment) in codec.split(&plain).unwrap().into_iter().enumerate() {
            let path = dir.path().join(format!("data.{index}"));
            std::fs::write(&path, fragment).unwrap();
            paths.push(path);
        }

        let out = dir.path().join("data.far4");
        cmd_assemble(
            AssembleArgs {
                fragments: paths,
                out: out.clone(),
                fragment_size: Some(16),
            },
            &ToolConfig::default(),
        )
        .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), plain);
    }
}
