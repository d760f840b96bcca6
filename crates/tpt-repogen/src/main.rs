//! `tpt-repogen` - repository-maintainer tool. Scans a directory of package
//! artifacts and emits the canonical `packages.json` this workspace's
//! Manifest Fetcher expects, or validates an existing one against the same
//! schema.
//!
//! Grounded on `.github/scripts/build-packages-json.py`/
//! `update_repository_index.py`: both scripts independently reinvent "hash
//! every root file, derive a version from its git commit count, write a
//! manifest" -- this tool is the single canonical replacement the retained
//! source's own divergence argues for.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tpt_schema::{Format, PackageDescriptor, RepositoryManifest, Source, Version};
use tracing_subscriber::EnvFilter;

const SCHEMA_VERSION: u32 = 1;
const IGNORE: &[&str] = &["LICENSE", "README.md", "packages.json", ".gitignore", ".github"];

#[derive(Debug, Parser)]
#[command(name = "tpt-repogen")]
#[command(author, version, about = "Generate or validate a TPT repository's packages.json")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan `dir` for package artifacts and (re)write `packages.json`.
    Generate {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = "packages.json")]
        out: PathBuf,
        #[arg(long)]
        base_url: String,
    },
    /// Check an existing manifest against the canonical schema.
    Validate {
        #[arg(long, default_value = "packages.json")]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Generate { dir, out, base_url } => generate(&dir, &out, &base_url),
        Commands::Validate { file } => validate(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn generate(dir: &Path, out: &Path, base_url: &str) -> Result<()> {
    let mut packages = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        if IGNORE.contains(&filename.as_str()) {
            continue;
        }

        let path = entry.path();
        let (name, format) = split_name_and_format(&filename);
        let sha256 = hash_file(path).with_context(|| format!("hashing {}", path.display()))?;
        let version = git_commit_version(path);

        packages.push(PackageDescriptor {
            name,
            version,
            source: Source::Tpt,
            format,
            download_url: Some(format!("{}/{filename}", base_url.trim_end_matches('/'))),
            sha256: Some(sha256),
            description: "TPT package".to_string(),
            keywords: vec![],
            repository_url: None,
            metadata: tpt_schema::Metadata::default(),
        });
    }

    packages.sort_by(|a, b| a.name.cmp(&b.name));
    let manifest = RepositoryManifest { schema_version: SCHEMA_VERSION, packages };
    let json = serde_json::to_string_pretty(&manifest)?;

    let existing = std::fs::read_to_string(out).ok();
    if existing.as_deref() == Some(json.as_str()) {
        println!("{} is already up to date", out.display());
        return Ok(());
    }

    std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    println!("wrote {} ({} packages)", out.display(), manifest.packages.len());
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let manifest: RepositoryManifest =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", file.display()))?;

    if manifest.schema_version != SCHEMA_VERSION {
        bail!(
            "unsupported schema_version {} (expected {SCHEMA_VERSION})",
            manifest.schema_version
        );
    }

    let mut errors = Vec::new();
    for pkg in &manifest.packages {
        if pkg.format.is_none() && pkg.download_url.is_none() {
            errors.push(format!("'{}': neither format nor download_url is set", pkg.name));
        }
    }

    if errors.is_empty() {
        println!("{} is valid ({} packages)", file.display(), manifest.packages.len());
        Ok(())
    } else {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("{} failed validation ({} error(s))", file.display(), errors.len());
    }
}

fn hash_file(path: &Path) -> Result<tpt_schema::Sha256Hex> {
    let bytes = std::fs::read(path)?;
    let digest = hex::encode(Sha256::digest(&bytes));
    tpt_schema::Sha256Hex::validated(&digest).map_err(anyhow::Error::msg)
}

/// `git rev-list --count HEAD -- <path>` as `<count>.0`, falling back to
/// `1.0` outside a git checkout or on any git failure.
fn git_commit_version(path: &Path) -> Version {
    std::process::Command::new("git")
        .args(["rev-list", "--count", "HEAD", "--"])
        .arg(path)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|count| Version::new(format!("{count}.0")))
        .unwrap_or_else(|| Version::new("1.0"))
}

fn split_name_and_format(filename: &str) -> (String, Option<Format>) {
    const RULES: &[(&str, Format)] = &[
        (".deb.xz", Format::DebXz),
        (".tar.gz", Format::Archive),
        (".tar.xz", Format::Archive),
        (".tgz", Format::Archive),
        (".deb", Format::Deb),
        (".sh", Format::Script),
        (".py", Format::Script),
        (".appimage", Format::AppImage),
        (".rpm", Format::Rpm),
        (".ps1", Format::Powershell),
        (".exe", Format::Exe),
        (".msi", Format::Msi),
        (".apk", Format::AndroidApk),
        (".zip", Format::MetaZip),
    ];
    let lower = filename.to_lowercase();
    for (suffix, format) in RULES {
        if let Some(stripped) = lower.strip_suffix(suffix) {
            let name = &filename[..stripped.len()];
            return (name.to_string(), Some(*format));
        }
    }
    (filename.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_and_format_strips_compound_suffix() {
        let (name, format) = split_name_and_format("foo.deb.xz");
        assert_eq!(name, "foo");
        assert_eq!(format, Some(Format::DebXz));
    }

    #[test]
    fn split_name_and_format_handles_unknown_extension() {
        let (name, format) = split_name_and_format("README.weird");
        assert_eq!(name, "README.weird");
        assert_eq!(format, None);
    }

    #[test]
    fn generate_then_validate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.sh"), b"#!/bin/sh\necho hi\n").unwrap();
        let out = dir.path().join("packages.json");

        generate(dir.path(), &out, "https://example.com/repo").unwrap();
        validate(&out).unwrap();

        let manifest: RepositoryManifest =
            serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(manifest.packages.len(), 1);
        assert_eq!(manifest.packages[0].name, "hello");
        assert_eq!(manifest.packages[0].format, Some(Format::Script));
    }

    #[test]
    fn validate_rejects_package_with_no_format_or_url() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("packages.json");
        let manifest = RepositoryManifest {
            schema_version: SCHEMA_VERSION,
            packages: vec![PackageDescriptor {
                name: "broken".into(),
                version: Version::unknown(),
                source: Source::Tpt,
                format: None,
                download_url: None,
                sha256: None,
                description: String::new(),
                keywords: vec![],
                repository_url: None,
                metadata: tpt_schema::Metadata::default(),
            }],
        };
        std::fs::write(&out, serde_json::to_string(&manifest).unwrap()).unwrap();
        assert!(validate(&out).is_err());
    }
}
