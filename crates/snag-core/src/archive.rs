//! Zip packaging of stored files.
//!
//! Every record whose file is currently archivable (`downloaded`, or
//! `corrupted` before finalization) is stored flat under its base name.
//! `failed` records are skipped silently; a file that vanished or cannot be
//! read is logged and skipped without failing the archive. Each file is read
//! and hashed before its entry is started, so a bad source never leaves a
//! half-written entry behind.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::checksum::HashingReader;
use crate::record::DownloadRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    /// Name inside the archive (the source's base name).
    pub name: String,
    pub source: PathBuf,
    pub size: u64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub sha256: String,
}

/// What went into one archive. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveManifest {
    pub archive_path: PathBuf,
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveManifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Sidecar path for the JSON manifest: `images.zip` -> `images.json`.
    pub fn json_path(&self) -> PathBuf {
        self.archive_path.with_extension("json")
    }

    /// Writes the manifest as pretty JSON next to the archive.
    pub fn write_json(&self) -> Result<PathBuf> {
        let path = self.json_path();
        let json = serde_json::to_string_pretty(self).context("serialize archive manifest")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write manifest {}", path.display()))?;
        Ok(path)
    }
}

/// Reads a stored file fully, hashing it on the way in.
fn read_source(source: &Path) -> io::Result<(Vec<u8>, String, u64)> {
    let mut reader = HashingReader::new(File::open(source)?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let (sha256, size) = reader.finish();
    Ok((bytes, sha256, size))
}

/// Writes `archive_path` containing every archivable record's file.
///
/// Stored rather than deflated: the payload is already-compressed image data.
/// If writing the archive itself fails, the partial file is removed.
pub fn build_archive(records: &[DownloadRecord], archive_path: &Path) -> Result<ArchiveManifest> {
    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let out = File::create(archive_path)
        .with_context(|| format!("failed to create archive {}", archive_path.display()))?;

    match write_entries(out, records) {
        Ok(entries) => {
            tracing::info!(
                path = %archive_path.display(),
                entries = entries.len(),
                "archive written"
            );
            Ok(ArchiveManifest {
                archive_path: archive_path.to_path_buf(),
                entries,
            })
        }
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(archive_path) {
                tracing::warn!(path = %archive_path.display(), error = %rm, "could not remove partial archive");
            }
            Err(e)
        }
    }
}

fn write_entries(out: File, records: &[DownloadRecord]) -> Result<Vec<ArchiveEntry>> {
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut names: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for record in records.iter().filter(|r| r.status().is_archivable()) {
        let Some(source) = record.path.as_deref() else {
            continue;
        };
        let Some(name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if names.contains(&name) {
            tracing::warn!(name = %name, path = %source.display(), "duplicate base name; skipping");
            continue;
        }

        let (bytes, sha256, size) = match read_source(source) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(path = %source.display(), error = %e, "cannot read stored file; skipping");
                continue;
            }
        };

        zip.start_file(name.clone(), options)
            .with_context(|| format!("failed to start archive entry {name}"))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write archive entry {name}"))?;
        tracing::debug!(name = %name, size, "archived");
        names.insert(name.clone());
        entries.push(ArchiveEntry {
            name,
            source: source.to_path_buf(),
            size,
            sha256,
        });
    }

    zip.finish().context("failed to finish archive")?;
    Ok(entries)
}
