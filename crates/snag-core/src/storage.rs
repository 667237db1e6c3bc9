//! Collision-free file creation in the download directory.
//!
//! Workers run on real OS threads, so "does the path exist?" followed by
//! "create it" would race. Claiming uses `create_new`, which the filesystem
//! performs atomically: exactly one worker wins each name and the others move
//! on to the next `_<n>` suffix.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::url_model::{fit_name, split_extension, NAME_MAX};

/// Upper bound on suffixes tried for one name before giving up.
const MAX_SUFFIX: u32 = 100_000;

/// Candidate name for attempt `n`: the name itself, then `stem_1.ext`, `stem_2.ext`, ...
///
/// The stem is shortened as needed so every candidate fits in [`NAME_MAX`] bytes.
pub fn suffixed_name(name: &str, n: u32) -> String {
    if n == 0 {
        return fit_name(name, NAME_MAX);
    }
    let suffix = format!("_{n}");
    let fitted = fit_name(name, NAME_MAX - suffix.len());
    let (stem, ext) = split_extension(&fitted);
    format!("{stem}{suffix}{ext}")
}

/// Creates and returns the first free path in `dir` for `name`.
///
/// The returned file is newly created and empty; no other claimant can get the same path.
pub fn claim_unique_path(dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    for n in 0..=MAX_SUFFIX {
        let path = dir.join(suffixed_name(name, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {name} in {}", dir.display()),
    ))
}

/// Claims a path for `name` and writes `bytes` to it. Returns the final path.
///
/// If the write fails the claimed file is removed so no partial file is left behind.
pub fn store_unique(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let (path, mut file) = claim_unique_path(dir, name)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        if let Err(rm) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %rm, "could not remove partial file");
        }
        return Err(e);
    }
    Ok(path)
}

/// Creates the download directory (and parents) if needed.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create download dir {}", dir.display()))
}
