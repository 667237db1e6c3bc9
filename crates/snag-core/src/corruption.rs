//! Destructive post-archive stage: empty every stored file, then delete or keep
//! the whole batch on a single decision.
//!
//! The stage is a typestate: an [`IntactBatch`] can only be corrupted, a
//! [`CorruptedBatch`] can only be finalized, and a [`FinalizedBatch`] is done.
//! Truncation happens before the decision is asked for, so once a batch is
//! corrupted the original bytes are gone whichever way the decision goes;
//! "retain" keeps the zero-length files on disk.
//!
//! A failure on one file (truncate or delete) is logged and that record is
//! left where it was; the rest of the batch carries on.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use crate::record::{DownloadRecord, RecordStatus, StatusCounts};

/// The single external decision applied to an entire corrupted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Remove every corrupted file.
    Accept,
    /// Leave the (now empty) files in place.
    Decline,
}

/// Records as the fetch stage left them.
#[derive(Debug)]
pub struct IntactBatch {
    records: Vec<DownloadRecord>,
}

#[derive(Debug)]
pub struct CorruptedBatch {
    records: Vec<DownloadRecord>,
    skipped: usize,
}

#[derive(Debug)]
pub struct FinalizedBatch {
    pub decision: Decision,
    pub records: Vec<DownloadRecord>,
    /// Records whose truncation or removal failed and were left untouched.
    pub skipped: usize,
}

impl IntactBatch {
    pub fn new(records: Vec<DownloadRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[DownloadRecord] {
        &self.records
    }

    /// Truncates every `downloaded` file to zero length in place.
    ///
    /// Irreversible. Records in any other status are carried through untouched.
    pub fn corrupt(self) -> CorruptedBatch {
        let mut records = self.records;
        let mut skipped = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.status() == RecordStatus::Downloaded)
        {
            let Some(path) = record.path.clone() else {
                skipped += 1;
                continue;
            };
            match truncate(&path) {
                Ok(()) => match record.advance(RecordStatus::Corrupted) {
                    Ok(()) => record.bytes = 0,
                    Err(e) => {
                        tracing::error!(error = %e, "record transition rejected");
                        skipped += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not truncate file; skipping");
                    skipped += 1;
                }
            }
        }
        let batch = CorruptedBatch { records, skipped };
        tracing::info!(
            corrupted = StatusCounts::of(&batch.records).corrupted,
            skipped = batch.skipped,
            "batch corrupted"
        );
        batch
    }
}

impl CorruptedBatch {
    pub fn records(&self) -> &[DownloadRecord] {
        &self.records
    }

    /// Number of downloaded records that could not be truncated.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Applies `decision` to every corrupted record at once.
    pub fn finalize(self, decision: Decision) -> FinalizedBatch {
        let mut records = self.records;
        let mut skipped = self.skipped;
        for record in records
            .iter_mut()
            .filter(|r| r.status() == RecordStatus::Corrupted)
        {
            let next = match decision {
                Decision::Decline => RecordStatus::Retained,
                Decision::Accept => {
                    let removed = match record.path.as_deref() {
                        Some(path) => remove(path),
                        None => Ok(()),
                    };
                    if let Err(e) = removed {
                        tracing::warn!(url = %record.url, error = %e, "could not delete file; skipping");
                        skipped += 1;
                        continue;
                    }
                    RecordStatus::Deleted
                }
            };
            if let Err(e) = record.advance(next) {
                tracing::error!(error = %e, "record transition rejected");
                skipped += 1;
            }
        }
        let counts = StatusCounts::of(&records);
        tracing::info!(
            ?decision,
            deleted = counts.deleted,
            retained = counts.retained,
            skipped,
            "batch finalized"
        );
        FinalizedBatch {
            decision,
            records,
            skipped,
        }
    }
}

fn truncate(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.set_len(0)?;
    file.sync_all()
}

/// Removing a file that is already gone still reaches the intended end state.
fn remove(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
