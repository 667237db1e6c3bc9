//! Download records and their status machine.
//!
//! ```text
//! pending ──► downloaded ──► corrupted ──► deleted
//!    │            │                  └──► retained
//!    └──► failed ◄┘
//! ```
//! Transitions only move forward; `failed`, `deleted` and `retained` are terminal.

use std::path::PathBuf;
use url::Url;

use crate::http::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Pending,
    Downloaded,
    Failed,
    Corrupted,
    Deleted,
    Retained,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Downloaded => "downloaded",
            RecordStatus::Failed => "failed",
            RecordStatus::Corrupted => "corrupted",
            RecordStatus::Deleted => "deleted",
            RecordStatus::Retained => "retained",
        }
    }

    /// Whether the stored file belongs in an archive built right now.
    pub fn is_archivable(self) -> bool {
        matches!(self, RecordStatus::Downloaded | RecordStatus::Corrupted)
    }

    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Pending, Downloaded)
                | (Pending, Failed)
                | (Downloaded, Failed)
                | (Downloaded, Corrupted)
                | (Corrupted, Deleted)
                | (Corrupted, Retained)
        )
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal record transition {from} -> {to}")]
pub struct TransitionError {
    pub from: RecordStatus,
    pub to: RecordStatus,
}

/// One retrieval: source URL, where it landed, and how far it got.
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub url: Url,
    /// Claimed local path; `None` until a path has been claimed.
    pub path: Option<PathBuf>,
    pub bytes: u64,
    /// Why the record failed, when it did.
    pub failure: Option<FailureKind>,
    status: RecordStatus,
}

impl DownloadRecord {
    pub fn pending(url: Url) -> Self {
        Self {
            url,
            path: None,
            bytes: 0,
            failure: None,
            status: RecordStatus::Pending,
        }
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Moves to `next` if the status machine allows it.
    pub fn advance(&mut self, next: RecordStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_downloaded(&mut self, path: PathBuf, bytes: u64) -> Result<(), TransitionError> {
        self.advance(RecordStatus::Downloaded)?;
        self.path = Some(path);
        self.bytes = bytes;
        Ok(())
    }

    pub fn mark_failed(&mut self, kind: FailureKind) -> Result<(), TransitionError> {
        self.advance(RecordStatus::Failed)?;
        self.failure = Some(kind);
        Ok(())
    }
}

/// Per-status counts over a record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub corrupted: usize,
    pub deleted: usize,
    pub retained: usize,
}

impl StatusCounts {
    pub fn of(records: &[DownloadRecord]) -> Self {
        let mut c = Self::default();
        for r in records {
            match r.status() {
                RecordStatus::Pending => c.pending += 1,
                RecordStatus::Downloaded => c.downloaded += 1,
                RecordStatus::Failed => c.failed += 1,
                RecordStatus::Corrupted => c.corrupted += 1,
                RecordStatus::Deleted => c.deleted += 1,
                RecordStatus::Retained => c.retained += 1,
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DownloadRecord {
        DownloadRecord::pending(Url::parse("https://example.com/a.png").unwrap())
    }

    #[test]
    fn happy_path_through_corruption() {
        let mut r = record();
        r.mark_downloaded(PathBuf::from("/tmp/a.png"), 10).unwrap();
        assert_eq!(r.status(), RecordStatus::Downloaded);
        assert_eq!(r.bytes, 10);
        r.advance(RecordStatus::Corrupted).unwrap();
        r.advance(RecordStatus::Retained).unwrap();
        assert!(r.advance(RecordStatus::Deleted).is_err());
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut r = record();
        r.mark_failed(FailureKind::Timeout).unwrap();
        assert_eq!(r.failure, Some(FailureKind::Timeout));
        let err = r.advance(RecordStatus::Downloaded).unwrap_err();
        assert_eq!(err.from, RecordStatus::Failed);
        assert_eq!(err.to, RecordStatus::Downloaded);
    }

    #[test]
    fn no_skipping_or_going_back() {
        let mut r = record();
        assert!(r.advance(RecordStatus::Corrupted).is_err());
        r.mark_downloaded(PathBuf::from("x"), 1).unwrap();
        assert!(r.advance(RecordStatus::Pending).is_err());
        assert!(r.advance(RecordStatus::Deleted).is_err());
        r.advance(RecordStatus::Corrupted).unwrap();
        assert!(r.advance(RecordStatus::Failed).is_err());
    }

    #[test]
    fn archivable_statuses() {
        assert!(RecordStatus::Downloaded.is_archivable());
        assert!(RecordStatus::Corrupted.is_archivable());
        assert!(!RecordStatus::Failed.is_archivable());
        assert!(!RecordStatus::Pending.is_archivable());
    }

    #[test]
    fn counts() {
        let mut a = record();
        a.mark_downloaded(PathBuf::from("a"), 1).unwrap();
        let mut b = record();
        b.mark_failed(FailureKind::Other).unwrap();
        let c = StatusCounts::of(&[a, b, record()]);
        assert_eq!((c.downloaded, c.failed, c.pending), (1, 1, 1));
    }
}
