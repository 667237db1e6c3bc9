//! Concurrent fetch-and-store over a fixed-size worker pool.
//!
//! Keeps up to `workers` retrievals in flight; when one finishes the next
//! queued candidate starts, until the queue is drained. Each retrieval is
//! isolated: a network or filesystem error marks only that record `failed`.
//! `fetch_all` returns only after every dispatched task has settled.

use anyhow::Result;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

use crate::http::{classify, FailureKind, Fetcher};
use crate::record::{DownloadRecord, TransitionError};
use crate::storage;
use crate::url_model::derive_filename;
use crate::validate::AcceptedCandidate;

/// Default worker pool size.
pub const DEFAULT_WORKERS: usize = 5;

/// Retrieves every candidate into `dir` using at most `workers` concurrent tasks.
///
/// Records come back in the same order as `candidates`. Only failure to create
/// `dir` itself is an error; everything per-item is reported through the records.
pub async fn fetch_all(
    candidates: Vec<AcceptedCandidate>,
    dir: &Path,
    workers: usize,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Vec<DownloadRecord>> {
    storage::ensure_dir(dir)?;
    let workers = workers.max(1);
    let urls: Vec<Url> = candidates.iter().map(|c| c.url.clone()).collect();
    let mut slots: Vec<Option<DownloadRecord>> = vec![None; urls.len()];
    let mut queue: VecDeque<(usize, AcceptedCandidate)> =
        candidates.into_iter().enumerate().collect();

    tracing::info!(count = urls.len(), workers, dir = %dir.display(), "fetch stage started");

    let mut join_set = JoinSet::new();
    loop {
        while join_set.len() < workers {
            let Some((index, candidate)) = queue.pop_front() else {
                break;
            };
            let dir = dir.to_path_buf();
            let fetcher = Arc::clone(&fetcher);
            join_set.spawn(async move {
                let url = candidate.url.clone();
                let record =
                    tokio::task::spawn_blocking(move || fetch_one(candidate, &dir, fetcher.as_ref()))
                        .await
                        .unwrap_or_else(|e| {
                            tracing::warn!(url = %url, error = %e, "fetch task panicked");
                            failed_record(url, FailureKind::Other)
                        });
                (index, record)
            });
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        match res {
            Ok((index, record)) => slots[index] = Some(record),
            Err(e) => tracing::warn!(error = %e, "fetch task join failed"),
        }
    }

    let records: Vec<DownloadRecord> = slots
        .into_iter()
        .zip(urls)
        .map(|(slot, url)| slot.unwrap_or_else(|| failed_record(url, FailureKind::Other)))
        .collect();
    Ok(records)
}

/// Fetches (unless validation already did) and stores one candidate.
pub fn fetch_one(candidate: AcceptedCandidate, dir: &Path, fetcher: &dyn Fetcher) -> DownloadRecord {
    let AcceptedCandidate { url, body } = candidate;
    let bytes = match body {
        Some(bytes) => bytes,
        None => match fetcher.get(url.as_str()) {
            Ok(body) => body.bytes,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "download failed");
                return failed_record(url, classify(&e));
            }
        },
    };

    let name = derive_filename(&url);
    let mut record = DownloadRecord::pending(url);
    let outcome = match storage::store_unique(dir, &name, &bytes) {
        Ok(path) => {
            tracing::debug!(url = %record.url, path = %path.display(), bytes = bytes.len(), "stored");
            record.mark_downloaded(path, bytes.len() as u64)
        }
        Err(e) => {
            tracing::warn!(url = %record.url, name = %name, error = %e, "could not store download");
            record.mark_failed(FailureKind::Storage)
        }
    };
    log_transition(outcome);
    record
}

fn failed_record(url: Url, kind: FailureKind) -> DownloadRecord {
    let mut record = DownloadRecord::pending(url);
    log_transition(record.mark_failed(kind));
    record
}

fn log_transition(outcome: Result<(), TransitionError>) {
    if let Err(e) = outcome {
        tracing::error!(error = %e, "record transition rejected");
    }
}
