//! `snag run` – the full pipeline, optionally followed by the corruption stage.

use anyhow::{Context, Result};
use snag_core::config::SnagConfig;
use snag_core::corruption::{Decision, FinalizedBatch, IntactBatch};
use snag_core::pipeline::{Pipeline, RunSummary};
use snag_core::prompt::{ask_decision, DEFAULT_MAX_ATTEMPTS};
use snag_core::record::{DownloadRecord, StatusCounts};
use snag_core::report::write_gallery;
use std::path::Path;
use url::Url;

/// How the corruption stage gets its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptMode {
    /// Prompt on the terminal.
    Ask,
    Assume(Decision),
}

const QUESTION: &str =
    "Every downloaded file has been emptied and its contents are gone. Delete the files";

pub async fn run_pipeline(
    cfg: &SnagConfig,
    base_dir: &Path,
    pages: Vec<Url>,
    gallery: &Path,
    corrupt: Option<CorruptMode>,
) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg, base_dir)?;
    let mut summary = pipeline.run(pages).await?;

    let listed = write_gallery(&summary.accepted, gallery, cfg.max_items)?;
    print_summary(&summary);
    println!("gallery: {} ({} listed)", gallery.display(), listed);

    if let Some(mode) = corrupt {
        let records = std::mem::take(&mut summary.records);
        let done = tokio::task::spawn_blocking(move || corrupt_and_finalize(records, mode))
            .await
            .context("corruption task failed")??;
        print_finalized(&done);
    }
    Ok(())
}

fn corrupt_and_finalize(records: Vec<DownloadRecord>, mode: CorruptMode) -> Result<FinalizedBatch> {
    let corrupted = IntactBatch::new(records).corrupt();
    println!(
        "corrupted: {} file(s) emptied, {} skipped",
        StatusCounts::of(corrupted.records()).corrupted,
        corrupted.skipped()
    );
    let decision = match mode {
        CorruptMode::Assume(decision) => decision,
        CorruptMode::Ask => {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            ask_decision(&mut input, &mut output, QUESTION, DEFAULT_MAX_ATTEMPTS)?
        }
    };
    Ok(corrupted.finalize(decision))
}

fn print_summary(summary: &RunSummary) {
    let counts = summary.counts();
    println!(
        "pages: {} rendered, {} failed",
        summary.pages_rendered, summary.pages_failed
    );
    println!(
        "candidates: {} found, {} off-domain, {} rejected by validation, {} accepted",
        summary.found,
        summary.domain_rejected,
        summary.validation_rejected,
        summary.accepted.len()
    );
    println!(
        "downloads: {} stored, {} failed",
        counts.downloaded, counts.failed
    );
    match &summary.manifest {
        Some(m) => println!(
            "archive: {} ({} file(s), {} bytes)",
            m.archive_path.display(),
            m.len(),
            m.total_bytes()
        ),
        None => println!("archive: not written"),
    }
}

fn print_finalized(done: &FinalizedBatch) {
    let counts = StatusCounts::of(&done.records);
    match done.decision {
        Decision::Accept => println!("deleted: {} file(s)", counts.deleted),
        Decision::Decline => println!("retained: {} empty file(s)", counts.retained),
    }
    if done.skipped > 0 {
        println!("skipped: {} file(s), see log", done.skipped);
    }
}
