//! Stage composition: render → extract → domain filter → validate → fetch → archive.
//!
//! Rendering, extraction and validation run strictly one page / one candidate
//! at a time on a blocking thread; the fetch stage is the only concurrent
//! region. Every stage hands its result to the next by value.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::archive::{build_archive, ArchiveManifest};
use crate::config::SnagConfig;
use crate::extract::{harvest_page, CandidateSet, LinkSelector};
use crate::fetcher::fetch_all;
use crate::http::{CurlFetcher, Fetcher};
use crate::record::{DownloadRecord, StatusCounts};
use crate::render::{PageRenderer, RenderError, SessionGuard, StaticRenderer};
use crate::url_model::DomainFilter;
use crate::validate::{validate, AcceptedCandidate, ValidationOutcome, ValidationPolicy};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub selector: LinkSelector,
    /// Hub-page selector for two-level runs.
    pub follow: Option<LinkSelector>,
    pub domain: DomainFilter,
    pub policy: ValidationPolicy,
    pub workers: usize,
    /// Cap on pages rendered in one run (seeds and followed pages together).
    pub max_pages: Option<usize>,
    pub download_dir: PathBuf,
    /// No archive is written when unset.
    pub archive_path: Option<PathBuf>,
}

impl PipelineOptions {
    /// Builds options from config; relative paths are resolved against `base_dir`.
    pub fn from_config(cfg: &SnagConfig, base_dir: &Path) -> Result<Self> {
        let selector = LinkSelector::parse(&cfg.link_selector)?;
        let follow = cfg
            .follow_selector
            .as_deref()
            .map(LinkSelector::parse)
            .transpose()?;
        Ok(Self {
            selector,
            follow,
            domain: DomainFilter::new(&cfg.domain),
            policy: cfg.validation_policy(),
            workers: cfg.workers,
            max_pages: cfg.max_pages,
            download_dir: base_dir.join(&cfg.download_dir),
            archive_path: Some(base_dir.join(&cfg.archive_name)),
        })
    }
}

/// Candidates gathered from a set of pages, after the domain filter.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub pages_rendered: usize,
    pub pages_failed: usize,
    /// Unique candidates before domain filtering.
    pub found: usize,
    pub domain_rejected: usize,
    pub candidates: CandidateSet,
}

/// Full accounting of one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pages_rendered: usize,
    pub pages_failed: usize,
    pub found: usize,
    pub domain_rejected: usize,
    pub validation_rejected: usize,
    pub outcomes: Vec<ValidationOutcome>,
    pub accepted: Vec<Url>,
    pub records: Vec<DownloadRecord>,
    pub manifest: Option<ArchiveManifest>,
}

impl RunSummary {
    pub fn counts(&self) -> StatusCounts {
        StatusCounts::of(&self.records)
    }
}

struct PageBudget {
    rendered: usize,
    failed: usize,
    max: Option<usize>,
}

impl PageBudget {
    fn exhausted(&self) -> bool {
        self.max.is_some_and(|max| self.rendered + self.failed >= max)
    }

    /// Renders one page. A page-level failure is counted and yields `None`.
    fn render(&mut self, session: &mut SessionGuard, page: &Url) -> Option<String> {
        match session.render(page) {
            Ok(html) => {
                self.rendered += 1;
                tracing::debug!(page = %page, bytes = html.len(), "page rendered");
                Some(html)
            }
            Err(e) => {
                self.failed += 1;
                tracing::warn!(page = %page, error = %e, "page skipped");
                None
            }
        }
    }
}

fn dedup_pages(pages: &[Url]) -> Vec<Url> {
    let mut seen = std::collections::HashSet::new();
    pages.iter().filter(|p| seen.insert(*p)).cloned().collect()
}

/// Renders every page in turn and collects its candidates.
///
/// Only a renderer startup failure is returned as an error; a page that cannot
/// be rendered contributes nothing and the run goes on.
pub fn harvest_pages(
    renderer: &dyn PageRenderer,
    seeds: &[Url],
    opts: &PipelineOptions,
) -> Result<Harvest, RenderError> {
    let mut session = SessionGuard::start(renderer)?;
    let mut budget = PageBudget {
        rendered: 0,
        failed: 0,
        max: opts.max_pages,
    };

    let targets = match &opts.follow {
        None => dedup_pages(seeds),
        Some(follow) => {
            let mut hubs = CandidateSet::new();
            for seed in dedup_pages(seeds) {
                if budget.exhausted() {
                    break;
                }
                if let Some(html) = budget.render(&mut session, &seed) {
                    hubs = hubs.union(harvest_page(&html, &seed, follow));
                }
            }
            let (hubs, skipped) = hubs.filter_domain(&opts.domain);
            tracing::info!(pages = hubs.len(), off_domain = skipped, "followed pages collected");
            hubs.into_vec().into_iter().map(|c| c.url).collect()
        }
    };

    let mut found = CandidateSet::new();
    for page in &targets {
        if budget.exhausted() {
            tracing::info!(max_pages = ?budget.max, "page limit reached");
            break;
        }
        if let Some(html) = budget.render(&mut session, page) {
            found = found.union(harvest_page(&html, page, &opts.selector));
        }
    }

    tracing::debug!(
        selector = opts.selector.as_str(),
        attr = opts.selector.attr(),
        pages = targets.len(),
        "link extraction finished"
    );
    let total = found.len();
    let (candidates, domain_rejected) = found.filter_domain(&opts.domain);
    tracing::info!(
        pages = budget.rendered,
        failed_pages = budget.failed,
        found = total,
        domain_filter = opts.domain.is_enabled(),
        domain_rejected,
        "harvest finished"
    );
    Ok(Harvest {
        pages_rendered: budget.rendered,
        pages_failed: budget.failed,
        found: total,
        domain_rejected,
        candidates,
    })
}

/// Validates candidates one at a time. Returns every outcome and the accepted subset.
pub fn validate_candidates(
    candidates: &CandidateSet,
    fetcher: &dyn Fetcher,
    policy: &ValidationPolicy,
) -> (Vec<ValidationOutcome>, Vec<AcceptedCandidate>) {
    let mut outcomes = Vec::with_capacity(candidates.len());
    let mut accepted = Vec::new();
    for url in candidates.urls() {
        let (outcome, candidate) = validate(url, fetcher, policy);
        outcomes.push(outcome);
        accepted.extend(candidate);
    }
    (outcomes, accepted)
}

pub struct Pipeline {
    renderer: Arc<dyn PageRenderer>,
    fetcher: Arc<dyn Fetcher>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        fetcher: Arc<dyn Fetcher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            renderer,
            fetcher,
            options,
        }
    }

    /// Static renderer and curl fetcher configured from `cfg`.
    pub fn from_config(cfg: &SnagConfig, base_dir: &Path) -> Result<Self> {
        let http = cfg.http_options();
        Ok(Self::new(
            Arc::new(StaticRenderer::new(http.clone())),
            Arc::new(CurlFetcher::new(http)),
            PipelineOptions::from_config(cfg, base_dir)?,
        ))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Render and extract only; no candidate is fetched.
    pub async fn harvest(&self, pages: Vec<Url>) -> Result<Harvest> {
        let renderer = Arc::clone(&self.renderer);
        let opts = self.options.clone();
        let harvest = tokio::task::spawn_blocking(move || {
            harvest_pages(renderer.as_ref(), &pages, &opts)
        })
        .await
        .context("harvest task failed")??;
        Ok(harvest)
    }

    /// Runs every stage up to and including the archive.
    pub async fn run(&self, pages: Vec<Url>) -> Result<RunSummary> {
        let harvest = self.harvest(pages).await?;

        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.options.policy.clone();
        let candidates = harvest.candidates;
        let (outcomes, accepted) = tokio::task::spawn_blocking(move || {
            validate_candidates(&candidates, fetcher.as_ref(), &policy)
        })
        .await
        .context("validation task failed")?;
        let validation_rejected = outcomes.len() - accepted.len();
        tracing::info!(accepted = accepted.len(), rejected = validation_rejected, "validation finished");

        let accepted_urls: Vec<Url> = accepted.iter().map(|c| c.url.clone()).collect();
        let records = fetch_all(
            accepted,
            &self.options.download_dir,
            self.options.workers,
            Arc::clone(&self.fetcher),
        )
        .await?;
        let counts = StatusCounts::of(&records);
        tracing::info!(downloaded = counts.downloaded, failed = counts.failed, "fetch stage finished");

        let mut summary = RunSummary {
            pages_rendered: harvest.pages_rendered,
            pages_failed: harvest.pages_failed,
            found: harvest.found,
            domain_rejected: harvest.domain_rejected,
            validation_rejected,
            outcomes,
            accepted: accepted_urls,
            records,
            manifest: None,
        };

        if let Some(archive_path) = self.options.archive_path.clone() {
            let records = summary.records.clone();
            let built =
                tokio::task::spawn_blocking(move || build_archive(&records, &archive_path))
                    .await
                    .context("archive task failed")?;
            match built {
                Ok(manifest) => {
                    if let Err(e) = manifest.write_json() {
                        tracing::warn!(error = %format!("{e:#}"), "manifest sidecar not written");
                    }
                    summary.manifest = Some(manifest);
                }
                Err(e) => tracing::error!(error = %format!("{e:#}"), "archive not written"),
            }
        }
        Ok(summary)
    }
}
