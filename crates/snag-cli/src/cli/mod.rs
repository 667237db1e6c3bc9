//! CLI for the snag image harvester.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use snag_core::config::{self, SnagConfig};
use snag_core::corruption::Decision;
use snag_core::validate::ImageKind;
use std::path::{Path, PathBuf};
use url::Url;

use commands::{run_config_path, run_extract, run_pipeline, CorruptMode};

/// Top-level CLI for snag.
#[derive(Debug, Parser)]
#[command(name = "snag")]
#[command(about = "snag: harvest, filter, download and archive images from web pages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Page selection shared by `run` and `extract`.
#[derive(Debug, Clone, Args)]
pub struct HarvestArgs {
    /// Pages to harvest: http(s) URLs, file:// URLs or local HTML files.
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Keep only images on this domain or its subdomains.
    #[arg(long, value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// CSS selector for image references (e.g. `img[src]`, `a.link--external[href]`).
    #[arg(long, value_name = "CSS")]
    pub selector: Option<String>,

    /// Treat the given pages as hubs and harvest every page linked by this selector.
    #[arg(long, value_name = "CSS")]
    pub follow: Option<String>,

    /// Stop after rendering N pages.
    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    /// Write the HTML gallery here instead of the configured file name.
    #[arg(long, value_name = "FILE")]
    pub gallery: Option<PathBuf>,

    /// Maximum number of images listed in the gallery.
    #[arg(long, value_name = "N")]
    pub max_items: Option<usize>,
}

impl HarvestArgs {
    fn apply(&self, cfg: &mut SnagConfig) {
        if let Some(domain) = &self.domain {
            cfg.domain = domain.clone();
        }
        if let Some(selector) = &self.selector {
            cfg.link_selector = selector.clone();
        }
        if self.follow.is_some() {
            cfg.follow_selector = self.follow.clone();
        }
        if self.max_pages.is_some() {
            cfg.max_pages = self.max_pages;
        }
        if let Some(n) = self.max_items {
            cfg.max_items = n;
        }
    }

    fn gallery_path(&self, cfg: &SnagConfig, base_dir: &Path) -> PathBuf {
        self.gallery
            .clone()
            .unwrap_or_else(|| base_dir.join(&cfg.gallery_name))
    }

    fn pages(&self) -> Result<Vec<Url>> {
        self.urls.iter().map(|s| page_url(s)).collect()
    }
}

/// Accepts absolute URLs as-is and turns anything else into a `file://` URL.
pub(crate) fn page_url(arg: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(arg) {
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }
    let path = std::fs::canonicalize(arg).with_context(|| format!("no such page: {arg}"))?;
    Url::from_file_path(&path).map_err(|()| anyhow::anyhow!("not a usable path: {}", path.display()))
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Harvest, validate, download and archive images.
    Run {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Concurrent downloads.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Minimum width in pixels (images must be strictly wider).
        #[arg(long, value_name = "PX")]
        min_width: Option<u32>,

        /// Minimum height in pixels (images must be strictly taller).
        #[arg(long, value_name = "PX")]
        min_height: Option<u32>,

        /// Accepted image format; repeat for several (jpeg, png, gif, bmp, webp).
        #[arg(long = "format", value_name = "FORMAT")]
        formats: Vec<ImageKind>,

        /// Download directory.
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Archive file to write.
        #[arg(long, value_name = "FILE")]
        archive: Option<PathBuf>,

        /// After archiving, empty every downloaded file and then delete or keep them.
        #[arg(long)]
        corrupt: bool,

        /// Delete the emptied files without asking.
        #[arg(long, requires = "corrupt", conflicts_with = "no")]
        yes: bool,

        /// Keep the emptied files without asking.
        #[arg(long, requires = "corrupt")]
        no: bool,
    },

    /// Harvest and domain-filter only; writes the gallery without downloading.
    Extract {
        #[command(flatten)]
        harvest: HarvestArgs,
    },

    /// Print the config file path.
    ConfigPath,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::ConfigPath = cli.command {
            return run_config_path();
        }

        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let base_dir = std::env::current_dir()?;

        match cli.command {
            CliCommand::Run {
                harvest,
                workers,
                min_width,
                min_height,
                formats,
                out,
                archive,
                corrupt,
                yes,
                no,
            } => {
                harvest.apply(&mut cfg);
                if let Some(n) = workers {
                    cfg.workers = n;
                }
                if let Some(w) = min_width {
                    cfg.min_width = w;
                }
                if let Some(h) = min_height {
                    cfg.min_height = h;
                }
                if !formats.is_empty() {
                    cfg.formats = formats;
                }
                if let Some(dir) = out {
                    cfg.download_dir = dir;
                }
                if let Some(path) = archive {
                    cfg.archive_name = path.to_string_lossy().into_owned();
                }
                let mode = corrupt_mode(corrupt, yes, no);
                let gallery = harvest.gallery_path(&cfg, &base_dir);
                run_pipeline(&cfg, &base_dir, harvest.pages()?, &gallery, mode).await?;
            }
            CliCommand::Extract { harvest } => {
                harvest.apply(&mut cfg);
                let gallery = harvest.gallery_path(&cfg, &base_dir);
                run_extract(&cfg, &base_dir, harvest.pages()?, &gallery).await?;
            }
            CliCommand::ConfigPath => {}
        }

        Ok(())
    }
}

pub(crate) fn corrupt_mode(corrupt: bool, yes: bool, no: bool) -> Option<CorruptMode> {
    if !corrupt {
        return None;
    }
    Some(match (yes, no) {
        (true, _) => CorruptMode::Assume(Decision::Accept),
        (_, true) => CorruptMode::Assume(Decision::Decline),
        _ => CorruptMode::Ask,
    })
}

#[cfg(test)]
mod tests;
