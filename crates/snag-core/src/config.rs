use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::HttpOptions;
use crate::validate::{ImageKind, ValidationPolicy, DEFAULT_RETAIN_BODY_MAX};

/// Browser-like User-Agent sent with every request; some image hosts reject bare clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Global configuration loaded from `~/.config/snag/config.toml`.
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnagConfig {
    /// Host suffix a candidate must match (empty = accept every host).
    pub domain: String,
    /// Decoded image formats that pass validation.
    pub formats: Vec<ImageKind>,
    /// Width must be strictly greater than this many pixels.
    pub min_width: u32,
    /// Height must be strictly greater than this many pixels.
    pub min_height: u32,
    /// Accepted image bodies up to this many bytes are held in memory between
    /// validation and storage; larger ones are downloaded again.
    pub retain_body_max_bytes: usize,
    /// Size of the fetch worker pool.
    pub workers: usize,
    /// Maximum number of entries written to one gallery document.
    pub max_items: usize,
    /// Optional cap on pages rendered in one run (None = unbounded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Per-request timeout for page, validation and download GETs.
    pub request_timeout_secs: u64,
    /// CSS selector whose elements carry image references (`img[src]`, `a[href]`, ...).
    pub link_selector: String,
    /// When set, seed pages are treated as hubs: links matching this selector are
    /// rendered in turn and harvested with `link_selector`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_selector: Option<String>,
    /// Directory (relative to the working directory unless absolute) receiving downloads.
    pub download_dir: PathBuf,
    pub archive_name: String,
    pub gallery_name: String,
}

impl Default for SnagConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            formats: vec![ImageKind::Jpeg, ImageKind::Png],
            min_width: 900,
            min_height: 900,
            retain_body_max_bytes: DEFAULT_RETAIN_BODY_MAX,
            workers: 5,
            max_items: 100,
            max_pages: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 15,
            request_timeout_secs: 60,
            link_selector: "img[src]".to_string(),
            follow_selector: None,
            download_dir: PathBuf::from("downloaded_images"),
            archive_name: "images.zip".to_string(),
            gallery_name: "images.html".to_string(),
        }
    }
}

impl SnagConfig {
    /// Validation thresholds for the image validator.
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            formats: self.formats.clone(),
            min_width: self.min_width,
            min_height: self.min_height,
            retain_body_max: self.retain_body_max_bytes,
        }
    }

    /// Request settings shared by the renderer, validator and fetcher.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("snag")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SnagConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SnagConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<SnagConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: SnagConfig = toml::from_str(&data)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(cfg)
}
