//! `snag extract` – harvest and filter links, write the gallery, fetch nothing.

use anyhow::Result;
use snag_core::config::SnagConfig;
use snag_core::pipeline::Pipeline;
use snag_core::report::write_gallery;
use std::path::Path;
use url::Url;

pub async fn run_extract(
    cfg: &SnagConfig,
    base_dir: &Path,
    pages: Vec<Url>,
    gallery: &Path,
) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg, base_dir)?;
    let harvest = pipeline.harvest(pages).await?;

    for url in harvest.candidates.urls() {
        println!("{url}");
    }
    let listed = write_gallery(harvest.candidates.urls(), gallery, cfg.max_items)?;

    println!(
        "pages: {} rendered, {} failed",
        harvest.pages_rendered, harvest.pages_failed
    );
    println!(
        "links: {} found, {} off-domain, {} kept",
        harvest.found,
        harvest.domain_rejected,
        harvest.candidates.len()
    );
    println!("gallery: {} ({} listed)", gallery.display(), listed);
    Ok(())
}
