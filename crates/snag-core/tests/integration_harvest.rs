//! Integration test: local HTTP server serving a gallery page and images.
//!
//! Runs the full pipeline with the built-in static renderer and curl fetcher,
//! then checks downloads, the archive and the corruption stage on disk.

mod common;

use common::site_server::{self, Route};
use snag_core::checksum::HashingReader;
use snag_core::config::SnagConfig;
use snag_core::corruption::{Decision, IntactBatch};
use snag_core::pipeline::Pipeline;
use snag_core::record::RecordStatus;
use snag_core::report::write_gallery;
use std::collections::HashMap;
use std::io::Cursor;
use tempfile::tempdir;
use url::Url;

fn encode(format: image::ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

const GALLERY: &str = r#"<!DOCTYPE html>
<html><body>
  <img src="/img/big.png">
  <img src="img/big.png">
  <img src="/img/small.png">
  <img src="/img/view?f=holiday.jpg">
  <img src="/img/broken.png">
  <img src="/img/notimage.png">
  <img src="http://elsewhere.invalid/x.png">
  <img src="/other/big.png">
</body></html>"#;

fn gallery_site() -> String {
    let mut routes = HashMap::new();
    routes.insert("/gallery.html".to_string(), Route::html(GALLERY));
    routes.insert(
        "/img/big.png".to_string(),
        Route::bytes("image/png", encode(image::ImageFormat::Png, 1000, 1000)),
    );
    routes.insert(
        "/other/big.png".to_string(),
        Route::bytes("image/png", encode(image::ImageFormat::Png, 1200, 901)),
    );
    routes.insert(
        "/img/small.png".to_string(),
        Route::bytes("image/png", encode(image::ImageFormat::Png, 900, 900)),
    );
    routes.insert(
        "/img/view?f=holiday.jpg".to_string(),
        Route::bytes("image/jpeg", encode(image::ImageFormat::Jpeg, 1024, 1024)),
    );
    routes.insert("/img/broken.png".to_string(), Route::status(500));
    routes.insert(
        "/img/notimage.png".to_string(),
        Route::bytes("image/png", b"definitely not a png".to_vec()),
    );
    site_server::start(routes)
}

fn config(download_dir: &std::path::Path) -> SnagConfig {
    SnagConfig {
        domain: "127.0.0.1".to_string(),
        download_dir: download_dir.to_path_buf(),
        workers: 2,
        ..SnagConfig::default()
    }
}

#[tokio::test]
async fn gallery_page_end_to_end() {
    let base = gallery_site();
    let work = tempdir().unwrap();
    let downloads = work.path().join("downloads");
    let pipeline = Pipeline::from_config(&config(&downloads), work.path()).unwrap();

    let page = Url::parse(&base).unwrap().join("gallery.html").unwrap();
    let summary = pipeline.run(vec![page]).await.expect("run");

    assert_eq!(summary.pages_rendered, 1);
    assert_eq!(summary.found, 7);
    assert_eq!(summary.domain_rejected, 1);
    assert_eq!(summary.validation_rejected, 3);
    assert_eq!(summary.accepted.len(), 3);
    let counts = summary.counts();
    assert_eq!(counts.downloaded, 3);
    assert_eq!(counts.failed, 0);

    let mut names: Vec<String> = std::fs::read_dir(&downloads)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["big.png", "big_1.png", "holiday.jpg"]);

    let manifest = summary.manifest.clone().expect("archive written");
    assert_eq!(manifest.archive_path, work.path().join("images.zip"));
    assert_eq!(manifest.len(), 3);
    assert!(manifest.json_path().exists());
    let mut zip =
        zip::ZipArchive::new(std::fs::File::open(&manifest.archive_path).unwrap()).unwrap();
    assert_eq!(zip.len(), 3);
    for entry in &manifest.entries {
        let mut reader = HashingReader::new(zip.by_name(&entry.name).unwrap());
        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
        assert_eq!(reader.finish(), (entry.sha256.clone(), entry.size));
    }

    let done = IntactBatch::new(summary.records)
        .corrupt()
        .finalize(Decision::Accept);
    assert_eq!(done.skipped, 0);
    assert!(done.records.iter().all(|r| r.status() == RecordStatus::Deleted));
    assert_eq!(std::fs::read_dir(&downloads).unwrap().count(), 0);
    assert!(manifest.archive_path.exists());
}

#[tokio::test]
async fn retained_batch_keeps_empty_files() {
    let base = gallery_site();
    let work = tempdir().unwrap();
    let downloads = work.path().join("downloads");
    let pipeline = Pipeline::from_config(&config(&downloads), work.path()).unwrap();

    let page = Url::parse(&base).unwrap().join("gallery.html").unwrap();
    let summary = pipeline.run(vec![page]).await.unwrap();

    let done = IntactBatch::new(summary.records)
        .corrupt()
        .finalize(Decision::Decline);
    for record in &done.records {
        assert_eq!(record.status(), RecordStatus::Retained);
        let len = std::fs::metadata(record.path.as_ref().unwrap()).unwrap().len();
        assert_eq!(len, 0);
    }
}

#[tokio::test]
async fn written_gallery_can_be_harvested_again() {
    let base = gallery_site();
    let work = tempdir().unwrap();
    let pipeline =
        Pipeline::from_config(&config(&work.path().join("first")), work.path()).unwrap();

    let page = Url::parse(&base).unwrap().join("gallery.html").unwrap();
    let harvest = pipeline.harvest(vec![page]).await.unwrap();
    assert_eq!(harvest.candidates.len(), 6);

    let gallery_path = work.path().join("images.html");
    let written = write_gallery(harvest.candidates.urls(), &gallery_path, 100).unwrap();
    assert_eq!(written, 6);

    let mut cfg = config(&work.path().join("second"));
    cfg.archive_name = "second.zip".to_string();
    let pipeline = Pipeline::from_config(&cfg, work.path()).unwrap();
    let gallery_url = Url::from_file_path(&gallery_path).unwrap();
    let summary = pipeline.run(vec![gallery_url]).await.unwrap();
    assert_eq!(summary.found, 6);
    assert_eq!(summary.counts().downloaded, 3);
    assert_eq!(summary.manifest.unwrap().len(), 3);
}

#[tokio::test]
async fn unreachable_page_yields_empty_run() {
    let work = tempdir().unwrap();
    let pipeline =
        Pipeline::from_config(&config(&work.path().join("downloads")), work.path()).unwrap();
    let base = gallery_site();
    let page = Url::parse(&base).unwrap().join("nope.html").unwrap();
    let summary = pipeline.run(vec![page]).await.unwrap();
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.found, 0);
    assert!(summary.records.is_empty());
    assert!(summary.manifest.unwrap().is_empty());
}
