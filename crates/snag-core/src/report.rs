//! HTML gallery of harvested image URLs.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use url::Url;

const LIGHTBOX_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/lightbox2/2.11.3/css/lightbox.min.css";
const LIGHTBOX_JS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/lightbox2/2.11.3/js/lightbox-plus-jquery.min.js";

/// Escapes text for use inside a double-quoted attribute or element body.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the gallery document for at most `max_items` URLs.
pub fn render_gallery<'a, I>(urls: I, max_items: usize) -> (String, usize)
where
    I: IntoIterator<Item = &'a Url>,
{
    let mut items = String::new();
    let mut count = 0;
    for url in urls.into_iter().take(max_items) {
        let href = escape(url.as_str());
        // Writing into a String cannot fail.
        let _ = writeln!(
            items,
            "  <a href=\"{href}\" data-lightbox=\"image-gallery\" data-title=\"Image\">\n    <img src=\"{href}\" alt=\"Image\" loading=\"lazy\">\n  </a>"
        );
        count += 1;
    }

    let mut doc = String::new();
    doc.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    doc.push_str("<meta charset=\"UTF-8\">\n<title>Image Gallery</title>\n");
    let _ = writeln!(doc, "<link href=\"{LIGHTBOX_CSS}\" rel=\"stylesheet\">");
    doc.push_str("<style>.gallery img{max-width:240px;margin:4px}</style>\n");
    doc.push_str("</head>\n<body>\n<div class=\"gallery\">\n");
    doc.push_str(&items);
    doc.push_str("</div>\n");
    let _ = writeln!(doc, "<h2>Total images: {count}</h2>");
    let _ = writeln!(doc, "<script src=\"{LIGHTBOX_JS}\"></script>");
    doc.push_str("</body>\n</html>\n");
    (doc, count)
}

/// Writes the gallery to `path`, creating parent directories. Returns how many
/// images it lists.
pub fn write_gallery<'a, I>(urls: I, path: &Path, max_items: usize) -> Result<usize>
where
    I: IntoIterator<Item = &'a Url>,
{
    let (doc, count) = render_gallery(urls, max_items);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, doc)
        .with_context(|| format!("failed to write gallery {}", path.display()))?;
    tracing::info!(path = %path.display(), count, "gallery written");
    Ok(count)
}
