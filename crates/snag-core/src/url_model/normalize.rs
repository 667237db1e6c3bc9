//! Resolution of raw page references into canonical absolute URLs.

use url::Url;

/// Resolves `raw` against the page URL it was found on.
///
/// Absolute references pass through; scheme-relative (`//host/path`),
/// root-relative (`/path`) and path-relative forms are joined onto `base`.
/// The fragment is dropped since it never changes the retrieved resource.
///
/// Returns `None` for empty references and for anything that does not end up
/// as an `http`/`https` URL (`data:`, `javascript:`, `mailto:`, ...).
pub fn normalize_reference(raw: &str, base: &Url) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = base.join(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
