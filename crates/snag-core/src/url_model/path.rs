//! Filename extraction from URL query string or path.

use url::Url;

/// Query parameters that carry the real filename on script-served images
/// (e.g. `download.php?f=photo.jpg`), checked in order.
pub const FILENAME_QUERY_PARAMS: &[&str] = &["f"];

/// Returns the first non-empty filename-bearing query parameter, percent-decoded.
pub fn filename_from_query(url: &Url) -> Option<String> {
    FILENAME_QUERY_PARAMS.iter().find_map(|key| {
        url.query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    })
}

/// Extracts the last path segment from a URL for use as a filename hint.
///
/// The segment is returned as it appears in the URL (still percent-encoded).
/// Returns `None` if the path is empty/root or the segment is `.`/`..`.
pub fn filename_from_url_path(url: &Url) -> Option<String> {
    let segment = url.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn path_segment() {
        assert_eq!(
            filename_from_url_path(&url("https://example.com/a/b/file.jpg")).as_deref(),
            Some("file.jpg")
        );
        assert_eq!(
            filename_from_url_path(&url("https://example.com/dir/")).as_deref(),
            Some("dir")
        );
    }

    #[test]
    fn root_or_empty() {
        assert_eq!(filename_from_url_path(&url("https://example.com/")), None);
        assert_eq!(filename_from_url_path(&url("https://example.com")), None);
    }

    #[test]
    fn query_parameter() {
        assert_eq!(
            filename_from_query(&url("https://example.com/dl.php?id=1&f=big%20cat.png")).as_deref(),
            Some("big cat.png")
        );
        assert_eq!(filename_from_query(&url("https://example.com/dl.php?id=1")), None);
        assert_eq!(filename_from_query(&url("https://example.com/dl.php?f=")), None);
    }
}
