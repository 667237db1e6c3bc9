//! URL modeling and filename derivation.
//!
//! Resolves raw page references into canonical absolute URLs, applies the
//! domain filter, and derives safe local filenames from a URL's query string
//! or path.

mod domain;
mod normalize;
mod path;
mod sanitize;

pub use domain::DomainFilter;
pub use normalize::normalize_reference;
pub use path::{filename_from_query, filename_from_url_path, FILENAME_QUERY_PARAMS};
pub use sanitize::{fit_name, sanitize_filename, split_extension, NAME_MAX};

use url::Url;

/// Default filename when the query string and path yield nothing usable.
pub const DEFAULT_FILENAME: &str = "image.bin";

/// Derives a safe filename for saving a retrieved image.
///
/// Prefers a filename-bearing query parameter (e.g. `?f=photo.jpg`), otherwise
/// uses the last path segment of `url`. The result is sanitized: `%20`
/// sequences removed, `<>:"/\|?*` and control characters replaced with `_`.
///
/// # Examples
///
/// - `https://example.com/img/cat.png` → `"cat.png"`
/// - `https://example.com/view.php?f=dog.jpg` → `"dog.jpg"`
pub fn derive_filename(url: &Url) -> String {
    let raw = match filename_from_query(url).or_else(|| filename_from_url_path(url)) {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let sanitized = sanitize_filename(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(s: &str) -> String {
        derive_filename(&Url::parse(s).unwrap())
    }

    #[test]
    fn derive_filename_from_url_path() {
        assert_eq!(derive("https://example.com/img/cat.png"), "cat.png");
        assert_eq!(derive("https://cdn.example.com/a/b/c/photo.jpeg?w=2000"), "photo.jpeg");
    }

    #[test]
    fn derive_filename_prefers_query_parameter() {
        assert_eq!(derive("https://example.com/view.php?f=dog.jpg"), "dog.jpg");
        assert_eq!(derive("https://example.com/get?id=3&f=a%3Cb%3E.png"), "a_b_.png");
    }

    #[test]
    fn derive_filename_strips_encoded_spaces() {
        assert_eq!(derive("https://example.com/my%20holiday%20pic.jpg"), "myholidaypic.jpg");
    }

    #[test]
    fn derive_filename_empty_path_fallback() {
        assert_eq!(derive("https://example.com/"), DEFAULT_FILENAME);
        assert_eq!(derive("https://example.com/?f="), DEFAULT_FILENAME);
    }
}
