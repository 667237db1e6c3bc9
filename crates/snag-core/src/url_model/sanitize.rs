//! Filesystem-safe filename sanitization.

/// Longest filename most filesystems accept, in bytes.
pub const NAME_MAX: usize = 255;

/// Characters rejected by at least one common filesystem.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitizes a candidate filename.
///
/// - Removes `%20` (encoded space) sequences entirely
/// - Replaces `<>:"/\|?*`, NUL and control characters with `_`
/// - Limits length to [`NAME_MAX`] bytes, shortening the stem and keeping the extension
pub fn sanitize_filename(name: &str) -> String {
    let out: String = name
        .replace("%20", "")
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    fit_name(&out, NAME_MAX)
}

/// Splits `name` into stem and extension (extension keeps its dot).
/// A leading dot alone does not start an extension (`.hidden` has none).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut take = max;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}

/// Shortens `name` to at most `max` bytes by cutting the stem.
///
/// The extension survives unless it alone does not fit, in which case the
/// whole name is cut.
pub fn fit_name(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    if ext.len() >= max {
        return truncate_utf8(name, max).to_string();
    }
    format!("{}{ext}", truncate_utf8(stem, max - ext.len()))
}
