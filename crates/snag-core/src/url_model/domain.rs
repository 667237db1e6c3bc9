//! Host-suffix domain filter.

use url::Url;

/// Accepts a URL when its host equals the configured suffix or is a subdomain
/// of it. An empty suffix disables filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    suffix: Option<String>,
}

impl DomainFilter {
    /// Builds a filter from a configured domain. Surrounding whitespace and a
    /// leading `.` are ignored; matching is case-insensitive.
    pub fn new(domain: &str) -> Self {
        let suffix = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        Self {
            suffix: (!suffix.is_empty()).then_some(suffix),
        }
    }

    /// A filter that accepts everything.
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.suffix.is_some()
    }

    pub fn accepts(&self, url: &Url) -> bool {
        let Some(suffix) = self.suffix.as_deref() else {
            return true;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host == suffix
            || (host.len() > suffix.len()
                && host.ends_with(suffix)
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn subdomain_and_exact_match() {
        let f = DomainFilter::new("example.com");
        assert!(f.accepts(&url("https://img.example.com/a.png")));
        assert!(f.accepts(&url("https://example.com/a.png")));
        assert!(f.accepts(&url("https://a.b.EXAMPLE.com/a.png")));
    }

    #[test]
    fn lookalike_hosts_rejected() {
        let f = DomainFilter::new("example.com");
        assert!(!f.accepts(&url("https://example.com.evil.net/a.png")));
        assert!(!f.accepts(&url("https://notexample.com/a.png")));
        assert!(!f.accepts(&url("https://com/a.png")));
    }

    #[test]
    fn empty_suffix_accepts_all() {
        let f = DomainFilter::new("  ");
        assert!(!f.is_enabled());
        assert!(f.accepts(&url("https://anything.invalid/x")));
        assert_eq!(f, DomainFilter::accept_all());
    }

    #[test]
    fn leading_dot_and_case_ignored() {
        let f = DomainFilter::new(".Example.COM");
        assert!(f.accepts(&url("https://img.example.com/a.png")));
    }
}
