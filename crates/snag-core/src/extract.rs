//! Link extraction from rendered HTML.
//!
//! One extraction path serves every page layout: the caller supplies a
//! [`LinkSelector`] (`img[src]`, `a[href]`, `a.link--external[href]`, ...) and
//! gets back a deduplicated [`CandidateSet`] keyed by normalized URL.

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

use crate::url_model::{normalize_reference, DomainFilter};

/// CSS selector plus the attribute that holds the reference.
#[derive(Debug, Clone)]
pub struct LinkSelector {
    css: String,
    selector: Selector,
    attr: String,
}

impl LinkSelector {
    /// Parses `css`, taking the attribute from the selector itself: the last
    /// `[attr]` test if there is one, otherwise `src` for `img` and `href` for
    /// anything else.
    pub fn parse(css: &str) -> Result<Self> {
        let selector =
            Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))?;
        Ok(Self {
            css: css.to_string(),
            selector,
            attr: infer_attr(css),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.css
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }
}

fn infer_attr(css: &str) -> String {
    if let Some(idx) = css.rfind('[') {
        let name: String = css[idx + 1..]
            .chars()
            .skip_while(|c| c.is_whitespace())
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if !name.is_empty() {
            return name;
        }
    }
    let last = css
        .split(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ','))
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or("");
    if last.starts_with("img") { "src" } else { "href" }.to_string()
}

/// Raw attribute values of every element matching `selector`, in document order.
pub fn extract_links(html: &str, selector: &LinkSelector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&selector.selector)
        .filter_map(|el| el.value().attr(&selector.attr))
        .map(str::to_string)
        .collect()
}

/// A reference found on a page, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    /// The attribute value as written in the page.
    pub raw: String,
    /// Page the reference was found on (resolution base).
    pub page: Url,
    pub url: Url,
}

/// Candidates keyed by normalized URL; a URL is present at most once.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    by_url: BTreeMap<Url, CandidateUrl>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.by_url.contains_key(url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateUrl> {
        self.by_url.values()
    }

    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.by_url.keys()
    }

    /// Adds `candidate` unless its URL is already present. Returns whether it was added.
    pub fn insert(&mut self, candidate: CandidateUrl) -> bool {
        if self.contains(&candidate.url) {
            return false;
        }
        self.by_url.insert(candidate.url.clone(), candidate);
        true
    }

    /// Union of two sets; on duplicates the entry from `self` wins.
    pub fn union(mut self, other: CandidateSet) -> CandidateSet {
        for candidate in other.by_url.into_values() {
            self.insert(candidate);
        }
        self
    }

    /// Splits the set by `filter`: returns the accepted set and the number rejected.
    pub fn filter_domain(self, filter: &DomainFilter) -> (CandidateSet, usize) {
        let before = self.by_url.len();
        let by_url: BTreeMap<Url, CandidateUrl> = self
            .by_url
            .into_iter()
            .filter(|(url, _)| filter.accepts(url))
            .collect();
        let rejected = before - by_url.len();
        (CandidateSet { by_url }, rejected)
    }

    pub fn into_vec(self) -> Vec<CandidateUrl> {
        self.by_url.into_values().collect()
    }
}

impl FromIterator<CandidateUrl> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = CandidateUrl>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

/// Extracts, normalizes and deduplicates the references on one page.
/// References that do not resolve to an http(s) URL are dropped.
pub fn harvest_page(html: &str, page: &Url, selector: &LinkSelector) -> CandidateSet {
    extract_links(html, selector)
        .into_iter()
        .filter_map(|raw| {
            let url = normalize_reference(&raw, page)?;
            Some(CandidateUrl {
                raw,
                page: page.clone(),
                url,
            })
        })
        .collect()
}
