//! Page rendering: turns a page URL into an HTML snapshot.
//!
//! A renderer hands out sessions; a session is held for a whole harvest and
//! must be released on every exit path. [`SessionGuard`] owns the session and
//! closes it on drop, including during unwinding. Browser-backed renderers
//! plug in through [`PageRenderer`]; [`StaticRenderer`] is the built-in one
//! and simply GETs the page (or reads a `file://` URL).

use std::fs;
use url::Url;

use crate::http::{perform_get, HttpOptions};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer itself could not be brought up. Fatal for the run.
    #[error("renderer failed to start: {0}")]
    Startup(String),
    /// One page could not be loaded. That page contributes no candidates.
    #[error("could not render {url}: {reason}")]
    Page { url: String, reason: String },
}

impl RenderError {
    fn page(url: &Url, reason: impl ToString) -> Self {
        RenderError::Page {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub trait PageRenderer: Send + Sync {
    fn start(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

pub trait RenderSession: Send {
    /// Returns the rendered document for `url`.
    fn render(&mut self, url: &Url) -> Result<String, RenderError>;

    /// Releases whatever the session holds. Called exactly once, by [`SessionGuard`].
    fn close(&mut self) {}
}

/// Scoped session: started by [`SessionGuard::start`], closed when dropped.
pub struct SessionGuard {
    session: Box<dyn RenderSession>,
}

impl SessionGuard {
    pub fn start(renderer: &dyn PageRenderer) -> Result<Self, RenderError> {
        let session = renderer.start()?;
        tracing::debug!("render session started");
        Ok(Self { session })
    }

    pub fn render(&mut self, url: &Url) -> Result<String, RenderError> {
        self.session.render(url)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
        tracing::debug!("render session closed");
    }
}

/// Renderer that fetches raw HTML without executing scripts.
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    opts: HttpOptions,
}

impl StaticRenderer {
    pub fn new(opts: HttpOptions) -> Self {
        Self { opts }
    }
}

impl PageRenderer for StaticRenderer {
    fn start(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(StaticSession {
            easy: curl::easy::Easy::new(),
            opts: self.opts.clone(),
        }))
    }
}

/// Keeps one curl handle so consecutive pages on a host reuse the connection.
struct StaticSession {
    easy: curl::easy::Easy,
    opts: HttpOptions,
}

impl RenderSession for StaticSession {
    fn render(&mut self, url: &Url) -> Result<String, RenderError> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| RenderError::page(url, "not a local path"))?;
                fs::read_to_string(&path).map_err(|e| RenderError::page(url, e))
            }
            "http" | "https" => {
                let body = perform_get(&mut self.easy, url.as_str(), &self.opts)
                    .map_err(|e| RenderError::page(url, e))?;
                Ok(String::from_utf8_lossy(&body.bytes).into_owned())
            }
            other => Err(RenderError::page(url, format!("unsupported scheme {other}"))),
        }
    }

    fn close(&mut self) {
        self.easy.reset();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves canned pages from memory and counts session opens/closes.
    #[derive(Default, Clone)]
    pub(crate) struct MapRenderer {
        pub pages: HashMap<String, String>,
        pub fail_start: bool,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
        pub rendered: Arc<AtomicUsize>,
    }

    struct MapSession(MapRenderer);

    impl PageRenderer for MapRenderer {
        fn start(&self) -> Result<Box<dyn RenderSession>, RenderError> {
            if self.fail_start {
                return Err(RenderError::Startup("no browser".to_string()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MapSession(self.clone())))
        }
    }

    impl RenderSession for MapSession {
        fn render(&mut self, url: &Url) -> Result<String, RenderError> {
            self.0.rendered.fetch_add(1, Ordering::SeqCst);
            self.0
                .pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| RenderError::page(url, "HTTP 404"))
        }

        fn close(&mut self) {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn guard_closes_on_drop() {
        let renderer = MapRenderer::default();
        {
            let mut guard = SessionGuard::start(&renderer).unwrap();
            let err = guard
                .render(&Url::parse("https://example.com/").unwrap())
                .unwrap_err();
            assert!(matches!(err, RenderError::Page { .. }));
        }
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_closes_on_panic() {
        let renderer = MapRenderer::default();
        let r2 = renderer.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = SessionGuard::start(&r2).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn startup_failure_surfaces() {
        let renderer = MapRenderer {
            fail_start: true,
            ..MapRenderer::default()
        };
        assert!(matches!(
            SessionGuard::start(&renderer),
            Err(RenderError::Startup(_))
        ));
        assert_eq!(renderer.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn static_renderer_reads_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.html");
        std::fs::write(&path, "<img src=\"https://example.com/a.png\">").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let renderer = StaticRenderer::default();
        let mut guard = SessionGuard::start(&renderer).unwrap();
        let html = guard.render(&url).unwrap();
        assert!(html.contains("a.png"));

        let missing = Url::from_file_path(dir.path().join("missing.html")).unwrap();
        assert!(matches!(guard.render(&missing), Err(RenderError::Page { .. })));
    }

    #[test]
    fn static_renderer_rejects_other_schemes() {
        let renderer = StaticRenderer::default();
        let mut guard = SessionGuard::start(&renderer).unwrap();
        let err = guard
            .render(&Url::parse("ftp://example.com/x").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme ftp"));
    }
}
