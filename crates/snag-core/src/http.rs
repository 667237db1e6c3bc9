//! Single-shot HTTP GET via libcurl.
//!
//! Every network touch in the pipeline (page render, validation, download) is
//! one GET with a browser-like User-Agent and a per-request timeout. Nothing
//! here retries: a failure is classified and handed back to the caller.

use std::fmt;
use std::str;
use std::time::Duration;

use crate::config::DEFAULT_USER_AGENT;

/// Request settings shared by every GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Bound on the whole transfer, including the body.
    pub request_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A successful (2xx) response body.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u32,
    /// `Content-Type` of the final response, after redirects.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Error returned by a single GET (curl failure, HTTP error, or local storage failure).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Writing the body to disk failed.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}

/// Coarse failure class used for accounting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connection,
    HttpStatus(u16),
    Storage,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connection => write!(f, "connection"),
            FailureKind::HttpStatus(code) => write!(f, "http {}", code),
            FailureKind::Storage => write!(f, "storage"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> FailureKind {
    if e.is_operation_timedout() {
        return FailureKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return FailureKind::Connection;
    }
    FailureKind::Other
}

/// Classify a fetch error into a `FailureKind`.
pub fn classify(e: &FetchError) -> FailureKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => FailureKind::HttpStatus(u16::try_from(*code).unwrap_or(u16::MAX)),
        FetchError::Storage(_) => FailureKind::Storage,
    }
}

/// Source of resource bodies. Blocking; call from `spawn_blocking` in async code.
pub trait Fetcher: Send + Sync {
    fn get(&self, url: &str) -> Result<FetchedBody, FetchError>;
}

/// `Fetcher` backed by a fresh curl easy handle per request, so it can be
/// shared by every worker thread.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: HttpOptions,
}

impl CurlFetcher {
    pub fn new(opts: HttpOptions) -> Self {
        Self { opts }
    }
}

impl Fetcher for CurlFetcher {
    fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let mut easy = curl::easy::Easy::new();
        perform_get(&mut easy, url, &self.opts)
    }
}

/// Performs a GET on `easy` and buffers the body.
///
/// Follows redirects. The handle is reset first so a long-lived handle can be
/// reused across requests (connection reuse for page rendering).
pub(crate) fn perform_get(
    easy: &mut curl::easy::Easy,
    url: &str,
    opts: &HttpOptions,
) -> Result<FetchedBody, FetchError> {
    easy.reset();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(&opts.user_agent)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.request_timeout)?;

    let mut body = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    Ok(FetchedBody {
        status: code,
        content_type: last_content_type(&headers),
        bytes: body,
    })
}

/// With redirects, header blocks accumulate; the last `Content-Type` belongs to the final response.
fn last_content_type(headers: &[String]) -> Option<String> {
    headers.iter().rev().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_classified() {
        assert_eq!(classify(&FetchError::Http(404)), FailureKind::HttpStatus(404));
        assert_eq!(classify(&FetchError::Http(503)), FailureKind::HttpStatus(503));
    }

    #[test]
    fn storage_classified() {
        let e = FetchError::Storage(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(classify(&e), FailureKind::Storage);
        assert_eq!(e.to_string(), "storage: disk full");
    }

    #[test]
    fn content_type_from_final_response() {
        let headers = vec![
            "HTTP/1.1 302 Found".to_string(),
            "Content-Type: text/html".to_string(),
            "".to_string(),
            "HTTP/1.1 200 OK".to_string(),
            "content-type: image/png".to_string(),
        ];
        assert_eq!(last_content_type(&headers).as_deref(), Some("image/png"));
        assert_eq!(last_content_type(&[]), None);
    }

    #[test]
    fn connection_refused_is_classified() {
        // Port 1 on loopback is essentially never listening.
        let fetcher = CurlFetcher::new(HttpOptions {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            ..HttpOptions::default()
        });
        let err = fetcher.get("http://127.0.0.1:1/x.png").unwrap_err();
        assert!(matches!(
            classify(&err),
            FailureKind::Connection | FailureKind::Timeout
        ));
    }
}
