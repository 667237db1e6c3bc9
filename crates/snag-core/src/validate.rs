//! Image validation: fetch, decode, and check format and pixel dimensions.
//!
//! Validation downloads the full body, so it doubles as the first download
//! attempt. Accepted candidates keep their bytes and the fetch stage writes
//! them without a second round trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use url::Url;

use crate::http::{classify, FailureKind, Fetcher};

/// Decoded image container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Unknown,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Bmp => "bmp",
            ImageKind::Webp => "webp",
            ImageKind::Unknown => "unknown",
        }
    }

    fn from_image_format(format: image::ImageFormat) -> Self {
        match format {
            image::ImageFormat::Jpeg => ImageKind::Jpeg,
            image::ImageFormat::Png => ImageKind::Png,
            image::ImageFormat::Gif => ImageKind::Gif,
            image::ImageFormat::Bmp => ImageKind::Bmp,
            image::ImageFormat::WebP => ImageKind::Webp,
            _ => ImageKind::Unknown,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageKind::Jpeg),
            "png" => Ok(ImageKind::Png),
            "gif" => Ok(ImageKind::Gif),
            "bmp" => Ok(ImageKind::Bmp),
            "webp" => Ok(ImageKind::Webp),
            other => Err(format!("unsupported image format: {other}")),
        }
    }
}

/// Acceptance thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub formats: Vec<ImageKind>,
    /// Width must be strictly greater than this.
    pub min_width: u32,
    /// Height must be strictly greater than this.
    pub min_height: u32,
    /// Accepted bodies up to this size are kept for the fetch stage; larger
    /// ones are dropped and fetched again when stored.
    pub retain_body_max: usize,
}

/// Default for [`ValidationPolicy::retain_body_max`].
pub const DEFAULT_RETAIN_BODY_MAX: usize = 8 * 1024 * 1024;

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            formats: vec![ImageKind::Jpeg, ImageKind::Png],
            min_width: 900,
            min_height: 900,
            retain_body_max: DEFAULT_RETAIN_BODY_MAX,
        }
    }
}

impl ValidationPolicy {
    /// Applies format and dimension checks to an already decoded image.
    pub fn judge(&self, format: ImageKind, width: u32, height: u32) -> Verdict {
        if !self.formats.contains(&format) {
            return Verdict::Reject(RejectReason::Format(format));
        }
        if width <= self.min_width || height <= self.min_height {
            return Verdict::Reject(RejectReason::TooSmall { width, height });
        }
        Verdict::Accept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Fetch(FailureKind),
    Decode,
    Format(ImageKind),
    TooSmall { width: u32, height: u32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Fetch(kind) => write!(f, "fetch failed ({})", kind),
            RejectReason::Decode => write!(f, "not a decodable image"),
            RejectReason::Format(kind) => write!(f, "format {} not allowed", kind),
            RejectReason::TooSmall { width, height } => write!(f, "too small ({}x{})", width, height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Result of validating one candidate. Produced once; never retried.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub url: Url,
    pub format: ImageKind,
    pub width: u32,
    pub height: u32,
    pub verdict: Verdict,
}

/// A candidate that passed validation, carrying the bytes already fetched.
#[derive(Debug, Clone)]
pub struct AcceptedCandidate {
    pub url: Url,
    /// Body fetched during validation; `None` forces the fetch stage to GET again.
    pub body: Option<Vec<u8>>,
}

impl AcceptedCandidate {
    pub fn without_body(url: Url) -> Self {
        Self { url, body: None }
    }
}

/// Reads the container header and returns format and dimensions.
/// Returns `None` when the bytes are not a recognized, decodable image.
pub fn inspect_image(bytes: &[u8]) -> Option<(ImageKind, u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let format = reader.format().map(ImageKind::from_image_format)?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some((format, width, height))
}

/// Fetches and judges `url`. Never fails: fetch and decode errors are rejects.
pub fn validate(
    url: &Url,
    fetcher: &dyn Fetcher,
    policy: &ValidationPolicy,
) -> (ValidationOutcome, Option<AcceptedCandidate>) {
    let reject = |reason: RejectReason| ValidationOutcome {
        url: url.clone(),
        format: ImageKind::Unknown,
        width: 0,
        height: 0,
        verdict: Verdict::Reject(reason),
    };

    let body = match fetcher.get(url.as_str()) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "validation fetch failed");
            return (reject(RejectReason::Fetch(classify(&e))), None);
        }
    };

    let Some((format, width, height)) = inspect_image(&body.bytes) else {
        tracing::debug!(url = %url, content_type = ?body.content_type, "body is not a decodable image");
        return (reject(RejectReason::Decode), None);
    };

    let verdict = policy.judge(format, width, height);
    let outcome = ValidationOutcome {
        url: url.clone(),
        format,
        width,
        height,
        verdict,
    };
    match verdict {
        Verdict::Accept => {
            tracing::debug!(url = %url, %format, width, height, "image accepted");
            let retained = body.bytes.len() <= policy.retain_body_max;
            if !retained {
                tracing::debug!(url = %url, bytes = body.bytes.len(), "body too large to keep; will fetch again");
            }
            let accepted = AcceptedCandidate {
                url: url.clone(),
                body: retained.then_some(body.bytes),
            };
            (outcome, Some(accepted))
        }
        Verdict::Reject(reason) => {
            tracing::debug!(url = %url, %reason, "image rejected");
            (outcome, None)
        }
    }
}
