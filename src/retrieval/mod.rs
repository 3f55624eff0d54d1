//! Conditional document retrieval.
//!
//! Fetches remote documents with ETag-based conditional requests so
//! unchanged content is never re-transferred. A 304 response touches
//! nothing on disk; a 200 response replaces the local file, after which the
//! caller must rebuild the analysis record for the new fingerprint.

mod response;

pub use response::HttpResponse;

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("feeacquire/", env!("CARGO_PKG_VERSION"));

/// Errors from document retrieval.
///
/// Transient failures are not retried here; the pipeline owns retry policy.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RetrievalError::Transport(_) => true,
            RetrievalError::Status { status, .. } => *status == 429 || *status >= 500,
            RetrievalError::Io(_) => false,
        }
    }
}

/// Result of a conditional fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The origin reported the cached copy is current; no bytes moved.
    NotModified,
    /// The body was written to the target path.
    Downloaded {
        /// Freshness token reported with the new content, if any.
        etag: Option<String>,
        /// Size of the downloaded body in bytes.
        size: u64,
    },
}

/// HTTP fetcher for entity documents.
#[derive(Clone)]
pub struct DocumentFetcher {
    client: Client,
}

impl DocumentFetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Conditionally fetch a document to `target`.
    ///
    /// When `etag` is given it is sent as `If-None-Match`; a 304 answer
    /// leaves the on-disk file and its fingerprint untouched. On 200 the
    /// body replaces the file at `target` and the new ETag is returned, at
    /// which point the caller's record is stale and must be replaced.
    pub async fn fetch(
        &self,
        url: &Url,
        etag: Option<&str>,
        target: &Path,
    ) -> Result<FetchOutcome, RetrievalError> {
        let mut request = self.client.get(url.clone());
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }

        let response = HttpResponse::from(request.send().await?);

        if response.is_not_modified() {
            debug!("{} not modified", url);
            return Ok(FetchOutcome::NotModified);
        }

        if !response.is_success() {
            return Err(RetrievalError::Status {
                status: response.status.as_u16(),
                url: url.to_string(),
            });
        }

        let new_etag = response.etag().map(|s| s.to_string());
        let body = response.bytes().await?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, &body)?;
        info!("downloaded {} ({} bytes)", url, body.len());

        Ok(FetchOutcome::Downloaded {
            etag: new_etag,
            size: body.len() as u64,
        })
    }
}

/// Derive a local filename from a document URL.
///
/// Uses the last path segment, sanitized for the filesystem; falls back to
/// a name derived from the host when the path has no usable segment.
pub fn filename_for_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or("");

    let name = sanitize_filename(segment);
    if !name.is_empty() && name != "." && name != ".." {
        name
    } else {
        format!("{}.pdf", sanitize_filename(url.host_str().unwrap_or("document")))
    }
}

/// Replace characters unsafe for filenames.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url_path() {
        let url = Url::parse("https://example.com/files/price-02062025.pdf").unwrap();
        assert_eq!(filename_for_url(&url), "price-02062025.pdf");
    }

    #[test]
    fn test_filename_sanitizes_special_chars() {
        let url = Url::parse("https://example.com/files/price%20list%202025.pdf").unwrap();
        let name = filename_for_url(&url);
        assert!(!name.contains(' '));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn test_filename_falls_back_to_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_for_url(&url), "example.com.pdf");
    }

    #[test]
    fn test_retryable_statuses() {
        let transient = RetrievalError::Status {
            status: 503,
            url: "https://example.com/a.pdf".to_string(),
        };
        assert!(transient.is_retryable());

        let not_found = RetrievalError::Status {
            status: 404,
            url: "https://example.com/a.pdf".to_string(),
        };
        assert!(!not_found.is_retryable());
    }
}
