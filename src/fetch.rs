//! Blocking HTTP client for fetch-by-URL steps.
//!
//! One [`HttpFetcher`] lives on the app and is shared by every job.
//! Redirects are followed transparently up to the configured bound; a
//! non-2xx final response is an error carrying the status and body so the
//! caller can decide what to do with it. The crate never retries — retry
//! policy belongs to the caller.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("too many redirects fetching {0}")]
    TooManyRedirects(String),
    #[error("remote responded with status {status}: {body}")]
    BadStatus { status: u16, body: String },
}

/// Shared blocking HTTP client configured from [`FetchConfig`].
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client })
    }

    /// GET a URL and return the final response body.
    pub fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        let url = parse_url(url)?;
        debug!(url = %url, "fetching remote content");

        let response = match self.client.get(url.clone()).send() {
            Ok(response) => response,
            Err(e) if e.is_redirect() => {
                warn!(url = %url, "redirect limit exceeded");
                return Err(FetchError::TooManyRedirects(url.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "remote fetch failed");
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes()?;
        debug!(url = %url, size = bytes.len(), "fetch completed");
        Ok(bytes)
    }
}

/// Parse a fetch URL, defaulting scheme-less input to `http://`.
pub fn parse_url(raw: &str) -> Result<Url, FetchError> {
    if raw.contains("://") {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("http://{raw}"))?)
    }
}

/// Candidate object name for a fetched URL: the last path segment, when
/// it is non-empty. A trailing slash, root, or empty path has no candidate.
pub fn name_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
