//! Blocking CDX client: page count query and single page fetches.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use std::fmt;
use std::io::Read;
use std::time::Duration;

use crate::engine::tools::{page_count_url, page_url, parse_page_count};

/// Why a single page attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// Client bound to one endpoint and one normalized pattern. Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct CdxClient {
    http: Client,
    endpoint: String,
    cdx_pattern: String,
}

impl CdxClient {
    pub fn new(endpoint: &str, cdx_pattern: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            cdx_pattern: cdx_pattern.to_string(),
        })
    }

    pub fn cdx_pattern(&self) -> &str {
        &self.cdx_pattern
    }

    /// Ask the index how many pages exist. Blank body → 0; unparsable count → 1 with a warning.
    /// Transport and read failures are errors: nothing can be paginated without a count.
    pub fn page_count(&self) -> Result<usize> {
        let url = page_count_url(&self.endpoint, &self.cdx_pattern)?;
        debug!("page count: GET {url}");
        let mut resp = self
            .http
            .get(url)
            .send()
            .context("fetch page count from CDX")?;
        if !resp.status().is_success() {
            warn!("page count request returned {}", resp.status());
        }
        let mut body = String::new();
        resp.read_to_string(&mut body)
            .context("read page-count response")?;

        match parse_page_count(&body) {
            None => Ok(0),
            Some(Some(n)) => Ok(n),
            Some(None) => {
                let first = body.lines().map(str::trim).find(|l| !l.is_empty());
                warn!(
                    "could not parse page count ({}), defaulting to 1 page",
                    first.unwrap_or_default()
                );
                Ok(1)
            }
        }
    }

    /// One attempt at fetching `page`. Success means a 2xx response; the body is left unread.
    pub fn fetch_page(&self, page: usize) -> std::result::Result<Response, FetchError> {
        let url = page_url(&self.endpoint, &self.cdx_pattern, page)
            .map_err(|e| FetchError::new(FailureKind::InvalidUrl, e.to_string()))?;
        let resp = self.http.get(url).send().map_err(map_reqwest_error)?;
        let status = resp.status();
        if !status.is_success() {
            // Dropping the response releases its connection.
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(resp)
    }
}
