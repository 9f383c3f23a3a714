//! Error types for the sitescribe pipeline
//!
//! This module defines custom error types used throughout the application.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from a single HTTP exchange
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Transport-level failure (DNS, connection refused, TLS, body read)
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Request timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },
}

impl NetworkError {
    /// Classify a reqwest error for the given URL
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Errors that can occur while loading a sitemap
#[derive(Error, Debug)]
pub enum SitemapError {
    /// Sitemap could not be downloaded
    #[error("Failed to download sitemap: {0}")]
    Network(#[from] NetworkError),

    /// Document is not well-formed XML or lacks `<url><loc>` entries
    #[error("Malformed sitemap: {0}")]
    Malformed(String),
}

/// Errors that can occur while fetching a page
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt failed
    #[error("Fetching {url} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: NetworkError,
    },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),
}

impl FetchError {
    /// URL this error belongs to, when known
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Exhausted { url, .. } => Some(url),
            Self::InvalidUrl(url) => Some(url),
            Self::Decode(_) => None,
        }
    }
}

/// Errors from the HTML-to-PDF renderer
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer binary could not be started
    #[error("Failed to launch renderer {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Renderer exited unsuccessfully
    #[error("Renderer failed for {url} (exit code {code:?}): {stderr}")]
    Failed {
        url: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Renderer exceeded its time budget and was killed
    #[error("Renderer timed out after {secs}s for {url}")]
    Timeout { url: String, secs: u64 },

    /// Renderer reported success but produced no output
    #[error("Renderer produced an empty file for {url}")]
    EmptyOutput { url: String },

    /// Filesystem error around the render output
    #[error("I/O error while rendering {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the per-URL pipeline entry points
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No URL stored at the requested position
    #[error("No page at position {position} (store holds {len} page(s))")]
    IndexOutOfRange { position: usize, len: usize },

    /// URL cannot be mapped to an artifact location
    #[error("Cannot derive artifact path for {0}")]
    UnmappableUrl(String),

    /// URL store failure
    #[error("URL store error: {0}")]
    Store(String),
}

/// Reason an artifact failed verification
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum InvalidReason {
    /// File (or its pair) does not exist
    Missing,
    /// File exists but could not be read
    Unreadable(String),
    /// Zero bytes, whitespace only, or a PDF with no pages
    Empty,
    /// Bytes do not parse as the expected format
    Corrupt(String),
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Unreadable(detail) => write!(f, "unreadable: {detail}"),
            Self::Empty => write!(f, "empty"),
            Self::Corrupt(detail) => write!(f, "corrupt: {detail}"),
        }
    }
}

/// Verification-time defect for one artifact
///
/// Produced by the verifier and collected into a report; never propagated
/// with `?` by the verifier itself.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[error("Invalid artifact {}: {reason}", path.display())]
pub struct InvalidArtifact {
    pub path: PathBuf,
    pub reason: InvalidReason,
}
