// Core data structures for the sitescribe pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A stored page URL with its stable 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUrl {
    pub position: usize,
    pub value: String,
}

impl PageUrl {
    pub fn new(position: usize, value: impl Into<String>) -> Self {
        Self {
            position,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for PageUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.position, self.value)
    }
}

/// A fetched HTML document, alive only for one pipeline step
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub retrieved_at: DateTime<Utc>,
    /// Time from dispatch of the successful attempt to the end of the body read
    pub latency: Duration,
}

/// Last failed attempt for a stored URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub url: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// On-disk locations of one page's artifact pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub pdf: PathBuf,
    pub text: PathBuf,
}

/// Result of producing one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactResult {
    Written { path: PathBuf, bytes: u64 },
    Failed { error: String },
    NotAttempted,
}

impl ArtifactResult {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Overall status of one processed page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Both artifacts written
    Complete,
    /// Exactly one artifact written
    Partial,
    /// Nothing written
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Per-URL record of a pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct PageOutcome {
    pub page: PageUrl,
    pub paths: Option<ArtifactPaths>,
    pub pdf: ArtifactResult,
    pub text: ArtifactResult,
    /// Fetch failure, when the page never reached conversion
    pub fetch_error: Option<String>,
    /// When the HTML used for the text artifact was retrieved
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub fetch_latency: Option<Duration>,
}

impl PageOutcome {
    /// Outcome for a page whose fetch failed
    pub fn fetch_failed(page: PageUrl, paths: Option<ArtifactPaths>, error: String) -> Self {
        Self {
            page,
            paths,
            pdf: ArtifactResult::NotAttempted,
            text: ArtifactResult::NotAttempted,
            fetch_error: Some(error),
            fetched_at: None,
            fetch_latency: None,
        }
    }

    /// First error recorded for this page, if it is not complete
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(error) = &self.fetch_error {
            return Some(format!("fetch: {error}"));
        }
        let artifact_error = |kind: &str, result: &ArtifactResult| match result {
            ArtifactResult::Failed { error } => Some(format!("{kind}: {error}")),
            ArtifactResult::NotAttempted => Some(format!("{kind}: not attempted")),
            ArtifactResult::Written { .. } => None,
        };
        artifact_error("pdf", &self.pdf).or_else(|| artifact_error("text", &self.text))
    }

    pub fn status(&self) -> OutcomeStatus {
        match (self.pdf.is_written(), self.text.is_written()) {
            (true, true) => OutcomeStatus::Complete,
            (false, false) => OutcomeStatus::Failed,
            _ => OutcomeStatus::Partial,
        }
    }
}

/// Aggregate of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<PageOutcome>,
    /// Pages skipped because both artifacts already existed
    pub already_done: usize,
    /// Pages skipped because an earlier attempt failed
    pub skipped_failed: usize,
    /// Set when the run stopped early on Ctrl-C
    pub interrupted: bool,
}

impl RunSummary {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status() == status).count()
    }

    /// Mean latency of successful fetches in this run
    pub fn average_request_time(&self) -> Option<Duration> {
        let latencies: Vec<Duration> = self
            .outcomes
            .iter()
            .filter_map(|o| o.fetch_latency)
            .collect();

        if latencies.is_empty() {
            return None;
        }

        let total: Duration = latencies.iter().sum();
        Some(total / latencies.len() as u32)
    }
}
