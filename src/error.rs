//! Unified error handling for the sitescribe crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! Per-page failures never reach this type: the pipeline records them in
//! each `PageOutcome`. `Error` carries only the failures that abort a whole
//! command (store access, sitemap download, position lookup).

use thiserror::Error;

pub use crate::utils::error::{
    FetchError, InvalidArtifact, InvalidReason, NetworkError, PipelineError, RenderError,
    SitemapError,
};

/// Unified error type for the sitescribe crate
#[derive(Error, Debug)]
pub enum Error {
    /// Sitemap download or parse errors
    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),

    /// Page fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Pipeline addressing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Store or filesystem failure reported through `anyhow`
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
