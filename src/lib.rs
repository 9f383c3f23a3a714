//! sitescribe - sitemap-driven page archiver
//!
//! Reads a site's XML sitemap, stores the page inventory, and archives every
//! page twice: as a rendered PDF and as cleaned plain text. A verification
//! pass checks the resulting artifact tree.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Sitemap parsing, paced fetching and the archive pipeline
//! - [`parser`] - HTML cleaning and text extraction
//! - [`render`] - PDF rendering through `wkhtmltopdf`
//! - [`storage`] - URL store and artifact layout
//! - [`verify`] - Artifact verification
//! - [`estimate`] - Run duration estimates
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sitescribe::config::Config;
//! use sitescribe::crawler::{ArchivePipeline, PageFetcher, RequestPacer, SitemapParser};
//! use sitescribe::render::WkhtmltopdfRenderer;
//! use sitescribe::storage::{ArtifactLayout, SqliteUrlStore, UrlStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pacer = Arc::new(RequestPacer::new(config.rate_interval()));
//!     let fetcher = PageFetcher::from_config(&config, pacer)?;
//!
//!     let urls = SitemapParser::new(fetcher.client().clone())
//!         .parse(&config.scraper.sitemap_url, &config.scraper.directories)
//!         .await?;
//!
//!     let store = Arc::new(SqliteUrlStore::new(&config.storage.sqlite_path)?);
//!     store.insert_many(&urls)?;
//!
//!     let pipeline = ArchivePipeline::new(
//!         store,
//!         fetcher,
//!         Arc::new(WkhtmltopdfRenderer::from_config(&config.render)),
//!         ArtifactLayout::new(&config.storage.pages_dir),
//!     );
//!     pipeline.process_all(Some(10)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod estimate;
pub mod models;
pub mod parser;
pub mod render;
pub mod storage;
pub mod utils;
pub mod verify;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{ArchivePipeline, PageFetcher, RequestPacer, SitemapParser};
    pub use crate::error::{Error, Result};
    pub use crate::models::{OutcomeStatus, PageOutcome, PageUrl, RunSummary};
    pub use crate::parser::ContentCleaner;
    pub use crate::render::{PdfRenderer, WkhtmltopdfRenderer};
    pub use crate::storage::{ArtifactLayout, MemoryUrlStore, SqliteUrlStore, UrlStore};
    pub use crate::verify::{verify_all, VerificationReport};
}

// Direct re-exports for convenience
pub use models::{PageOutcome, PageUrl, RunSummary};
