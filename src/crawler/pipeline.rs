//! Sequential archive pipeline
//!
//! Turns stored page URLs into artifact pairs, one URL at a time in position
//! order:
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐   ┌───────────────┐
//! │ UrlStore │──▶│ Fetcher │──▶│ PdfRenderer  │──▶│ <path>.pdf    │
//! └──────────┘   └─────────┘   ├──────────────┤   ├───────────────┤
//!                     │        │ContentCleaner│──▶│ <path>.txt    │
//!                     └───────▶└──────────────┘   └───────────────┘
//! ```
//!
//! The renderer loads the URL on its own, so the PDF and the text come from
//! two separate requests to the site.
//!
//! Batch runs can be narrowed to a selection of URLs (the sitemap filter of
//! the current invocation) and can skip URLs whose last attempt failed. The
//! store keeps one failure record per URL until a later attempt completes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sitescribe::crawler::{ArchivePipeline, PageFetcher, RequestPacer};
//! use sitescribe::render::WkhtmltopdfRenderer;
//! use sitescribe::storage::{ArtifactLayout, SqliteUrlStore};
//!
//! # async fn example() -> sitescribe::error::Result<()> {
//! let store = Arc::new(SqliteUrlStore::new("data.db")?);
//! let pacer = Arc::new(RequestPacer::new(Duration::from_secs(10)));
//! let fetcher = PageFetcher::new(pacer)?;
//! let renderer = Arc::new(WkhtmltopdfRenderer::new(
//!     "wkhtmltopdf",
//!     vec!["--quiet".into()],
//!     Duration::from_secs(120),
//! ));
//!
//! let pipeline = ArchivePipeline::new(store, fetcher, renderer, ArtifactLayout::new("pages"));
//! let summary = pipeline.process_all(Some(5)).await?;
//! println!("{} page(s) complete", summary.outcomes.len());
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tokio::sync::watch;

use crate::crawler::fetcher::PageFetcher;
use crate::error::Result;
use crate::models::{ArtifactPaths, ArtifactResult, OutcomeStatus, PageOutcome, PageUrl, RunSummary};
use crate::parser::sanitize::has_content;
use crate::parser::ContentCleaner;
use crate::render::PdfRenderer;
use crate::storage::artifacts::{finalize_part, part_path, write_atomic, ArtifactLayout};
use crate::storage::UrlStore;
use crate::utils::error::PipelineError;

/// Fetch, convert and store pages from a URL store
pub struct ArchivePipeline {
    store: Arc<dyn UrlStore>,
    fetcher: PageFetcher,
    renderer: Arc<dyn PdfRenderer>,
    cleaner: ContentCleaner,
    layout: ArtifactLayout,
    shutdown: Option<watch::Receiver<bool>>,
    /// URLs batch runs may touch; `None` means the whole store
    selection: Option<HashSet<String>>,
    skip_failed: bool,
}

impl ArchivePipeline {
    pub fn new(
        store: Arc<dyn UrlStore>,
        fetcher: PageFetcher,
        renderer: Arc<dyn PdfRenderer>,
        layout: ArtifactLayout,
    ) -> Self {
        Self {
            store,
            fetcher,
            renderer,
            cleaner: ContentCleaner::default(),
            layout,
            shutdown: None,
            selection: None,
            skip_failed: false,
        }
    }

    /// Replace the default content cleaner
    pub fn with_cleaner(mut self, cleaner: ContentCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    /// Stop batch runs between URLs once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Restrict batch runs to `urls`
    ///
    /// Stored URLs outside the selection are ignored by `process_all` and
    /// `render_pdfs`. `fetch_one` addresses a position directly and is not
    /// affected.
    pub fn with_selection<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    /// Skip URLs whose last attempt failed, without counting them toward the limit
    pub fn with_skip_failed(mut self, skip_failed: bool) -> Self {
        self.skip_failed = skip_failed;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Stored pages in position order, narrowed to the selection
    fn stored_pages(&self) -> Result<Vec<PageUrl>> {
        let mut pages = self.store.list_all().map_err(store_error)?;
        if let Some(selection) = &self.selection {
            pages.retain(|page| selection.contains(&page.value));
        }
        Ok(pages)
    }

    /// URLs to pass over in this run because an earlier attempt failed
    fn known_failures(&self) -> Result<HashSet<String>> {
        if !self.skip_failed {
            return Ok(HashSet::new());
        }
        let records = self.store.failures().map_err(store_error)?;
        Ok(records.into_iter().map(|r| r.url).collect())
    }

    /// Keep the store's failure record in step with `outcome`
    fn record_outcome(&self, outcome: &PageOutcome) -> Result<()> {
        let url = &outcome.page.value;
        match outcome.failure_reason() {
            Some(reason) => self
                .store
                .record_failure(url, &reason, Utc::now())
                .map_err(store_error)?,
            None => self.store.clear_failure(url).map_err(store_error)?,
        }
        Ok(())
    }

    /// Produce both artifacts for one page
    ///
    /// Never fails as a whole: every problem is recorded in the outcome. A
    /// failed fetch writes nothing; PDF and text failures are independent.
    pub async fn render_and_store(&self, page: &PageUrl) -> PageOutcome {
        let paths = match self.layout.paths_for(&page.value) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(position = page.position, url = %page.value, error = %e, "Skipping page");
                return PageOutcome::fetch_failed(page.clone(), None, e.to_string());
            }
        };

        tracing::info!(position = page.position, url = %page.value, "Scraping page");

        let raw = match self.fetcher.fetch(&page.value).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(position = page.position, url = %page.value, error = %e, "Fetch failed");
                return PageOutcome::fetch_failed(page.clone(), Some(paths), e.to_string());
            }
        };

        tracing::debug!(
            position = page.position,
            status = raw.status,
            bytes = raw.body.len(),
            latency_ms = raw.latency.as_millis() as u64,
            retrieved_at = %raw.retrieved_at.to_rfc3339(),
            "Fetched page"
        );

        let mut outcome = PageOutcome {
            page: page.clone(),
            paths: Some(paths.clone()),
            pdf: ArtifactResult::NotAttempted,
            text: ArtifactResult::NotAttempted,
            fetch_error: None,
            fetched_at: Some(raw.retrieved_at),
            fetch_latency: Some(raw.latency),
        };

        if let Err(e) = fs::create_dir_all(&paths.dir) {
            let error = format!("cannot create {}: {e}", paths.dir.display());
            tracing::error!(position = page.position, error = %error, "Artifact directory unavailable");
            outcome.pdf = ArtifactResult::Failed {
                error: error.clone(),
            };
            outcome.text = ArtifactResult::Failed { error };
            return outcome;
        }

        outcome.pdf = self.write_pdf(page, &paths).await;
        outcome.text = self.write_text(page, &paths, &raw.body);

        tracing::info!(
            position = page.position,
            url = %page.value,
            status = outcome.status().as_str(),
            "Page processed"
        );
        outcome
    }

    async fn write_pdf(&self, page: &PageUrl, paths: &ArtifactPaths) -> ArtifactResult {
        let part = part_path(&paths.pdf);

        if let Err(e) = self.renderer.render(&page.value, &part).await {
            let _ = fs::remove_file(&part);
            tracing::warn!(position = page.position, url = %page.value, error = %e, "PDF render failed");
            return ArtifactResult::Failed {
                error: e.to_string(),
            };
        }

        match finalize_part(&part, &paths.pdf) {
            Ok(bytes) => {
                tracing::debug!(path = %paths.pdf.display(), bytes = bytes, "Saved PDF");
                ArtifactResult::Written {
                    path: paths.pdf.clone(),
                    bytes,
                }
            }
            Err(e) => {
                tracing::warn!(path = %paths.pdf.display(), error = %e, "Failed to save PDF");
                ArtifactResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn write_text(&self, page: &PageUrl, paths: &ArtifactPaths, html: &str) -> ArtifactResult {
        let cleaned = self.cleaner.clean(html);
        if !has_content(&cleaned) {
            tracing::warn!(position = page.position, url = %page.value, "Cleaned text is empty");
            return ArtifactResult::Failed {
                error: "cleaned text is empty".to_string(),
            };
        }

        match write_atomic(&paths.text, cleaned.as_bytes()) {
            Ok(bytes) => {
                tracing::debug!(path = %paths.text.display(), bytes = bytes, "Saved text");
                ArtifactResult::Written {
                    path: paths.text.clone(),
                    bytes,
                }
            }
            Err(e) => {
                tracing::warn!(path = %paths.text.display(), error = %e, "Failed to save text");
                ArtifactResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Process unprocessed pages in position order
    ///
    /// `limit` bounds how many unprocessed pages are handled; `None` handles
    /// the whole selection. Pages whose artifacts both exist and are non-empty
    /// are skipped without counting toward the limit, as are pages with a
    /// failure record when skipping failures is enabled. Each attempt updates
    /// the page's failure record.
    ///
    /// # Errors
    ///
    /// Only a store failure aborts the run; per-page failures are recorded in
    /// the summary.
    pub async fn process_all(&self, limit: Option<usize>) -> Result<RunSummary> {
        let pages = self.stored_pages()?;
        let failed = self.known_failures()?;
        let mut summary = RunSummary::default();

        tracing::info!(selected = pages.len(), limit = ?limit, "Starting archive run");

        for page in &pages {
            if limit.is_some_and(|max| summary.outcomes.len() >= max) {
                break;
            }
            if self.layout.is_processed(&page.value) {
                summary.already_done += 1;
                continue;
            }
            if failed.contains(&page.value) {
                tracing::debug!(position = page.position, url = %page.value, "Skipping previously failed page");
                summary.skipped_failed += 1;
                continue;
            }
            if self.shutdown_requested() {
                tracing::warn!(position = page.position, "Shutdown requested, stopping run");
                summary.interrupted = true;
                break;
            }

            let outcome = self.render_and_store(page).await;
            self.record_outcome(&outcome)?;
            summary.outcomes.push(outcome);
        }

        log_summary("Archive run finished", &summary);
        Ok(summary)
    }

    /// Process exactly the page at `position`, overwriting existing artifacts
    ///
    /// # Errors
    ///
    /// `PipelineError::IndexOutOfRange` when no page has that position.
    pub async fn fetch_one(&self, position: usize) -> Result<PageOutcome> {
        let page = self
            .store
            .get_by_position(position)
            .map_err(store_error)?;

        let Some(page) = page else {
            let len = self.store.count().map_err(store_error)?;
            return Err(PipelineError::IndexOutOfRange { position, len }.into());
        };

        let outcome = self.render_and_store(&page).await;
        self.record_outcome(&outcome)?;
        Ok(outcome)
    }

    /// Render only the PDF for pages in position order
    ///
    /// Pages that already have a non-empty PDF are skipped. Each render waits
    /// on the fetcher's pacer, so renders are spaced like fetches. Failure
    /// records are honored when skipping is enabled but never written here.
    pub async fn render_pdfs(&self, limit: Option<usize>) -> Result<RunSummary> {
        let pages = self.stored_pages()?;
        let failed = self.known_failures()?;
        let mut summary = RunSummary::default();

        tracing::info!(selected = pages.len(), limit = ?limit, "Starting PDF render run");

        for page in &pages {
            if limit.is_some_and(|max| summary.outcomes.len() >= max) {
                break;
            }

            let paths = match self.layout.paths_for(&page.value) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(position = page.position, error = %e, "Skipping page");
                    summary
                        .outcomes
                        .push(PageOutcome::fetch_failed(page.clone(), None, e.to_string()));
                    continue;
                }
            };

            if fs::metadata(&paths.pdf).is_ok_and(|m| m.len() > 0) {
                summary.already_done += 1;
                continue;
            }
            if failed.contains(&page.value) {
                summary.skipped_failed += 1;
                continue;
            }
            if self.shutdown_requested() {
                tracing::warn!(position = page.position, "Shutdown requested, stopping run");
                summary.interrupted = true;
                break;
            }

            self.fetcher.pacer().wait().await;

            let pdf = match fs::create_dir_all(&paths.dir) {
                Ok(()) => self.write_pdf(page, &paths).await,
                Err(e) => ArtifactResult::Failed {
                    error: format!("cannot create {}: {e}", paths.dir.display()),
                },
            };

            tracing::info!(position = page.position, url = %page.value, rendered = pdf.is_written(), "PDF render finished");
            summary.outcomes.push(PageOutcome {
                page: page.clone(),
                paths: Some(paths),
                pdf,
                text: ArtifactResult::NotAttempted,
                fetch_error: None,
                fetched_at: None,
                fetch_latency: None,
            });
        }

        tracing::info!(
            attempted = summary.outcomes.len(),
            rendered = summary.outcomes.iter().filter(|o| o.pdf.is_written()).count(),
            already_done = summary.already_done,
            skipped_failed = summary.skipped_failed,
            interrupted = summary.interrupted,
            "PDF render run finished"
        );
        Ok(summary)
    }
}

fn store_error(err: anyhow::Error) -> PipelineError {
    PipelineError::Store(format!("{err:#}"))
}

fn log_summary(message: &str, summary: &RunSummary) {
    tracing::info!(
        complete = summary.count(OutcomeStatus::Complete),
        partial = summary.count(OutcomeStatus::Partial),
        failed = summary.count(OutcomeStatus::Failed),
        already_done = summary.already_done,
        skipped_failed = summary.skipped_failed,
        interrupted = summary.interrupted,
        "{message}"
    );
}
