use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use sitescribe::config::Config;
use sitescribe::crawler::{ArchivePipeline, PageFetcher, RequestPacer, SitemapParser};
use sitescribe::estimate::estimate_run;
use sitescribe::models::{ArtifactResult, OutcomeStatus, PageOutcome, RunSummary};
use sitescribe::parser::ContentCleaner;
use sitescribe::render::WkhtmltopdfRenderer;
use sitescribe::storage::{ArtifactLayout, SqliteUrlStore, UrlStore, AVERAGE_REQUEST_TIME_KEY};
use sitescribe::utils::{format_bytes, format_seconds};

fn build_fetcher(config: &Config) -> Result<PageFetcher> {
    let pacer = Arc::new(RequestPacer::new(config.rate_interval()));
    PageFetcher::from_config(config, pacer).context("Failed to create fetcher")
}

fn open_store(config: &Config) -> Result<Arc<SqliteUrlStore>> {
    let store = SqliteUrlStore::new(&config.storage.sqlite_path).with_context(|| {
        format!(
            "Failed to open URL store at {}",
            config.storage.sqlite_path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Download and filter the configured sitemap
async fn discover(config: &Config, fetcher: &PageFetcher) -> Result<Vec<String>> {
    SitemapParser::new(fetcher.client().clone())
        .parse(&config.scraper.sitemap_url, &config.scraper.directories)
        .await
        .with_context(|| format!("Failed to read sitemap {}", config.scraper.sitemap_url))
}

/// Parse the sitemap into the store, returning the sitemap's URLs
async fn refresh_store(config: &Config, fetcher: &PageFetcher, store: &SqliteUrlStore) -> Result<Vec<String>> {
    let urls = discover(config, fetcher).await?;
    let inserted = store.insert_many(&urls)?;
    println!("Found {} URLs in the sitemap ({inserted} new)", urls.len());
    Ok(urls)
}

fn build_pipeline(config: &Config, fetcher: PageFetcher, store: Arc<SqliteUrlStore>) -> ArchivePipeline {
    ArchivePipeline::new(
        store,
        fetcher,
        Arc::new(WkhtmltopdfRenderer::from_config(&config.render)),
        ArtifactLayout::new(&config.storage.pages_dir),
    )
    .with_cleaner(ContentCleaner::new(&config.cleaner.boilerplate_phrases))
    .with_shutdown(shutdown_signal())
}

/// Flips to true on the first Ctrl-C; a second Ctrl-C exits immediately
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Ctrl-C detected, stopping after the current page");
        let _ = tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second Ctrl-C, exiting now");
            std::process::exit(130);
        }
    });
    rx
}

pub async fn list_directories(config: &Config) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let directories = SitemapParser::new(fetcher.client().clone())
        .list_directories(&config.scraper.sitemap_url)
        .await
        .with_context(|| format!("Failed to read sitemap {}", config.scraper.sitemap_url))?;

    println!("Directories in {}", config.scraper.sitemap_url);
    println!("==============");
    for dir in &directories {
        println!("/{dir}/");
    }
    println!("\nTotal: {}", directories.len());
    Ok(())
}

pub async fn list_pages(config: &Config) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let store = open_store(config)?;
    let urls = refresh_store(config, &fetcher, &store).await?;

    let wanted: HashSet<&str> = urls.iter().map(String::as_str).collect();
    for page in store.list_all()? {
        if wanted.contains(page.value.as_str()) {
            println!("{:>5}  {}", page.position, page.value);
        }
    }
    Ok(())
}

pub async fn estimate_time(config: &Config) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let urls = discover(config, &fetcher).await?;
    let store = open_store(config)?;

    let average = store
        .get_stat(AVERAGE_REQUEST_TIME_KEY)?
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);
    if average.is_none() {
        tracing::info!("No recorded request time, using the default");
    }

    let run = estimate_run(urls.len(), config.rate_interval(), average);

    println!("Time Estimate");
    println!("=============");
    println!("Number of URLs:         {}", run.page_count);
    println!("Rate limit:             {}", format_seconds(run.interval.as_secs_f64()));
    println!(
        "Average request time:   {}",
        format_seconds(run.average_request_time.as_secs_f64())
    );
    println!(
        "Per page:               {}",
        format_seconds((run.interval + run.per_page_overhead).as_secs_f64())
    );
    println!("Total with overhead:    {}", run.human_total());
    Ok(())
}

pub async fn fetch_page(config: &Config, index: usize) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let store = open_store(config)?;
    refresh_store(config, &fetcher, &store).await?;

    let pipeline = build_pipeline(config, fetcher, store);
    let outcome = pipeline.fetch_one(index).await?;

    print_outcome(&outcome);
    if outcome.status() == OutcomeStatus::Failed {
        anyhow::bail!("Page #{index} could not be archived");
    }
    Ok(())
}

pub async fn fetch_pages(config: &Config, number_of_pages: Option<usize>, skip_failed: bool) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let store = open_store(config)?;
    let urls = refresh_store(config, &fetcher, &store).await?;

    let pipeline = build_pipeline(config, fetcher, Arc::clone(&store))
        .with_selection(urls)
        .with_skip_failed(skip_failed);
    let summary = pipeline.process_all(number_of_pages).await?;

    print_summary("Fetch Summary", &summary);

    match summary.average_request_time() {
        Some(average) => {
            store.set_stat(AVERAGE_REQUEST_TIME_KEY, average.as_secs_f64())?;
            println!("Average request time: {:.4} seconds", average.as_secs_f64());
        }
        None => tracing::warn!("No successful requests to calculate average request time"),
    }
    Ok(())
}

pub async fn render_pdf(config: &Config, number_of_pages: Option<usize>, skip_failed: bool) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let store = open_store(config)?;
    let urls = refresh_store(config, &fetcher, &store).await?;

    let pipeline = build_pipeline(config, fetcher, store)
        .with_selection(urls)
        .with_skip_failed(skip_failed);
    let summary = pipeline.render_pdfs(number_of_pages).await?;

    println!("\nRender Summary");
    println!("==============");
    for outcome in &summary.outcomes {
        println!("  {}  {}", artifact_label(&outcome.pdf), outcome.page);
    }
    let rendered = summary.outcomes.iter().filter(|o| o.pdf.is_written()).count();
    println!("Rendered: {rendered}");
    println!("Failed: {}", summary.outcomes.len() - rendered);
    println!("Already rendered: {}", summary.already_done);
    if summary.skipped_failed > 0 {
        println!("Skipped after earlier failure: {}", summary.skipped_failed);
    }
    if summary.interrupted {
        println!("Stopped early by Ctrl-C");
    }
    Ok(())
}

fn artifact_label(result: &ArtifactResult) -> String {
    match result {
        ArtifactResult::Written { bytes, .. } => format!("ok ({})", format_bytes(*bytes)),
        ArtifactResult::Failed { error } => format!("failed: {error}"),
        ArtifactResult::NotAttempted => "not attempted".to_string(),
    }
}

fn print_outcome(outcome: &PageOutcome) {
    println!("[{}] {}", outcome.status().as_str(), outcome.page);
    if let Some(error) = &outcome.fetch_error {
        println!("    fetch: {error}");
        return;
    }
    if let Some(at) = outcome.fetched_at {
        println!("    fetched: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("    pdf:  {}", artifact_label(&outcome.pdf));
    println!("    text: {}", artifact_label(&outcome.text));
}

fn print_summary(title: &str, summary: &RunSummary) {
    println!("\n{title}");
    println!("{}", "=".repeat(title.len()));
    for outcome in &summary.outcomes {
        print_outcome(outcome);
    }
    println!("Complete: {}", summary.count(OutcomeStatus::Complete));
    println!("Partial: {}", summary.count(OutcomeStatus::Partial));
    println!("Failed: {}", summary.count(OutcomeStatus::Failed));
    println!("Already done: {}", summary.already_done);
    if summary.skipped_failed > 0 {
        println!("Skipped after earlier failure: {}", summary.skipped_failed);
    }
    if summary.interrupted {
        println!("Stopped early by Ctrl-C; rerun to resume");
    }
}
