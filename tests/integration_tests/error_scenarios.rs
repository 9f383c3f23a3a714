//! Error scenario integration tests
//!
//! Per-page failures must be recorded without aborting the run and without
//! leaving partial artifacts behind:
//! 1. Fetch failures (404, exhausted retries)
//! 2. Renderer failures
//! 3. Pages that clean to nothing
//! 4. Out-of-range positions

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitescribe::error::Error;
use sitescribe::models::{ArtifactResult, OutcomeStatus};
use sitescribe::storage::{part_path, SqliteUrlStore, UrlStore};
use sitescribe::utils::error::{InvalidReason, PipelineError};
use sitescribe::verify::verify_all;

use super::fixtures::{mock_site, pipeline, store_from_sitemap, FakeRenderer, CHROME_ONLY_HTML};

#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SqliteUrlStore::in_memory().unwrap();
    store
        .insert_many(&[format!("{}/blog/gone", server.uri())])
        .unwrap();

    let renderer = Arc::new(FakeRenderer::default());
    let p = pipeline(Arc::new(store), Arc::clone(&renderer), dir.path());
    let summary = p.process_all(None).await.unwrap();

    assert_eq!(summary.count(OutcomeStatus::Failed), 1);
    let outcome = &summary.outcomes[0];
    assert!(outcome.fetch_error.as_deref().unwrap().contains("404"));
    assert_eq!(outcome.pdf, ArtifactResult::NotAttempted);
    assert_eq!(outcome.text, ArtifactResult::NotAttempted);

    assert!(renderer.rendered().is_empty());
    assert!(!dir.path().join("blog").exists());
    assert!(summary.average_request_time().is_none());
}

#[tokio::test]
async fn test_one_failing_page_does_not_stop_the_run() {
    let server = mock_site().await;
    Mock::given(method("GET"))
        .and(path("/blog/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SqliteUrlStore::in_memory().unwrap();
    let base = server.uri();
    store
        .insert_many(&[
            format!("{base}/blog/a"),
            format!("{base}/blog/broken"),
            format!("{base}/blog/b"),
        ])
        .unwrap();

    let p = pipeline(Arc::new(store), Arc::new(FakeRenderer::default()), dir.path());
    let summary = p.process_all(None).await.unwrap();

    let statuses: Vec<OutcomeStatus> = summary.outcomes.iter().map(|o| o.status()).collect();
    assert_eq!(
        statuses,
        vec![OutcomeStatus::Complete, OutcomeStatus::Failed, OutcomeStatus::Complete]
    );
}

#[tokio::test]
async fn test_render_failure_keeps_text() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    let p = pipeline(store, Arc::new(FakeRenderer::failing_on(&["/blog/b"])), dir.path());

    let summary = p.process_all(None).await.unwrap();
    assert_eq!(summary.count(OutcomeStatus::Complete), 2);
    assert_eq!(summary.count(OutcomeStatus::Partial), 1);

    let failed = &summary.outcomes[1];
    assert!(matches!(&failed.pdf, ArtifactResult::Failed { error } if error.contains("exit code")));
    assert!(failed.text.is_written());

    let pdf = dir.path().join("blog/b.pdf");
    assert!(!pdf.exists());
    assert!(!part_path(&pdf).exists());
    assert!(dir.path().join("blog/b.txt").exists());

    let report = verify_all(dir.path());
    let invalid = report.invalid_artifacts();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].path, pdf);
    assert_eq!(invalid[0].reason, InvalidReason::Missing);
}

#[tokio::test]
async fn test_partial_page_is_retried_on_next_run() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &["/blog/".to_string()]).await;

    let failing = pipeline(
        Arc::clone(&store),
        Arc::new(FakeRenderer::failing_on(&["/blog/a"])),
        dir.path(),
    );
    failing.process_all(None).await.unwrap();
    assert!(!dir.path().join("blog/a.pdf").exists());

    let renderer = Arc::new(FakeRenderer::default());
    let healthy = pipeline(store, Arc::clone(&renderer), dir.path());
    let summary = healthy.process_all(None).await.unwrap();

    assert_eq!(summary.already_done, 1);
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].status(), OutcomeStatus::Complete);
    assert!(verify_all(dir.path()).is_clean());
}

#[tokio::test]
async fn test_chrome_only_page_has_no_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHROME_ONLY_HTML))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SqliteUrlStore::in_memory().unwrap();
    store
        .insert_many(&[format!("{}/empty", server.uri())])
        .unwrap();

    let p = pipeline(Arc::new(store), Arc::new(FakeRenderer::default()), dir.path());
    let outcome = p.fetch_one(1).await.unwrap();

    assert_eq!(outcome.status(), OutcomeStatus::Partial);
    assert!(outcome.pdf.is_written());
    assert!(matches!(outcome.text, ArtifactResult::Failed { .. }));
    assert!(!dir.path().join("empty.txt").exists());
}

#[tokio::test]
async fn test_fetch_one_on_deleted_position() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    assert!(store.delete_url(2).unwrap());

    let p = pipeline(Arc::clone(&store), Arc::new(FakeRenderer::default()), dir.path());

    let err = p.fetch_one(2).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Pipeline(PipelineError::IndexOutOfRange { position: 2, len: 2 })
    ));

    // Positions are stable after a delete
    let outcome = p.fetch_one(3).await.unwrap();
    assert!(outcome.page.value.ends_with("/about"));
}

#[tokio::test]
async fn test_fetch_one_zero_position() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    let p = pipeline(store, Arc::new(FakeRenderer::default()), dir.path());

    assert!(p.fetch_one(0).await.is_err());
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_skip_failed_lets_runs_move_past_a_dead_page() {
    let server = mock_site().await;
    Mock::given(method("GET"))
        .and(path("/blog/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let base = server.uri();
    let store = Arc::new(SqliteUrlStore::in_memory().unwrap());
    store
        .insert_many(&[format!("{base}/blog/gone"), format!("{base}/blog/a")])
        .unwrap();

    // Without skipping, every one-page run retries the dead page
    let p = pipeline(Arc::clone(&store), Arc::new(FakeRenderer::default()), dir.path());
    for _ in 0..2 {
        let summary = p.process_all(Some(1)).await.unwrap();
        assert_eq!(summary.outcomes[0].page.value, format!("{base}/blog/gone"));
        assert_eq!(summary.outcomes[0].status(), OutcomeStatus::Failed);
    }

    let failures = store.failures().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.contains("404"));

    let skipping = pipeline(Arc::clone(&store), Arc::new(FakeRenderer::default()), dir.path())
        .with_skip_failed(true);
    let summary = skipping.process_all(Some(1)).await.unwrap();
    assert_eq!(summary.skipped_failed, 1);
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].page.value, format!("{base}/blog/a"));
    assert_eq!(summary.outcomes[0].status(), OutcomeStatus::Complete);
    assert!(summary.outcomes[0].fetched_at.is_some());
}

#[tokio::test]
async fn test_successful_retry_clears_failure_record() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &["/blog/".to_string()]).await;

    let failing = pipeline(
        Arc::clone(&store),
        Arc::new(FakeRenderer::failing_on(&["/blog/a"])),
        dir.path(),
    );
    failing.process_all(None).await.unwrap();

    let failures = store.failures().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].url.ends_with("/blog/a"));
    assert!(failures[0].error.starts_with("pdf: "));

    let healthy = pipeline(Arc::clone(&store), Arc::new(FakeRenderer::default()), dir.path());
    let outcome = healthy.fetch_one(1).await.unwrap();
    assert_eq!(outcome.status(), OutcomeStatus::Complete);
    assert!(store.failures().unwrap().is_empty());
}
