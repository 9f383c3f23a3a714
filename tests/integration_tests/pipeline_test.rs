//! End-to-end pipeline tests: sitemap, store, fetch, render, clean, verify

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use sitescribe::crawler::SitemapParser;
use sitescribe::models::OutcomeStatus;
use sitescribe::storage::{merge_text_files, SqliteUrlStore, UrlStore};
use sitescribe::verify::verify_all;

use crate::common::article_html;

use super::fixtures::{mock_site, pipeline, store_from_sitemap, FakeRenderer};

#[tokio::test]
async fn test_filtered_run_resumes_across_invocations() {
    let server = mock_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    let store = store_from_sitemap(&server, &["/blog/".to_string()]).await;
    assert_eq!(store.count().unwrap(), 2);

    let renderer = Arc::new(FakeRenderer::default());
    let p = pipeline(Arc::clone(&store), Arc::clone(&renderer), dir.path());

    // First run handles only /blog/a
    let first = p.process_all(Some(1)).await.unwrap();
    assert_eq!(first.outcomes.len(), 1);
    assert_eq!(first.outcomes[0].page.value, format!("{base}/blog/a"));
    assert_eq!(first.outcomes[0].status(), OutcomeStatus::Complete);
    assert_eq!(first.already_done, 0);
    assert!(first.average_request_time().is_some());

    let blog = dir.path().join("blog");
    assert!(blog.join("a.pdf").exists());
    assert!(blog.join("a.txt").exists());
    assert!(!blog.join("b.pdf").exists());

    // Second run skips /blog/a and handles /blog/b
    let second = p.process_all(Some(1)).await.unwrap();
    assert_eq!(second.already_done, 1);
    assert_eq!(second.outcomes.len(), 1);
    assert_eq!(second.outcomes[0].page.value, format!("{base}/blog/b"));

    // Nothing left
    let third = p.process_all(None).await.unwrap();
    assert!(third.outcomes.is_empty());
    assert_eq!(third.already_done, 2);

    assert_eq!(
        renderer.rendered(),
        vec![format!("{base}/blog/a"), format!("{base}/blog/b")]
    );
    assert!(!dir.path().join("about.pdf").exists());

    let report = verify_all(dir.path());
    assert!(report.is_clean(), "{:?}", report.invalid_artifacts());
    assert_eq!(report.valid, 4);
}

#[tokio::test]
async fn test_text_artifact_is_cleaned() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    let p = pipeline(store, Arc::new(FakeRenderer::default()), dir.path());

    let outcome = p.fetch_one(3).await.unwrap();
    assert_eq!(outcome.status(), OutcomeStatus::Complete);

    let text = fs::read_to_string(dir.path().join("about.txt")).unwrap();
    assert_eq!(text, "About Us\nBody text. More text.");
}

#[tokio::test]
async fn test_fetch_one_overwrites_existing_artifacts() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    let renderer = Arc::new(FakeRenderer::default());
    let p = pipeline(store, Arc::clone(&renderer), dir.path());

    let text_path = dir.path().join("blog").join("a.txt");
    fs::create_dir_all(text_path.parent().unwrap()).unwrap();
    fs::write(&text_path, "stale").unwrap();

    let outcome = p.fetch_one(1).await.unwrap();
    assert_eq!(outcome.status(), OutcomeStatus::Complete);
    assert!(fs::read_to_string(&text_path).unwrap().starts_with("Article A"));
    assert_eq!(renderer.rendered().len(), 1);
}

#[tokio::test]
async fn test_positions_follow_sitemap_order() {
    let server = mock_site().await;
    let base = server.uri();
    let store = store_from_sitemap(&server, &[]).await;

    let pages = store.list_all().unwrap();
    let positions: Vec<(usize, String)> = pages.into_iter().map(|p| (p.position, p.value)).collect();
    assert_eq!(
        positions,
        vec![
            (1, format!("{base}/blog/a")),
            (2, format!("{base}/blog/b")),
            (3, format!("{base}/about")),
        ]
    );

    // Re-inserting the same sitemap adds nothing
    let again = store
        .insert_many(&[format!("{base}/blog/a"), format!("{base}/blog/b")])
        .unwrap();
    assert_eq!(again, 0);
    assert_eq!(store.count().unwrap(), 3);
}

#[tokio::test]
async fn test_render_pdfs_only_writes_pdfs() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    let renderer = Arc::new(FakeRenderer::default());
    let p = pipeline(store, Arc::clone(&renderer), dir.path());

    let summary = p.render_pdfs(Some(2)).await.unwrap();
    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.outcomes.iter().all(|o| o.pdf.is_written()));
    assert!(dir.path().join("blog/a.pdf").exists());
    assert!(!dir.path().join("blog/a.txt").exists());

    // Existing PDFs are skipped on the next run
    let next = p.render_pdfs(None).await.unwrap();
    assert_eq!(next.already_done, 2);
    assert_eq!(next.outcomes.len(), 1);
    assert_eq!(renderer.rendered().len(), 3);
}

#[tokio::test]
async fn test_merge_after_run() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let store = store_from_sitemap(&server, &[]).await;
    let p = pipeline(store, Arc::new(FakeRenderer::default()), dir.path());
    p.process_all(None).await.unwrap();

    let merged = dir.path().join("merged_content.txt");
    assert_eq!(merge_text_files(dir.path(), &merged).unwrap(), 3);

    let content = fs::read_to_string(&merged).unwrap();
    let about = content.find("=== about.txt ===").unwrap();
    let blog_a = content.find("=== blog/a.txt ===").unwrap();
    assert!(about < blog_a);
    assert!(content.contains("Article B"));
}

#[tokio::test]
async fn test_filtered_run_ignores_other_stored_pages() {
    let server = mock_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    // An earlier unfiltered run stored every page
    let store = store_from_sitemap(&server, &[]).await;
    assert_eq!(store.count().unwrap(), 3);

    let selected = SitemapParser::new(reqwest::Client::new())
        .parse(&format!("{base}/sitemap.xml"), &["/blog/".to_string()])
        .await
        .unwrap();
    assert_eq!(store.insert_many(&selected).unwrap(), 0);

    let renderer = Arc::new(FakeRenderer::default());
    let p = pipeline(store, Arc::clone(&renderer), dir.path()).with_selection(selected);

    let summary = p.process_all(Some(3)).await.unwrap();
    let processed: Vec<&str> = summary.outcomes.iter().map(|o| o.page.value.as_str()).collect();
    assert_eq!(
        processed,
        vec![format!("{base}/blog/a"), format!("{base}/blog/b")]
    );

    let pdfs = p.render_pdfs(None).await.unwrap();
    assert!(pdfs.outcomes.is_empty());
    assert_eq!(pdfs.already_done, 2);

    assert!(!dir.path().join("about.pdf").exists());
    assert!(!dir.path().join("about.txt").exists());
    assert_eq!(renderer.rendered().len(), 2);
}

#[tokio::test]
async fn test_root_and_home_pages_both_archived() {
    let server = mock_site().await;
    let base = server.uri();
    for (p, title) in [("/", "Front Page"), ("/home", "Home Page")] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(article_html(title, "Welcome."), "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let store = SqliteUrlStore::in_memory().unwrap();
    store
        .insert_many(&[format!("{base}/"), format!("{base}/home")])
        .unwrap();

    let renderer = Arc::new(FakeRenderer::default());
    let p = pipeline(Arc::new(store), Arc::clone(&renderer), dir.path());
    let summary = p.process_all(None).await.unwrap();

    assert_eq!(summary.already_done, 0);
    assert_eq!(summary.count(OutcomeStatus::Complete), 2);
    assert_eq!(renderer.rendered(), vec![format!("{base}/"), format!("{base}/home")]);

    let front = fs::read_to_string(dir.path().join("_home.txt")).unwrap();
    let home = fs::read_to_string(dir.path().join("home.txt")).unwrap();
    assert!(front.starts_with("Front Page"));
    assert!(home.starts_with("Home Page"));

    let report = verify_all(dir.path());
    assert!(report.is_clean(), "{:?}", report.invalid_artifacts());
    assert_eq!(report.valid, 4);
}
