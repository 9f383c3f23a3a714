//! Test fixtures for integration tests
//!
//! Provides fake PDF renderers, a mock site and pipeline builders.

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object};
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitescribe::crawler::{ArchivePipeline, SitemapParser};
use sitescribe::render::PdfRenderer;
use sitescribe::storage::{ArtifactLayout, SqliteUrlStore, UrlStore};
use sitescribe::utils::error::RenderError;

use crate::common::{article_html, fast_fetcher, sitemap_xml};

/// Page with nothing but navigation and footer
pub const CHROME_ONLY_HTML: &str = r#"<!DOCTYPE html>
<html><body>
  <nav><a href="/">Home</a></nav>
  <footer>Copyright 2024</footer>
</body></html>"#;

/// A one-page PDF document
pub fn pdf_bytes() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialize test PDF");
    out
}

/// Renderer writing a valid PDF, failing for URLs containing any of `fail_on`
#[derive(Default)]
pub struct FakeRenderer {
    fail_on: Vec<String>,
    rendered: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn failing_on(patterns: &[&str]) -> Self {
        Self {
            fail_on: patterns.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    /// URLs rendered so far, in call order
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, url: &str, output: &Path) -> Result<(), RenderError> {
        self.rendered.lock().unwrap().push(url.to_string());

        if self.fail_on.iter().any(|p| url.contains(p.as_str())) {
            // Leave a partial file behind like an interrupted render would
            let _ = std::fs::write(output, b"%PDF-1.5 trunc");
            return Err(RenderError::Failed {
                url: url.to_string(),
                code: Some(1),
                stderr: "Exit with code 1 due to network error".to_string(),
            });
        }

        std::fs::write(output, pdf_bytes()).map_err(|source| RenderError::Io {
            url: url.to_string(),
            source,
        })
    }
}

/// Mock site with `/blog/a`, `/blog/b`, `/about` and a sitemap listing them
pub async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sitemap_xml(&base, &["/blog/a", "/blog/b", "/about"]), "application/xml"),
        )
        .mount(&server)
        .await;

    for (p, title) in [("/blog/a", "Article A"), ("/blog/b", "Article B"), ("/about", "About Us")] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(article_html(title, "Body text.More text."), "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;
    }

    server
}

/// Parse the mock sitemap into a fresh in-memory store
pub async fn store_from_sitemap(server: &MockServer, directories: &[String]) -> Arc<SqliteUrlStore> {
    let urls = SitemapParser::new(reqwest::Client::new())
        .parse(&format!("{}/sitemap.xml", server.uri()), directories)
        .await
        .unwrap();

    let store = SqliteUrlStore::in_memory().unwrap();
    store.insert_many(&urls).unwrap();
    Arc::new(store)
}

pub fn pipeline(
    store: Arc<SqliteUrlStore>,
    renderer: Arc<FakeRenderer>,
    root: &Path,
) -> ArchivePipeline {
    ArchivePipeline::new(store, fast_fetcher(0), renderer, ArtifactLayout::new(root))
}
