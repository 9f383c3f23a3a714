//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sitescribe::crawler::{PageFetcher, RequestPacer};
use sitescribe::utils::retry::RetryConfig;

/// Build a `<urlset>` sitemap listing `paths` under `base`
pub fn sitemap_xml(base: &str, paths: &[&str]) -> String {
    let entries: String = paths
        .iter()
        .map(|p| format!("  <url><loc>{base}{p}</loc><lastmod>2024-01-15</lastmod></url>\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</urlset>\n"
    )
}

/// A small article page wrapped in site chrome
pub fn article_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title><style>body {{ color: red; }}</style></head>
<body>
  <nav><a href="/">Home</a><a href="/blog/">Blog</a></nav>
  <header class="site-header">Product School</header>
  <main>
    <article>
      <h1>{title}</h1>
      <p>{body}</p>
      <p>Subscribe to The Product Blog</p>
    </article>
  </main>
  <footer>Copyright 2024</footer>
  <script>console.log("tracking");</script>
</body>
</html>"#
    )
}

/// Fetcher with no pacing and fast retries
pub fn fast_fetcher(max_retries: u32) -> PageFetcher {
    fetcher_with_pacer(Arc::new(RequestPacer::unthrottled()), max_retries)
}

pub fn fetcher_with_pacer(pacer: Arc<RequestPacer>, max_retries: u32) -> PageFetcher {
    PageFetcher::with_config(
        pacer,
        RetryConfig::with_delays(max_retries, 10, 50),
        Duration::from_secs(2),
        "sitescribe-test",
    )
    .unwrap()
}
