//! XML sitemap download and parsing
//!
//! Handles the standard `<urlset><url><loc>` format. Namespace prefixes are
//! ignored; entries are returned in document order.

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::BTreeSet;
use url::Url;

use crate::utils::error::{NetworkError, SitemapError};

/// Sitemap parser bound to an HTTP client
#[derive(Clone)]
pub struct SitemapParser {
    client: Client,
}

impl SitemapParser {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download the sitemap and return its page URLs
    ///
    /// # Arguments
    ///
    /// * `sitemap_url` - Absolute sitemap URL
    /// * `directories` - Path prefixes to keep; empty keeps every URL
    ///
    /// # Errors
    ///
    /// `SitemapError::Network` when the download fails,
    /// `SitemapError::Malformed` when the body is not a URL set
    pub async fn parse(
        &self,
        sitemap_url: &str,
        directories: &[String],
    ) -> Result<Vec<String>, SitemapError> {
        tracing::info!(sitemap = %sitemap_url, "Fetching sitemap");

        let xml = self.download(sitemap_url).await?;
        let urls = parse_sitemap_xml(&xml)?;
        let total = urls.len();
        let urls = filter_by_directories(urls, directories);

        tracing::info!(
            sitemap = %sitemap_url,
            total = total,
            kept = urls.len(),
            directories = ?directories,
            "Parsed sitemap"
        );
        Ok(urls)
    }

    /// Distinct first path segments of every sitemap URL
    pub async fn list_directories(
        &self,
        sitemap_url: &str,
    ) -> Result<BTreeSet<String>, SitemapError> {
        let xml = self.download(sitemap_url).await?;
        let urls = parse_sitemap_xml(&xml)?;
        Ok(top_level_directories(&urls))
    }

    async fn download(&self, sitemap_url: &str) -> Result<String, NetworkError> {
        let response = self
            .client
            .get(sitemap_url)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(sitemap_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: sitemap_url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| NetworkError::from_reqwest(sitemap_url, e))
    }
}

/// Parse sitemap XML into `<loc>` values in document order
///
/// A well-formed `<urlset>` with no entries yields an empty list. Any other
/// root element, or XML that does not parse, is malformed.
pub fn parse_sitemap_xml(xml: &str) -> Result<Vec<String>, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut in_url = false;
    let mut loc: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            SitemapError::Malformed(format!(
                "XML error at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if depth == 0 {
                    if saw_root {
                        return Err(SitemapError::Malformed(
                            "multiple root elements".to_string(),
                        ));
                    }
                    check_root(name)?;
                    saw_root = true;
                } else if depth == 1 && name == b"url" {
                    in_url = true;
                } else if depth == 2 && in_url && name == b"loc" {
                    loc = Some(String::new());
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if saw_root {
                        return Err(SitemapError::Malformed(
                            "multiple root elements".to_string(),
                        ));
                    }
                    check_root(e.local_name().as_ref())?;
                    saw_root = true;
                }
            }
            Event::Text(text) => {
                if let Some(buf) = loc.as_mut() {
                    let value = text
                        .unescape()
                        .map_err(|e| SitemapError::Malformed(format!("bad <loc> text: {e}")))?;
                    buf.push_str(&value);
                } else if depth == 0 && !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(SitemapError::Malformed(
                        "text outside the root element".to_string(),
                    ));
                }
            }
            Event::CData(data) => {
                if let Some(buf) = loc.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let name = e.local_name();
                let name = name.as_ref();
                if depth == 2 && name == b"loc" {
                    if let Some(value) = loc.take() {
                        let value = value.trim();
                        if !value.is_empty() {
                            urls.push(value.to_string());
                        }
                    }
                } else if depth == 1 && name == b"url" {
                    in_url = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(SitemapError::Malformed("document has no root element".to_string()));
    }
    if depth != 0 {
        return Err(SitemapError::Malformed(
            "unexpected end of document".to_string(),
        ));
    }

    Ok(urls)
}

fn check_root(name: &[u8]) -> Result<(), SitemapError> {
    match name {
        b"urlset" => Ok(()),
        b"sitemapindex" => Err(SitemapError::Malformed(
            "sitemap index files are not supported; pass a child sitemap".to_string(),
        )),
        other => Err(SitemapError::Malformed(format!(
            "expected <urlset> root, found <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Normalize a directory prefix to `/segment/` form
pub fn normalize_directory(dir: &str) -> String {
    let trimmed = dir.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(trimmed);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Keep URLs whose path starts with one of `directories`
///
/// An empty `directories` slice keeps everything, including URLs that do not
/// parse. With a filter, unparsable URLs are dropped.
pub fn filter_by_directories(urls: Vec<String>, directories: &[String]) -> Vec<String> {
    if directories.is_empty() {
        return urls;
    }

    let prefixes: Vec<String> = directories.iter().map(|d| normalize_directory(d)).collect();

    urls.into_iter()
        .filter(|raw| match Url::parse(raw) {
            Ok(parsed) => prefixes.iter().any(|p| parsed.path().starts_with(p.as_str())),
            Err(e) => {
                tracing::warn!(url = %raw, error = %e, "Skipping unparsable sitemap URL");
                false
            }
        })
        .collect()
}

/// First path segment of every URL, de-duplicated and sorted
pub fn top_level_directories(urls: &[String]) -> BTreeSet<String> {
    urls.iter()
        .filter_map(|raw| Url::parse(raw).ok())
        .filter_map(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}
