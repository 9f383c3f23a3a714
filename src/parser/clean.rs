//! Boilerplate stripping and text extraction
//!
//! [`ContentCleaner`] turns a fetched HTML document into readable plain text:
//! navigation, headers, footers, scripts and other chrome are dropped, block
//! elements become lines, and known marketing phrases are removed.

use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::parser::sanitize::{
    collapse_horizontal_whitespace, fix_missing_space_after_period, phrase_pattern,
    remove_control_chars, remove_phrases, remove_zero_width,
};

/// Phrases stripped from cleaned text unless configured otherwise
pub const DEFAULT_BOILERPLATE_PHRASES: &[&str] = &[
    "For individualsFor teamsResourcesConferencesSee upcoming start dates",
    "Subscribe to The Product Blog",
    "By sharing your email, you agree to our Privacy Policy and Terms of Service",
    "Resources you might like",
    "Enjoyed the article? You might like this too",
    "Share this postYour EmailSubscribe",
    "Discover where Product is heading next",
];

/// Elements dropped with their whole subtree
const NOISE_TAGS: &[&str] = &[
    "nav", "header", "footer", "script", "style", "noscript", "iframe", "svg", "form", "aside",
    "template", "button", "select",
];

/// Class/id words marking page chrome
const NOISE_MARKERS: &[&str] = &[
    "navbar",
    "nav",
    "menu",
    "breadcrumb",
    "breadcrumbs",
    "cookie",
    "cookies",
    "newsletter",
    "subscribe",
    "share",
    "social",
    "sidebar",
    "related",
    "advert",
    "ad",
    "ads",
    "banner",
    "popup",
    "modal",
];

/// Elements rendered on their own line
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "tr",
    "ul",
];

// Content roots in order of preference
static CONTENT_ROOTS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["main", "article", "body"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

/// HTML to plain text cleaner
///
/// Pure and deterministic: the same input always yields the same text, and
/// cleaning the cleaner's own output returns it unchanged.
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    phrases: Option<Regex>,
}

impl Default for ContentCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_BOILERPLATE_PHRASES)
    }
}

impl ContentCleaner {
    /// Create a cleaner removing the given boilerplate phrases
    pub fn new<S: AsRef<str>>(boilerplate_phrases: &[S]) -> Self {
        Self {
            phrases: phrase_pattern(boilerplate_phrases),
        }
    }

    /// Extract clean text from an HTML document
    ///
    /// Returns an empty string when nothing readable remains. Entities are
    /// decoded exactly once, so page text that spells out markup
    /// (`&lt;nav&gt;`) comes back as literal `<nav>`. Cleaning the result
    /// again is a no-op as long as it holds no `<` or `&`; otherwise the
    /// second pass reads that text as markup.
    pub fn clean(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let root = CONTENT_ROOTS
            .iter()
            .find_map(|selector| document.select(selector).next())
            .unwrap_or_else(|| document.root_element());

        let mut raw = String::with_capacity(html.len() / 4);
        collect_text(root, &mut raw);

        let text = remove_control_chars(&remove_zero_width(&raw));
        let cleaned = text
            .lines()
            .map(|line| self.clean_line(line))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        tracing::trace!(input_bytes = html.len(), output_bytes = cleaned.len(), "Cleaned HTML");
        cleaned
    }

    fn clean_line(&self, line: &str) -> String {
        let line = collapse_horizontal_whitespace(line);
        let line = match &self.phrases {
            Some(pattern) => remove_phrases(&line, pattern),
            None => line.trim().to_string(),
        };
        fix_missing_space_after_period(&line)
    }
}

/// Append the readable text below `element` to `out`
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if is_noise(el) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };

                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }

                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                } else if matches!(name, "td" | "th") {
                    out.push(' ');
                }

                collect_text(child_ref, out);

                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn is_noise(el: &Element) -> bool {
    if NOISE_TAGS.contains(&el.name()) {
        return true;
    }
    if el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true") {
        return true;
    }
    if matches!(el.attr("role"), Some("navigation" | "banner" | "contentinfo")) {
        return true;
    }

    el.classes().any(has_marker) || el.id().is_some_and(has_marker)
}

/// Whether a class or id contains a chrome marker word
///
/// The value is split on `-` and `_` and compared word by word, so
/// `cookie-banner` and `site_nav` match while `shared` and `advice` do not.
fn has_marker(value: &str) -> bool {
    value
        .split(['-', '_'])
        .any(|word| NOISE_MARKERS.iter().any(|m| word.eq_ignore_ascii_case(m)))
}
