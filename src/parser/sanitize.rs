//! Text sanitization utilities for cleaning extracted page content
//!
//! This module provides the line-level passes applied after HTML text
//! extraction: invisible character removal, whitespace normalization,
//! boilerplate phrase removal and sentence spacing repair.

use regex::Regex;
use std::sync::LazyLock;

// Runs of whitespace other than newline
static HORIZONTAL_WS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

static MISSING_SPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])\.([A-Z])").expect("valid regex"));

/// Remove zero-width spaces and similar invisible characters
///
/// # Examples
///
/// ```
/// use sitescribe::parser::sanitize::remove_zero_width;
///
/// let text = "a\u{200B}b\u{FEFF}c";
/// assert_eq!(remove_zero_width(text), "abc");
/// ```
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Collapse spaces, tabs and non-breaking spaces to one space
///
/// Newlines are left alone.
///
/// # Examples
///
/// ```
/// use sitescribe::parser::sanitize::collapse_horizontal_whitespace;
///
/// assert_eq!(collapse_horizontal_whitespace("a \t\u{a0} b\nc"), "a b\nc");
/// ```
pub fn collapse_horizontal_whitespace(text: &str) -> String {
    HORIZONTAL_WS_REGEX.replace_all(text, " ").to_string()
}

/// Build a case-insensitive matcher for boilerplate phrases
///
/// The match swallows surrounding whitespace and trailing `.`, `?` or `!`.
/// Returns `None` when no non-empty phrase is given.
pub fn phrase_pattern<S: AsRef<str>>(phrases: &[S]) -> Option<Regex> {
    let escaped: Vec<String> = phrases
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(regex::escape)
        .collect();

    if escaped.is_empty() {
        return None;
    }

    Regex::new(&format!(r"(?i)\s*(?:{})[.?!]*\s*", escaped.join("|"))).ok()
}

/// Remove every match of `pattern`, leaving single spaces between neighbours
pub fn remove_phrases(text: &str, pattern: &Regex) -> String {
    let replaced = pattern.replace_all(text, " ");
    collapse_horizontal_whitespace(&replaced).trim().to_string()
}

/// Insert the missing space in `end.Start` sentence joins
///
/// Only a lowercase letter, a period and an uppercase letter qualify, so
/// host names and decimals are left intact.
///
/// # Examples
///
/// ```
/// use sitescribe::parser::sanitize::fix_missing_space_after_period;
///
/// assert_eq!(fix_missing_space_after_period("word.Another"), "word. Another");
/// assert_eq!(fix_missing_space_after_period("example.com 3.14"), "example.com 3.14");
/// ```
pub fn fix_missing_space_after_period(text: &str) -> String {
    MISSING_SPACE_REGEX.replace_all(text, "$1. $2").to_string()
}

/// Check if text contains meaningful content
///
/// Returns false if text is empty or only whitespace
pub fn has_content(text: &str) -> bool {
    !text.trim().is_empty()
}
