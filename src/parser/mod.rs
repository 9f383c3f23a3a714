//! HTML cleaning and text extraction
//!
//! This module turns fetched HTML into the plain-text artifact: chrome and
//! boilerplate are stripped by [`ContentCleaner`], and [`sanitize`] holds the
//! line-level text passes it applies.

pub mod clean;
pub mod sanitize;

pub use clean::{ContentCleaner, DEFAULT_BOILERPLATE_PHRASES};
