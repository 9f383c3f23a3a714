//! Integration tests module
//!
//! End-to-end tests of the archive pipeline against mock sites:
//! - Sitemap to store to artifact tree, with resumable runs
//! - Per-page failure handling and recovery
//! - Verification of the produced tree

pub mod error_scenarios;
pub mod fixtures;
pub mod pipeline_test;
