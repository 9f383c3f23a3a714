//! Sitemap discovery and rate-limited page retrieval
//!
//! This module covers everything that talks to the target site: reading the
//! sitemap, pacing and retrying page requests, and the sequential pipeline
//! that turns stored URLs into artifacts.

pub mod fetcher;
pub mod pacer;
pub mod pipeline;
pub mod sitemap;

pub use fetcher::PageFetcher;
pub use pacer::RequestPacer;
pub use pipeline::ArchivePipeline;
pub use sitemap::SitemapParser;
