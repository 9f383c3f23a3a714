//! Persistence for the page inventory and the artifact tree
//!
//! - [`repository`]: the URL store (SQLite and in-memory)
//! - [`artifacts`]: URL to file layout and atomic writes
//! - [`textfiles`]: merge and flatten helpers over text artifacts

pub mod artifacts;
pub mod repository;
pub mod textfiles;

pub use artifacts::{finalize_part, part_path, write_atomic, ArtifactLayout};
pub use repository::{MemoryUrlStore, SqliteUrlStore, UrlStore, AVERAGE_REQUEST_TIME_KEY};
pub use textfiles::{flatten_text_files, merge_text_files};
