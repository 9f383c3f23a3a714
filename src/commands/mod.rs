pub mod database;
pub mod scrape;
pub mod text;
pub mod verify;

// Re-export command functions for convenience
pub use database::{db_delete, db_show, db_update};
pub use scrape::{estimate_time, fetch_page, fetch_pages, list_directories, list_pages, render_pdf};
pub use text::{text_flatten, text_merge};
pub use verify::verify;
