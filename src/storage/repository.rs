//! URL store abstraction
//!
//! The pipeline reaches the persisted page inventory only through the narrow
//! [`UrlStore`] trait, so it runs unchanged against SQLite in production and
//! against [`MemoryUrlStore`] in tests.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   ArchivePipeline / commands │
//! └──────────────────────────────┘
//!                │
//!                ▼
//! ┌──────────────────────────────┐
//! │           UrlStore           │
//! │ insert_many, list_all,       │
//! │ get_by_position, failures    │
//! └──────────────────────────────┘
//!          │             │
//!          ▼             ▼
//! ┌────────────────┐ ┌────────────────┐
//! │ SqliteUrlStore │ │ MemoryUrlStore │
//! └────────────────┘ └────────────────┘
//! ```
//!
//! A position is the 1-based insertion index of a URL and never changes once
//! assigned. Deleting a URL leaves a gap rather than renumbering later ones.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{FailureRecord, PageUrl};

/// Store key for the mean request latency of the last run, in seconds
pub const AVERAGE_REQUEST_TIME_KEY: &str = "average_request_time";

/// Ordered, de-duplicated URL collection with positional addressing
pub trait UrlStore: Send + Sync {
    /// Append URLs not already present, in the given order
    ///
    /// Returns the number of URLs newly inserted.
    fn insert_many(&self, urls: &[String]) -> Result<usize>;

    /// Every stored URL in position order
    fn list_all(&self) -> Result<Vec<PageUrl>>;

    /// URL at `position`, if one exists
    fn get_by_position(&self, position: usize) -> Result<Option<PageUrl>>;

    /// Number of stored URLs
    fn count(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }

    /// Remember that the last attempt at `url` failed, replacing any earlier record
    fn record_failure(&self, url: &str, error: &str, failed_at: DateTime<Utc>) -> Result<()>;

    /// Forget the failure record for `url`, if any
    fn clear_failure(&self, url: &str) -> Result<()>;

    /// Every failure record, ordered by URL
    fn failures(&self) -> Result<Vec<FailureRecord>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite-backed URL store
///
/// Positions are the `AUTOINCREMENT` row ids of `sitemap_urls`, so they stay
/// stable across runs and are never reused after a delete.
pub struct SqliteUrlStore {
    conn: Mutex<Connection>,
}

impl SqliteUrlStore {
    /// Open or create a store at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::debug!(path = %path.display(), "URL store opened");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS sitemap_urls (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT UNIQUE
                );

                CREATE TABLE IF NOT EXISTS scrape_stats (
                    key TEXT PRIMARY KEY,
                    value REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS page_failures (
                    url TEXT PRIMARY KEY,
                    error TEXT NOT NULL,
                    failed_at TEXT NOT NULL
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    /// Replace the URL stored at `position`
    ///
    /// Returns false when no URL has that position.
    pub fn update_url(&self, position: usize, new_url: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE sitemap_urls SET url = ?1 WHERE id = ?2",
                params![new_url, position as i64],
            )
            .with_context(|| format!("Failed to update URL #{position}"))?;
        Ok(changed > 0)
    }

    /// Remove the URL stored at `position`
    ///
    /// Returns false when no URL has that position.
    pub fn delete_url(&self, position: usize) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "DELETE FROM sitemap_urls WHERE id = ?1",
                params![position as i64],
            )
            .with_context(|| format!("Failed to delete URL #{position}"))?;
        Ok(changed > 0)
    }

    /// Read a numeric statistic
    pub fn get_stat(&self, key: &str) -> Result<Option<f64>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM scrape_stats WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read statistic")?;
        Ok(value)
    }

    /// Write a numeric statistic, replacing any previous value
    pub fn set_stat(&self, key: &str, value: f64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO scrape_stats (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            params![key, value],
        )
        .context("Failed to write statistic")?;
        Ok(())
    }
}

fn row_to_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageUrl> {
    let id: i64 = row.get(0)?;
    let url: String = row.get(1)?;
    Ok(PageUrl::new(id as usize, url))
}

impl UrlStore for SqliteUrlStore {
    fn insert_many(&self, urls: &[String]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO sitemap_urls (url) VALUES (?1)")
                .context("Failed to prepare insert")?;
            for url in urls {
                inserted += stmt
                    .execute(params![url])
                    .with_context(|| format!("Failed to insert {url}"))?;
            }
        }

        tx.commit().context("Failed to commit URL insert")?;
        tracing::debug!(offered = urls.len(), inserted = inserted, "Stored URLs");
        Ok(inserted)
    }

    fn list_all(&self) -> Result<Vec<PageUrl>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, url FROM sitemap_urls ORDER BY id")
            .context("Failed to prepare list query")?;

        let pages = stmt
            .query_map([], row_to_page)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list URLs")?;
        Ok(pages)
    }

    fn get_by_position(&self, position: usize) -> Result<Option<PageUrl>> {
        let conn = self.lock()?;
        let page = conn
            .query_row(
                "SELECT id, url FROM sitemap_urls WHERE id = ?1",
                params![position as i64],
                row_to_page,
            )
            .optional()
            .context("Failed to look up URL")?;
        Ok(page)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sitemap_urls", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn record_failure(&self, url: &str, error: &str, failed_at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO page_failures (url, error, failed_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(url) DO UPDATE SET
                    error = excluded.error,
                    failed_at = excluded.failed_at
                "#,
            params![url, error, failed_at.to_rfc3339()],
        )
        .with_context(|| format!("Failed to record failure for {url}"))?;
        Ok(())
    }

    fn clear_failure(&self, url: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM page_failures WHERE url = ?1", params![url])
            .with_context(|| format!("Failed to clear failure for {url}"))?;
        Ok(())
    }

    fn failures(&self) -> Result<Vec<FailureRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT url, error, failed_at FROM page_failures ORDER BY url")
            .context("Failed to prepare failure query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list failures")?;

        rows.into_iter()
            .map(|(url, error, failed_at)| {
                let failed_at = DateTime::parse_from_rfc3339(&failed_at)
                    .with_context(|| format!("Bad failure timestamp for {url}: {failed_at}"))?
                    .with_timezone(&Utc);
                Ok(FailureRecord {
                    url,
                    error,
                    failed_at,
                })
            })
            .collect()
    }
}

// ============================================================================
// In-memory Implementation (for testing)
// ============================================================================

/// In-memory URL store
///
/// Useful for testing the pipeline without a database.
#[derive(Default)]
pub struct MemoryUrlStore {
    urls: RwLock<Vec<String>>,
    failures: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `urls` in order
    pub fn with_urls<S: AsRef<str>>(urls: &[S]) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.urls.write() {
            let mut seen = HashSet::new();
            guard.extend(
                urls.iter()
                    .map(|u| u.as_ref().to_string())
                    .filter(|u| seen.insert(u.clone())),
            );
        }
        store
    }
}

impl UrlStore for MemoryUrlStore {
    fn insert_many(&self, urls: &[String]) -> Result<usize> {
        let mut guard = self
            .urls
            .write()
            .map_err(|_| anyhow!("URL store lock poisoned"))?;

        let mut inserted = 0;
        for url in urls {
            if !guard.contains(url) {
                guard.push(url.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn list_all(&self) -> Result<Vec<PageUrl>> {
        let guard = self
            .urls
            .read()
            .map_err(|_| anyhow!("URL store lock poisoned"))?;
        Ok(guard
            .iter()
            .enumerate()
            .map(|(i, url)| PageUrl::new(i + 1, url.clone()))
            .collect())
    }

    fn get_by_position(&self, position: usize) -> Result<Option<PageUrl>> {
        let guard = self
            .urls
            .read()
            .map_err(|_| anyhow!("URL store lock poisoned"))?;
        Ok(position
            .checked_sub(1)
            .and_then(|i| guard.get(i))
            .map(|url| PageUrl::new(position, url.clone())))
    }

    fn record_failure(&self, url: &str, error: &str, failed_at: DateTime<Utc>) -> Result<()> {
        self.failures
            .write()
            .map_err(|_| anyhow!("URL store lock poisoned"))?
            .insert(url.to_string(), (error.to_string(), failed_at));
        Ok(())
    }

    fn clear_failure(&self, url: &str) -> Result<()> {
        self.failures
            .write()
            .map_err(|_| anyhow!("URL store lock poisoned"))?
            .remove(url);
        Ok(())
    }

    fn failures(&self) -> Result<Vec<FailureRecord>> {
        let guard = self
            .failures
            .read()
            .map_err(|_| anyhow!("URL store lock poisoned"))?;
        let mut records: Vec<FailureRecord> = guard
            .iter()
            .map(|(url, (error, failed_at))| FailureRecord {
                url: url.clone(),
                error: error.clone(),
                failed_at: *failed_at,
            })
            .collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(records)
    }
}
