use anyhow::{bail, Context, Result};
use std::collections::HashMap;

use sitescribe::config::Config;
use sitescribe::storage::{SqliteUrlStore, UrlStore};

fn open_store(config: &Config) -> Result<SqliteUrlStore> {
    SqliteUrlStore::new(&config.storage.sqlite_path).with_context(|| {
        format!(
            "Failed to open URL store at {}",
            config.storage.sqlite_path.display()
        )
    })
}

pub fn db_show(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let pages = store.list_all()?;

    if pages.is_empty() {
        println!("No URLs stored in {}", config.storage.sqlite_path.display());
        return Ok(());
    }

    let failures: HashMap<String, String> = store
        .failures()?
        .into_iter()
        .map(|r| (r.url, format!("{} at {}", r.error, r.failed_at.format("%Y-%m-%d %H:%M"))))
        .collect();

    for page in &pages {
        match failures.get(&page.value) {
            Some(failure) => println!("{:>5}  {}  [failed: {failure}]", page.position, page.value),
            None => println!("{:>5}  {}", page.position, page.value),
        }
    }
    println!("\nTotal: {}", pages.len());
    if !failures.is_empty() {
        println!("Last attempt failed: {}", failures.len());
    }
    Ok(())
}

pub fn db_update(config: &Config, index: usize, new_url: &str) -> Result<()> {
    url::Url::parse(new_url).with_context(|| format!("Not an absolute URL: {new_url}"))?;

    let store = open_store(config)?;
    if !store.update_url(index, new_url)? {
        bail!("No URL stored at position {index}");
    }

    tracing::info!(position = index, url = %new_url, "Updated stored URL");
    println!("Updated #{index} to {new_url}");
    Ok(())
}

pub fn db_delete(config: &Config, index: usize) -> Result<()> {
    let store = open_store(config)?;
    if !store.delete_url(index)? {
        bail!("No URL stored at position {index}");
    }

    tracing::info!(position = index, "Deleted stored URL");
    println!("Deleted #{index}");
    Ok(())
}
