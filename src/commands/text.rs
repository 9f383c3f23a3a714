use anyhow::Result;
use std::path::Path;

use sitescribe::config::Config;
use sitescribe::storage::{flatten_text_files, merge_text_files};

pub fn text_merge(config: &Config, output: &Path) -> Result<()> {
    let merged = merge_text_files(&config.storage.pages_dir, output)?;
    println!("Merged {merged} text file(s) into {}", output.display());
    Ok(())
}

pub fn text_flatten(config: &Config, output_dir: &Path) -> Result<()> {
    let copied = flatten_text_files(&config.storage.pages_dir, output_dir)?;
    println!("Copied {copied} text file(s) into {}", output_dir.display());
    Ok(())
}
