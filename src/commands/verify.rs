use anyhow::{Context, Result};

use sitescribe::config::Config;
use sitescribe::verify::verify_all;

/// Verify the artifact tree; returns whether every artifact is valid
pub fn verify(config: &Config, json: bool) -> Result<bool> {
    let root = &config.storage.pages_dir;
    let report = verify_all(root);

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{out}");
        return Ok(report.is_clean());
    }

    println!("Verifying {}", root.display());
    println!("==========");
    for invalid in report.invalid_artifacts() {
        println!("  {}: {}", invalid.path.display(), invalid.reason);
    }
    println!("Valid: {}", report.valid);
    println!("Invalid: {}", report.invalid);

    if report.is_clean() {
        println!("All artifacts are valid");
    }
    Ok(report.is_clean())
}
