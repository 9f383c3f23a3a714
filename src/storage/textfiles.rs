//! Post-processing of text artifacts
//!
//! Merges every `.txt` artifact into one corpus file, or copies them into a
//! single flat directory with names derived from their relative paths.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::utils::scan_files;

/// Default corpus file written by [`merge_text_files`]
pub const DEFAULT_MERGED_FILE: &str = "merged_content.txt";

/// Default directory written by [`flatten_text_files`]
pub const DEFAULT_FLATTENED_DIR: &str = "cleaned_pages";

/// `.txt` files under `root` as (absolute, relative) pairs, sorted by relative path
fn text_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let scan = scan_files(root);
    if let Some(first) = scan.errors.first() {
        bail!(
            "Cannot read {} entr{} under {}, first {}: {}",
            scan.errors.len(),
            if scan.errors.len() == 1 { "y" } else { "ies" },
            root.display(),
            first.path.display(),
            first.error
        );
    }

    Ok(scan
        .files
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .filter_map(|p| {
            let relative = p.strip_prefix(root).ok()?.to_path_buf();
            Some((p, relative))
        })
        .collect())
}

/// Concatenate every `.txt` under `root` into `output`
///
/// Each section is headed by the file's relative path. `output` itself is
/// skipped if it lives under `root`. Returns the number of files merged.
pub fn merge_text_files(root: &Path, output: &Path) -> Result<usize> {
    let files = text_files(root)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let output_abs = output.canonicalize().ok();
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );

    let mut merged = 0;
    for (path, relative) in files {
        if output_abs.is_some() && path.canonicalize().ok() == output_abs {
            continue;
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        if merged > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "=== {} ===", relative.display())?;
        writeln!(writer, "{}", content.trim_end())?;
        merged += 1;
    }

    writer.flush()?;
    tracing::info!(files = merged, output = %output.display(), "Merged text files");
    Ok(merged)
}

/// Flat file name for a relative artifact path (`blog/foo.txt` becomes `blog_foo.txt`)
pub fn flattened_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("_")
}

/// Distinct flat names for `relatives`, in input order
///
/// Top-level files keep their own name. A nested path whose joined name is
/// already taken (`blog/foo.txt` next to a top-level `blog_foo.txt`) gets a
/// short hash of its relative path before the extension.
pub fn flattened_names(relatives: &[&Path]) -> Vec<String> {
    let is_top_level = |p: &Path| p.components().count() == 1;

    let mut taken: HashSet<String> = relatives
        .iter()
        .filter(|r| is_top_level(r))
        .map(|r| flattened_name(r))
        .collect();

    relatives
        .iter()
        .map(|relative| {
            let name = flattened_name(relative);
            if is_top_level(relative) {
                return name;
            }
            let name = if taken.contains(&name) {
                let renamed = disambiguate(&name, relative);
                tracing::warn!(path = %relative.display(), name = %renamed, "Flattened name already taken");
                renamed
            } else {
                name
            };
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn disambiguate(name: &str, relative: &Path) -> String {
    let digest = Sha256::digest(relative.to_string_lossy().as_bytes());
    let mut hash = format!("{digest:x}");
    hash.truncate(8);

    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{hash}.{ext}"),
        None => format!("{name}-{hash}"),
    }
}

/// Copy every `.txt` under `root` into `output_dir` with flattened names
///
/// Returns the number of files copied.
pub fn flatten_text_files(root: &Path, output_dir: &Path) -> Result<usize> {
    let files = text_files(root)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let relatives: Vec<&Path> = files.iter().map(|(_, r)| r.as_path()).collect();
    let names = flattened_names(&relatives);

    let mut copied = 0;
    for ((path, _), name) in files.iter().zip(names) {
        let target = output_dir.join(name);
        fs::copy(path, &target).with_context(|| {
            format!("Failed to copy {} to {}", path.display(), target.display())
        })?;
        tracing::debug!(from = %path.display(), to = %target.display(), "Copied text file");
        copied += 1;
    }

    tracing::info!(files = copied, output_dir = %output_dir.display(), "Flattened text files");
    Ok(copied)
}
