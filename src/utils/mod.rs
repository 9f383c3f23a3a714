//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Format a number of seconds as days, hours, minutes and seconds
///
/// Larger units are only shown when non-zero; seconds are always shown with
/// two decimals.
pub fn format_seconds(total: f64) -> String {
    let total = total.max(0.0);
    let days = (total / 86_400.0).floor();
    let rem = total - days * 86_400.0;
    let hours = (rem / 3_600.0).floor();
    let rem = rem - hours * 3_600.0;
    let minutes = (rem / 60.0).floor();
    let secs = rem - minutes * 60.0;

    let plural = |n: f64| if n > 1.0 { "s" } else { "" };

    let mut parts = Vec::new();
    if days >= 1.0 {
        parts.push(format!("{days} day{}", plural(days)));
    }
    if hours >= 1.0 {
        parts.push(format!("{hours} hour{}", plural(hours)));
    }
    if minutes >= 1.0 {
        parts.push(format!("{minutes} minute{}", plural(minutes)));
    }
    let secs_suffix = if (secs - 1.0).abs() < f64::EPSILON { "" } else { "s" };
    parts.push(format!("{secs:.2} second{secs_suffix}"));

    parts.join(", ")
}

/// Format byte size as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return String::from("0 B");
    }

    let base: f64 = 1024.0;
    let exponent = (bytes as f64).log(base).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes as f64 / base.powi(exponent as i32);

    format!("{value:.2} {}", UNITS[exponent])
}

/// Entry that could not be read during a directory scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub path: PathBuf,
    pub error: String,
}

/// Regular files found below a root, plus the entries that could not be read
#[derive(Debug, Default)]
pub struct FileScan {
    /// Sorted by path
    pub files: Vec<PathBuf>,
    pub errors: Vec<ScanError>,
}

/// Walk `root` recursively without following symlinks
///
/// An unreadable entry is recorded in `errors` and the walk carries on with
/// its siblings.
pub fn scan_files(root: &Path) -> FileScan {
    let mut scan = FileScan::default();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => scan.files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::warn!(path = %path.display(), error = %e, "Cannot read directory entry");
                scan.errors.push(ScanError {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    scan.files.sort();
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "0.00 seconds");
        assert_eq!(format_seconds(1.0), "1.00 second");
        assert_eq!(format_seconds(100.0), "1 minute, 40.00 seconds");
        assert_eq!(format_seconds(3_725.5), "1 hour, 2 minutes, 5.50 seconds");
        assert_eq!(
            format_seconds(2.0 * 86_400.0 + 60.0),
            "2 days, 1 minute, 0.00 seconds"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
    }

    #[test]
    fn test_scan_files_sorted_and_recursive() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/z.txt"), "z").unwrap();
        fs::write(dir.path().join("b/y.txt"), "y").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let scan = scan_files(dir.path());
        assert!(scan.errors.is_empty());
        let files: Vec<PathBuf> = scan
            .files
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b/c/z.txt"),
                PathBuf::from("b/y.txt"),
            ]
        );
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let scan = scan_files(&dir.path().join("absent"));
        assert!(scan.files.is_empty());
        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.errors[0].path, dir.path().join("absent"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_continues_past_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.txt"), "h").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("z.txt"), "z").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores directory permissions
        let denied = fs::read_dir(&locked).is_err();

        let scan = scan_files(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(scan.files.contains(&dir.path().join("a.txt")));
        assert!(scan.files.contains(&dir.path().join("z.txt")));

        if denied {
            assert_eq!(scan.errors.len(), 1);
            assert_eq!(scan.errors[0].path, locked);
        }
    }
}
