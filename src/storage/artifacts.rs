//! Artifact tree layout and atomic file writes
//!
//! Every page URL maps to a fixed pair of paths under the artifact root:
//!
//! | URL                               | Artifacts                            |
//! |-----------------------------------|--------------------------------------|
//! | `https://site/`                   | `_home.pdf`, `_home.txt`             |
//! | `https://site/blog/foo`           | `blog/foo.pdf`, `blog/foo.txt`       |
//! | `https://site/blog/`              | `blog/_index.pdf`, `blog/_index.txt` |
//! | `https://site/blog//foo`          | `blog/_empty/foo.pdf`, ...           |
//! | `https://site/blog/list?page=2`   | `blog/list~<hash>.pdf`, ...          |
//!
//! The mapping depends only on the URL path and query, so reruns overwrite in
//! place and the verifier can pair files without any side index.
//!
//! Distinct URL paths always get distinct files. Real segments are escaped
//! with `%XX` for `%`, `~`, characters invalid in file names, a leading `_`,
//! and every `.` in a directory name. Names starting with `_` and the `~`
//! query suffix are therefore reserved for generated names, and a directory
//! can never share a name with a `.pdf` or `.txt` file.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

use crate::models::ArtifactPaths;
use crate::utils::error::PipelineError;

/// Extension of in-progress writes
pub const PART_EXTENSION: &str = "part";

/// Basename used for the site root
const HOME_NAME: &str = "_home";

/// Basename used for a path ending in `/`
const INDEX_NAME: &str = "_index";

/// Directory name used for an empty path segment (`//`)
const EMPTY_SEGMENT_NAME: &str = "_empty";

/// Separates the basename from the query hash
const QUERY_SEPARATOR: char = '~';

/// Hex digits of the query hash appended to the basename
const QUERY_HASH_LEN: usize = 16;

/// Maps page URLs to artifact locations under one root directory
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact locations for `url`
    ///
    /// # Errors
    ///
    /// `PipelineError::UnmappableUrl` when the URL does not parse or has no
    /// hierarchical path (for example `mailto:`).
    pub fn paths_for(&self, url: &str) -> Result<ArtifactPaths, PipelineError> {
        let parsed = Url::parse(url).map_err(|_| PipelineError::UnmappableUrl(url.to_string()))?;
        let segments: Vec<&str> = parsed
            .path_segments()
            .ok_or_else(|| PipelineError::UnmappableUrl(url.to_string()))?
            .collect();

        let (dirs, last) = match segments.split_last() {
            Some((last, dirs)) => (dirs, *last),
            None => (&[][..], ""),
        };

        let mut dir = self.root.clone();
        for segment in dirs {
            if segment.is_empty() {
                dir.push(EMPTY_SEGMENT_NAME);
            } else {
                dir.push(escape_segment(segment, true));
            }
        }

        let mut base = if !last.is_empty() {
            escape_segment(last, false)
        } else if dirs.is_empty() {
            HOME_NAME.to_string()
        } else {
            INDEX_NAME.to_string()
        };

        if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
            base.push(QUERY_SEPARATOR);
            base.push_str(&query_hash(query));
        }

        Ok(ArtifactPaths {
            pdf: dir.join(format!("{base}.pdf")),
            text: dir.join(format!("{base}.txt")),
            dir,
        })
    }

    /// Whether both artifacts for `url` exist and are non-empty
    pub fn is_processed(&self, url: &str) -> bool {
        self.paths_for(url)
            .map(|paths| is_non_empty_file(&paths.pdf) && is_non_empty_file(&paths.text))
            .unwrap_or(false)
    }
}

/// Reversible file-name form of one URL path segment
fn escape_segment(segment: &str, is_dir: bool) -> String {
    let dots_only = segment.chars().all(|c| c == '.');
    let mut out = String::with_capacity(segment.len());

    for (i, c) in segment.char_indices() {
        let reserved = matches!(c, '%' | '~' | '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            || c.is_control()
            || (i == 0 && c == '_')
            || (c == '.' && (is_dir || dots_only));

        if reserved {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn query_hash(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(QUERY_HASH_LEN);
    hex
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// In-progress sibling of `path` (`foo.pdf` becomes `foo.pdf.part`)
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(PART_EXTENSION);
    PathBuf::from(name)
}

/// Write `contents` to `path` via a `.part` sibling and a rename
///
/// Returns the number of bytes written. A failed write leaves no file under
/// the final name.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<u64> {
    let part = part_path(path);
    if let Err(e) = fs::write(&part, contents) {
        let _ = fs::remove_file(&part);
        return Err(e);
    }
    finalize_part(&part, path)
}

/// Move a completed `.part` file into place
///
/// An empty part file is discarded and reported as an error.
pub fn finalize_part(part: &Path, path: &Path) -> io::Result<u64> {
    let bytes = fs::metadata(part)?.len();

    if bytes == 0 {
        let _ = fs::remove_file(part);
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is empty", part.display()),
        ));
    }

    if let Err(e) = fs::rename(part, path) {
        let _ = fs::remove_file(part);
        return Err(e);
    }
    Ok(bytes)
}
