//! Artifact verification
//!
//! Walks an artifact tree and checks every `.pdf` and `.txt` file:
//!
//! - PDFs must be non-empty, parse, and contain at least one page
//! - Text files must hold something other than whitespace
//! - Each artifact must have its partner (`foo.pdf` next to `foo.txt`)
//!
//! Verification is read-only and produces a fresh [`VerificationReport`]
//! every time; nothing is persisted.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::{InvalidArtifact, InvalidReason};
use crate::utils::scan_files;

/// What a report entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Pdf,
    Text,
    /// The artifact root or a directory below it
    Directory,
}

/// Verification result for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactCheck {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Page count of a valid PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    /// `None` when the artifact is valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<InvalidReason>,
}

impl ArtifactCheck {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }
}

/// Outcome of one verification pass
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub root: PathBuf,
    pub entries: Vec<ArtifactCheck>,
    pub valid: usize,
    pub invalid: usize,
}

impl VerificationReport {
    fn from_entries(root: &Path, entries: Vec<ArtifactCheck>) -> Self {
        let valid = entries.iter().filter(|e| e.is_valid()).count();
        Self {
            root: root.to_path_buf(),
            invalid: entries.len() - valid,
            valid,
            entries,
        }
    }

    /// True when no entry is invalid
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }

    /// Invalid entries as errors, in report order
    pub fn invalid_artifacts(&self) -> Vec<InvalidArtifact> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.invalid.clone().map(|reason| InvalidArtifact {
                    path: e.path.clone(),
                    reason,
                })
            })
            .collect()
    }
}

/// Verify every artifact under `root`
///
/// A missing or non-directory root yields a report with a single `Missing`
/// entry. A subdirectory or file that cannot be read becomes an `Unreadable`
/// entry and the rest of the tree is still checked. Files other than `.pdf`
/// and `.txt` (including `.part` leftovers) are ignored.
pub fn verify_all(root: &Path) -> VerificationReport {
    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "Artifact directory not found");
        return VerificationReport::from_entries(
            root,
            vec![ArtifactCheck {
                path: root.to_path_buf(),
                kind: ArtifactKind::Directory,
                pages: None,
                invalid: Some(InvalidReason::Missing),
            }],
        );
    }

    let scan = scan_files(root);
    let files = scan.files;
    let mut entries: Vec<ArtifactCheck> = scan
        .errors
        .into_iter()
        .map(|e| ArtifactCheck {
            kind: artifact_kind(&e.path).unwrap_or(ArtifactKind::Directory),
            path: e.path,
            pages: None,
            invalid: Some(InvalidReason::Unreadable(e.error)),
        })
        .collect();

    let present: BTreeSet<&PathBuf> = files.iter().collect();

    for path in &files {
        let (kind, partner_ext, partner_kind) = match artifact_kind(path) {
            Some(ArtifactKind::Pdf) => (ArtifactKind::Pdf, "txt", ArtifactKind::Text),
            Some(ArtifactKind::Text) => (ArtifactKind::Text, "pdf", ArtifactKind::Pdf),
            _ => continue,
        };

        let check = match kind {
            ArtifactKind::Pdf => check_pdf(path),
            _ => check_text(path),
        };
        if let Some(reason) = &check.invalid {
            tracing::debug!(path = %path.display(), reason = %reason, "Invalid artifact");
        }
        entries.push(check);

        let partner = path.with_extension(partner_ext);
        if !present.contains(&partner) {
            tracing::debug!(path = %partner.display(), "Artifact pair incomplete");
            entries.push(ArtifactCheck {
                path: partner,
                kind: partner_kind,
                pages: None,
                invalid: Some(InvalidReason::Missing),
            });
        }
    }

    let report = VerificationReport::from_entries(root, entries);
    tracing::info!(
        root = %root.display(),
        valid = report.valid,
        invalid = report.invalid,
        "Verification finished"
    );
    report
}

fn artifact_kind(path: &Path) -> Option<ArtifactKind> {
    match path.extension()?.to_str()? {
        "pdf" => Some(ArtifactKind::Pdf),
        "txt" => Some(ArtifactKind::Text),
        _ => None,
    }
}

/// Check a single PDF file
pub fn check_pdf(path: &Path) -> ArtifactCheck {
    let (pages, invalid) = match fs::read(path) {
        Err(e) => (None, Some(InvalidReason::Unreadable(e.to_string()))),
        Ok(bytes) if bytes.is_empty() => (None, Some(InvalidReason::Empty)),
        Ok(bytes) => match lopdf::Document::load_mem(&bytes) {
            Err(e) => (None, Some(InvalidReason::Corrupt(e.to_string()))),
            Ok(doc) => match doc.get_pages().len() {
                0 => (Some(0), Some(InvalidReason::Empty)),
                n => (Some(n), None),
            },
        },
    };

    ArtifactCheck {
        path: path.to_path_buf(),
        kind: ArtifactKind::Pdf,
        pages,
        invalid,
    }
}

/// Check a single text file
pub fn check_text(path: &Path) -> ArtifactCheck {
    let invalid = match fs::read(path) {
        Err(e) => Some(InvalidReason::Unreadable(e.to_string())),
        Ok(bytes) => match std::str::from_utf8(&bytes) {
            Err(e) => Some(InvalidReason::Corrupt(format!("not UTF-8: {e}"))),
            Ok(text) if text.trim().is_empty() => Some(InvalidReason::Empty),
            Ok(_) => None,
        },
    };

    ArtifactCheck {
        path: path.to_path_buf(),
        kind: ArtifactKind::Text,
        pages: None,
        invalid,
    }
}
