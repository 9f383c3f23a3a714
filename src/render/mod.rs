//! PDF rendering through an external HTML-to-PDF engine
//!
//! The renderer navigates to the page URL itself; it does not reuse the HTML
//! the fetcher downloaded for the text artifact.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::RenderConfig;
use crate::utils::error::RenderError;

/// Renders a URL into a PDF file
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Render `url` to `output`
    ///
    /// On success `output` exists and is non-empty. On failure it may be
    /// missing or hold partial data; callers write to a scratch path.
    async fn render(&self, url: &str, output: &Path) -> Result<(), RenderError>;
}

/// `wkhtmltopdf` subprocess renderer
#[derive(Debug, Clone)]
pub struct WkhtmltopdfRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl WkhtmltopdfRenderer {
    /// Create a renderer invoking `program [args...] <url> <output>`
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            config.wkhtmltopdf_path.clone(),
            config.extra_args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl PdfRenderer for WkhtmltopdfRenderer {
    async fn render(&self, url: &str, output: &Path) -> Result<(), RenderError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(url)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %self.program.display(), url = %url, output = %output.display(), "Rendering PDF");

        // Dropping the output future on timeout kills the child
        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RenderError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            })?;

        let finished = result.map_err(|source| RenderError::Launch {
            program: self.program.display().to_string(),
            source,
        })?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(RenderError::Failed {
                url: url.to_string(),
                code: finished.status.code(),
                stderr: stderr.trim().chars().take(500).collect(),
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => {
                let _ = tokio::fs::remove_file(output).await;
                Err(RenderError::EmptyOutput {
                    url: url.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::EmptyOutput {
                url: url.to_string(),
            }),
            Err(source) => Err(RenderError::Io {
                url: url.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn renderer(program: &str, args: &[&str], timeout_ms: u64) -> WkhtmltopdfRenderer {
        WkhtmltopdfRenderer::new(
            program,
            args.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let r = renderer("sitescribe-no-such-renderer", &[], 5_000);
        let err = r
            .render("https://example.com", &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Launch { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = RenderConfig::default();
        let r = WkhtmltopdfRenderer::from_config(&config);
        assert_eq!(r.program(), Path::new("wkhtmltopdf"));
        assert_eq!(r.timeout, Duration::from_secs(config.timeout_secs));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let r = renderer("sh", &["-c", "echo broken >&2; exit 3", "sh"], 5_000);
        let err = r
            .render("https://example.com", &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        match err {
            RenderError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output() {
        let dir = TempDir::new().unwrap();
        let r = renderer("sh", &["-c", "exit 0", "sh"], 5_000);
        let err = r
            .render("https://example.com", &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyOutput { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_writes_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("a.pdf");
        // $1 is the URL and $2 the output path
        let r = renderer("sh", &["-c", "printf '%%PDF-1.4' > \"$2\"", "sh"], 5_000);
        r.render("https://example.com", &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_renderer() {
        let dir = TempDir::new().unwrap();
        let r = renderer("sh", &["-c", "sleep 5", "sh"], 200);
        let started = std::time::Instant::now();
        let err = r
            .render("https://example.com", &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
