//! External program fetcher
//!
//! Invokes `<program> [args...] <url> <output-path>`. The program must write
//! the page to `output-path` and exit zero; anything else is a failure.

use crate::error::ConvertError;
use crate::fetchers::{PageFetcher, DEFAULT_FETCH_TIMEOUT_SECS};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Fetcher backed by an external program
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    /// Add a leading argument, passed before the URL
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the time bound for one invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl PageFetcher for CommandFetcher {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ConvertError> {
        // Removed when dropped, whatever the outcome
        let output_path = tempfile::Builder::new()
            .prefix("ddb-fetch-")
            .suffix(".part")
            .tempfile()?
            .into_temp_path();

        debug!(program = %self.program.display(), url, "Running fetch program");

        let run = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .arg(&*output_path)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ConvertError::FetchFailed {
                    url: url.to_string(),
                    reason: format!("could not run {}: {}", self.program.display(), e),
                })
            }
            Err(_) => {
                return Err(ConvertError::FetchTimeout {
                    url: url.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::FetchFailed {
                url: url.to_string(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        let body = tokio::fs::read(&output_path).await?;
        if body.is_empty() {
            return Err(ConvertError::EmptyPage {
                url: url.to_string(),
            });
        }

        Ok(Bytes::from(body))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Fetcher running an inline shell script; `$1` is the URL, `$2` the output path
    fn shell(script: &str) -> CommandFetcher {
        CommandFetcher::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .arg("fetch-ddb")
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let fetcher = shell(r#"printf '<html>%s</html>' "$1" > "$2""#);
        let body = fetcher.fetch("https://example.com/a").await.unwrap();
        assert_eq!(&body[..], b"<html>https://example.com/a</html>");
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let fetcher = shell("echo 'forbidden' >&2; exit 3");
        let err = fetcher.fetch("https://example.com/a").await.unwrap_err();
        match err {
            ConvertError::FetchFailed { reason, .. } => assert!(reason.contains("forbidden")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_failure() {
        let fetcher = shell("exit 0");
        let err = fetcher.fetch("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, ConvertError::EmptyPage { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let fetcher = shell("sleep 5").with_timeout(Duration::from_millis(200));
        let err = fetcher.fetch("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, ConvertError::FetchTimeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let fetcher = CommandFetcher::new("/nonexistent/fetch-program");
        let err = fetcher.fetch("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, ConvertError::FetchFailed { .. }));
    }
}
