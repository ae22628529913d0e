//! Version-control operations on the content working copy.

use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("`{program}` is not available: {source}")]
    NotFound {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed (exit {exit_code:?}): {stderr}")]
    Exit {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("invalid revision `{revision}`")]
    InvalidRevision { revision: String },
    #[error("commit message must not be empty")]
    EmptyMessage,
}

/// Source-control capability over the content working copy.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Fetch and merge upstream changes.
    async fn pull(&self) -> Result<(), VcsError>;

    /// Move the working copy to `revision`.
    async fn checkout(&self, revision: &str) -> Result<(), VcsError>;

    /// Record all working-copy changes with `message`.
    async fn commit(&self, message: &str) -> Result<(), VcsError>;

    /// Publish local commits upstream.
    async fn push(&self) -> Result<(), VcsError>;
}

/// Reject revisions that are empty or could be parsed as options.
pub fn validate_revision(revision: &str) -> Result<(), VcsError> {
    let trimmed = revision.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') || trimmed.chars().any(char::is_whitespace) {
        return Err(VcsError::InvalidRevision {
            revision: revision.to_string(),
        });
    }
    Ok(())
}

/// [`VersionControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), VcsError> {
        let command = format!("git {}", args.join(" "));
        let started_at = Instant::now();

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "verso::vcs",
                    op = %command,
                    result = "error",
                    error_code = "spawn",
                    error = %err,
                    "Failed to spawn version control command"
                );
                if err.kind() == ErrorKind::NotFound {
                    VcsError::NotFound {
                        program: self.program.display().to_string(),
                        source: err,
                    }
                } else {
                    VcsError::Spawn {
                        command: command.clone(),
                        source: err,
                    }
                }
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                warn!(
                    target = "verso::vcs",
                    op = %command,
                    result = "error",
                    error_code = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Version control command timed out"
                );
                return Err(VcsError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
        };

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "verso::vcs",
                op = %command,
                result = "error",
                error_code = "exit_status",
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                elapsed_ms,
                stderr = %stderr,
                "Version control command failed"
            );
            return Err(VcsError::Exit {
                command,
                exit_code,
                stderr,
            });
        }

        info!(
            target = "verso::vcs",
            op = %command,
            result = "ok",
            elapsed_ms,
            "Version control command completed"
        );
        Ok(())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn pull(&self) -> Result<(), VcsError> {
        self.run(&["pull"]).await
    }

    async fn checkout(&self, revision: &str) -> Result<(), VcsError> {
        validate_revision(revision)?;
        self.run(&["checkout", revision.trim()]).await
    }

    async fn commit(&self, message: &str) -> Result<(), VcsError> {
        if message.trim().is_empty() {
            return Err(VcsError::EmptyMessage);
        }
        self.run(&["add", "--all"]).await?;
        self.run(&["commit", "-m", message]).await
    }

    async fn push(&self) -> Result<(), VcsError> {
        self.run(&["push"]).await
    }
}
