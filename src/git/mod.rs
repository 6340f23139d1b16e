//! Git repository wrapper
//!
//! Thin async wrapper over the `git` CLI for the repository operations the
//! voice workflow needs: status, diff, log, branches, commit. Output parsing
//! is split into pure functions so it can be tested without a repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

/// One changed file from `git status --porcelain`.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    /// Two-character porcelain status code (e.g. " M", "??", "A ")
    pub status: String,
    pub path: String,
}

/// Parsed `git status --porcelain -b` output.
#[derive(Debug, Clone, Serialize)]
pub struct RepoStatus {
    pub branch: String,
    pub files: Vec<FileStatus>,
    pub clean: bool,
}

/// One commit from `git log`.
#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

/// Result of a commit attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub committed: bool,
    pub output: String,
}

/// Async git operations rooted at one repository path.
pub struct GitManager {
    repo_path: PathBuf,
}

impl GitManager {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    async fn run_git(&self, args: &[&str]) -> Result<String> {
        debug!(?args, repo = %self.repo_path.display(), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to spawn git")?;

        if !output.status.success() {
            // git reports some failures on stdout (e.g. "nothing to commit")
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            bail!("git {} failed: {}", args.join(" "), detail);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Working-tree status with the current branch.
    pub async fn status(&self) -> Result<RepoStatus> {
        let output = self.run_git(&["status", "--porcelain", "-b"]).await?;
        Ok(parse_status(&output))
    }

    /// Diff of unstaged (or staged, with `staged`) changes.
    pub async fn diff(&self, staged: bool) -> Result<String> {
        if staged {
            self.run_git(&["diff", "--cached"]).await
        } else {
            self.run_git(&["diff"]).await
        }
    }

    /// The `n` most recent commits.
    pub async fn log(&self, n: usize) -> Result<Vec<CommitInfo>> {
        let count = format!("-{n}");
        let output = self
            .run_git(&["log", &count, "--pretty=format:%H|%an|%ai|%s"])
            .await?;
        Ok(parse_log(&output))
    }

    /// All local branch names.
    pub async fn branch_list(&self) -> Result<Vec<String>> {
        let output = self.run_git(&["branch"]).await?;
        Ok(parse_branches(&output))
    }

    pub async fn current_branch(&self) -> Result<String> {
        let output = self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(output.trim().to_string())
    }

    /// Stage everything and commit with a message.
    pub async fn commit(&self, message: &str) -> Result<CommitResult> {
        self.run_git(&["add", "-A"]).await?;
        match self.run_git(&["commit", "-m", message]).await {
            Ok(output) => Ok(CommitResult {
                committed: true,
                output: output.trim().to_string(),
            }),
            Err(e) => {
                // "nothing to commit" surfaces here; report without failing
                let text = e.to_string();
                if text.contains("nothing to commit") {
                    Ok(CommitResult {
                        committed: false,
                        output: "nothing to commit".to_string(),
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    pub async fn create_branch(&self, name: &str) -> Result<()> {
        self.run_git(&["checkout", "-b", name]).await?;
        Ok(())
    }
}

/// Parse `git status --porcelain -b` output.
fn parse_status(output: &str) -> RepoStatus {
    let mut branch = String::new();
    let mut files = Vec::new();

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            // "main...origin/main [ahead 1]" -> "main"
            branch = rest
                .split("...")
                .next()
                .unwrap_or(rest)
                .split(' ')
                .next()
                .unwrap_or("")
                .to_string();
        } else if line.len() > 3 {
            files.push(FileStatus {
                status: line[..2].to_string(),
                path: line[3..].to_string(),
            });
        }
    }

    let clean = files.is_empty();
    RepoStatus {
        branch,
        files,
        clean,
    }
}

/// Parse `git log --pretty=format:%H|%an|%ai|%s` output.
fn parse_log(output: &str) -> Vec<CommitInfo> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(4, '|');
            Some(CommitInfo {
                hash: parts.next()?.to_string(),
                author: parts.next()?.to_string(),
                date: parts.next()?.to_string(),
                message: parts.next().unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Parse `git branch` output, stripping the current-branch marker.
fn parse_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_start_matches("* ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
