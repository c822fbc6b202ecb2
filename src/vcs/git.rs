//! Version-control collaborator backed by the `git` CLI.

use crate::errors::CollaboratorError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Branch names tried when `origin/HEAD` is not set.
const FALLBACK_DEFAULT_BRANCHES: &[&str] = &["main", "master"];

pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Run `git <args>` and return trimmed-right stdout.
    async fn run(&self, args: &[&str]) -> Result<String, CollaboratorError> {
        let command = format!("git {}", args.join(" "));
        debug!(%command, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CollaboratorError::Unavailable {
                    tool: "git".to_string(),
                },
                _ => CollaboratorError::CommandFailed {
                    command: command.clone(),
                    stderr: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(CollaboratorError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    /// Whether the directory is inside a git work tree.
    pub async fn is_work_tree(&self) -> bool {
        matches!(
            self.run(&["rev-parse", "--is-inside-work-tree"]).await.as_deref(),
            Ok("true")
        )
    }

    /// Tracked files relative to the directory, `/`-separated.
    pub async fn ls_files(&self) -> Result<Vec<String>, CollaboratorError> {
        let out = self.run(&["ls-files", "-z"]).await?;
        Ok(out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn current_branch(&self) -> Result<String, CollaboratorError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// The repository's default branch.
    ///
    /// Uses `origin/HEAD` when set, otherwise the first of `main`/`master`
    /// that exists locally, otherwise `main`.
    pub async fn default_branch(&self) -> String {
        if let Ok(full) = self
            .run(&["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .await
            && let Some(branch) = full.strip_prefix("origin/")
            && !branch.is_empty()
        {
            return branch.to_string();
        }
        for candidate in FALLBACK_DEFAULT_BRANCHES {
            let reference = format!("refs/heads/{}", candidate);
            if self
                .run(&["show-ref", "--verify", "--quiet", &reference])
                .await
                .is_ok()
            {
                return candidate.to_string();
            }
        }
        FALLBACK_DEFAULT_BRANCHES[0].to_string()
    }

    /// Committed changes since `base` plus uncommitted changes.
    pub async fn diff_against(&self, base: &str) -> Result<String, CollaboratorError> {
        let range = format!("{}...HEAD", base);
        let committed = self.run(&["diff", &range]).await.unwrap_or_default();
        let uncommitted = self.run(&["diff", "HEAD"]).await?;
        Ok(match (committed.is_empty(), uncommitted.is_empty()) {
            (true, _) => uncommitted,
            (false, true) => committed,
            (false, false) => format!("{}\n{}", committed, uncommitted),
        })
    }

    /// Files touched by [`Git::diff_against`].
    pub async fn changed_files(&self, base: &str) -> Result<Vec<String>, CollaboratorError> {
        let range = format!("{}...HEAD", base);
        let mut files: Vec<String> = self
            .run(&["diff", "--name-only", &range])
            .await
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect();
        files.extend(
            self.run(&["diff", "--name-only", "HEAD"])
                .await?
                .lines()
                .map(str::to_string),
        );
        files.retain(|f| !f.is_empty());
        files.sort();
        files.dedup();
        Ok(files)
    }

    pub async fn push_branch(&self, branch: &str) -> Result<(), CollaboratorError> {
        self.run(&["push", "-u", "origin", branch]).await.map(|_| ())
    }
}
