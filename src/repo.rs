//! Git working-copy management.
//!
//! Drives the `git` binary as a subprocess. The working copy is touched
//! by a single writer only; all repository operations happen after the
//! per-date tasks have completed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Failed to launch git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed with exit code {code}: {stderr}")]
    Git {
        command: String,
        code: i32,
        stderr: String,
    },
}

/// A local clone of the notes repository.
pub struct GitRepo {
    path: PathBuf,
    clone_url: String,
}

impl GitRepo {
    pub fn new(path: impl Into<PathBuf>, clone_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            clone_url: clone_url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a git subcommand inside the working copy, capturing stdout.
    async fn git(&self, args: &[&str]) -> Result<String, RepoError> {
        debug!(?args, path = %self.path.display(), "Running git");

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RepoError::Git {
                command: args.first().copied().unwrap_or("").to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: self.sanitize(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Strip the token-bearing remote URL out of git's error output.
    fn sanitize(&self, stderr: &str) -> String {
        stderr.replace(&self.clone_url, "<remote>").trim().to_string()
    }

    /// Clone the repository if the working copy is absent, else pull.
    pub async fn ensure_ready(&self) -> Result<(), RepoError> {
        if self.path.join(".git").exists() {
            info!(path = %self.path.display(), "Repository exists, pulling latest changes");
            self.git(&["pull"]).await?;
            return Ok(());
        }

        info!(path = %self.path.display(), "Cloning notes repository");

        let output = Command::new("git")
            .arg("clone")
            .arg(&self.clone_url)
            .arg(&self.path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RepoError::Git {
                command: "clone".to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: self.sanitize(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(())
    }

    /// Whether the working tree differs from the last commit.
    pub async fn is_dirty(&self) -> Result<bool, RepoError> {
        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(!status.trim().is_empty())
    }

    /// Stage everything and, if the tree changed, commit and push.
    ///
    /// Returns `true` when a commit was created. A clean tree is an
    /// idempotent no-op.
    pub async fn commit_and_push(&self, message: &str) -> Result<bool, RepoError> {
        self.git(&["add", "-A"]).await?;

        if !self.is_dirty().await? {
            info!("No changes to commit");
            return Ok(false);
        }

        self.git(&["commit", "-m", message]).await?;
        // -u so pulls work even when the clone started from an empty remote
        self.git(&["push", "-u", "origin", "HEAD"]).await?;

        info!("Committed and pushed changes");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Create a bare "remote" and return a GitRepo cloning from it.
    async fn setup_repo(temp: &TempDir) -> GitRepo {
        let remote = temp.path().join("remote.git");
        let status = std::process::Command::new("git")
            .args(["init", "--bare"])
            .arg(&remote)
            .status()
            .unwrap();
        assert!(status.success());

        let repo = GitRepo::new(
            temp.path().join("work"),
            remote.to_string_lossy().to_string(),
        );
        repo.ensure_ready().await.unwrap();

        // Identity needed for commits in a fresh clone
        repo.git(&["config", "user.email", "test@example.com"])
            .await
            .unwrap();
        repo.git(&["config", "user.name", "Test"]).await.unwrap();

        repo
    }

    #[tokio::test]
    async fn test_clone_then_pull() {
        let temp = TempDir::new().unwrap();
        let repo = setup_repo(&temp).await;

        assert!(repo.path().join(".git").exists());

        // First commit so pull has a branch to track
        tokio::fs::write(repo.path().join("seed.md"), "seed")
            .await
            .unwrap();
        assert!(repo.commit_and_push("seed").await.unwrap());

        // Second ensure_ready takes the pull path
        repo.ensure_ready().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_and_push_is_idempotent_on_clean_tree() {
        let temp = TempDir::new().unwrap();
        let repo = setup_repo(&temp).await;

        tokio::fs::write(repo.path().join("note.md"), "content")
            .await
            .unwrap();

        assert!(repo.commit_and_push("Add note").await.unwrap());
        // Nothing changed since, so no second commit
        assert!(!repo.commit_and_push("Add note again").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_dirty_tracks_untracked_files() {
        let temp = TempDir::new().unwrap();
        let repo = setup_repo(&temp).await;

        assert!(!repo.is_dirty().await.unwrap());
        tokio::fs::write(repo.path().join("new.md"), "x").await.unwrap();
        assert!(repo.is_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn test_sanitize_strips_remote_url() {
        let repo = GitRepo::new("/tmp/x", "https://token@github.com/u/r.git");
        let cleaned = repo.sanitize("fatal: https://token@github.com/u/r.git not found");
        assert!(!cleaned.contains("token"));
        assert!(cleaned.contains("<remote>"));
    }
}
