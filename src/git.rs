//! Optional git integration for the password store.
//!
//! Version control is treated as an external command sequence run in the
//! store root; nothing here parses repository state beyond `git status
//! --porcelain`. Failures surface the command's combined output verbatim
//! and retries are always user-initiated.

use crate::error::{Result, StoreError};
use std::path::Path;
use std::process::Command;

/// Outcome of a commit or sync run, for the front end to display.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncReport {
    /// Nothing to commit (and, for sync, nothing pulled either way).
    NoChanges,
    /// Local changes were committed (and pushed, for sync).
    Committed,
}

/// Steps of a sync run, reported to the caller for progress display.
pub const SYNC_STEPS: &[&str] = &["fetch", "pull", "commit", "push"];

fn run_git(store_root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(store_root)
        .output()
        .map_err(|e| StoreError::Other(format!("Failed to run git: {e}")))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(StoreError::GitFailed {
            diagnostic: format!("git {}\n{combined}", args.join(" ")),
        });
    }

    Ok(combined)
}

fn has_changes(store_root: &Path) -> bool {
    run_git(store_root, &["status", "--porcelain"])
        .map(|out| !out.trim().is_empty())
        .unwrap_or(false)
}

fn commit_timestamped(store_root: &Path, prefix: &str) -> Result<()> {
    run_git(store_root, &["add", "."])?;
    let message = format!("{prefix}: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    run_git(store_root, &["commit", "-m", &message])?;
    Ok(())
}

/// Stage and commit all pending changes in the store.
pub fn commit_all(store_root: &Path) -> Result<SyncReport> {
    if !has_changes(store_root) {
        return Ok(SyncReport::NoChanges);
    }

    commit_timestamped(store_root, "Manual commit")?;
    Ok(SyncReport::Committed)
}

/// Synchronize the store with its remote: fetch, rebase-pull, commit any
/// local changes, push. `progress` is called before each step with the
/// step name; the front end maps it onto a progress display.
pub fn sync(store_root: &Path, mut progress: impl FnMut(&str)) -> Result<SyncReport> {
    let had_changes = has_changes(store_root);

    progress("fetch");
    run_git(store_root, &["fetch", "--all"])?;

    progress("pull");
    run_git(store_root, &["pull", "--rebase"])?;

    if had_changes {
        progress("commit");
        commit_timestamped(store_root, "Auto-commit")?;
    }

    progress("push");
    run_git(store_root, &["push"])?;

    Ok(if had_changes {
        SyncReport::Committed
    } else {
        SyncReport::NoChanges
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "Test"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(dir)
                .output()
                .unwrap();
            assert!(status.status.success());
        }
    }

    #[test]
    fn test_commit_all_no_changes() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());

        assert_eq!(commit_all(dir.path()).unwrap(), SyncReport::NoChanges);
    }

    #[test]
    fn test_commit_all_with_changes() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("entry.gpg"), "ciphertext").unwrap();

        assert_eq!(commit_all(dir.path()).unwrap(), SyncReport::Committed);
        // Nothing pending afterwards
        assert_eq!(commit_all(dir.path()).unwrap(), SyncReport::NoChanges);
    }

    #[test]
    fn test_run_git_outside_repo_fails() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();

        let err = run_git(dir.path(), &["status", "--porcelain"]).unwrap_err();
        assert!(matches!(err, StoreError::GitFailed { .. }));
    }
}
