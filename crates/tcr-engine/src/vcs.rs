//! Version-control collaborator: the narrow porcelain the engine drives.
//!
//! The engine only orchestrates; [`GitCli`] shells out to the `git`
//! binary the developer already uses, so hooks and credentials behave
//! exactly as they do on the command line.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{Result, TcrError};

/// Version-control operations consumed by the cycle and the roles.
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn pull(&self) -> Result<()>;
    /// Stage everything and commit. `messages` become one `-m` each.
    async fn commit(&self, amend: bool, messages: &[String]) -> Result<()>;
    async fn push(&self) -> Result<()>;
    /// Restore `path` to its last-committed state.
    async fn restore(&self, path: &Path) -> Result<()>;
    async fn working_branch(&self) -> Result<String>;
    fn is_push_enabled(&self) -> bool;
    fn enable_push(&self, enabled: bool);
}

/// `git` subprocess implementation of [`Vcs`].
pub struct GitCli {
    work_dir: PathBuf,
    push_enabled: AtomicBool,
}

impl GitCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            push_enabled: AtomicBool::new(false),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    async fn run_git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .output()
            .await
            .map_err(|e| TcrError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TcrError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether the working tree has staged or unstaged changes.
    pub async fn has_changes(&self) -> Result<bool> {
        let status = self.run_git(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn pull(&self) -> Result<()> {
        self.run_git(&["pull", "--no-rebase"]).await?;
        Ok(())
    }

    async fn commit(&self, amend: bool, messages: &[String]) -> Result<()> {
        self.run_git(&["add", "-A"]).await?;

        // A passing cycle with nothing new to record is not an error.
        if !amend && !self.has_changes().await? {
            debug!("nothing to commit, skipping");
            return Ok(());
        }

        let mut args = vec!["commit", "--no-verify"];
        if amend {
            args.push("--amend");
        }
        for message in messages {
            args.push("-m");
            args.push(message);
        }
        self.run_git(&args).await?;
        Ok(())
    }

    async fn push(&self) -> Result<()> {
        self.run_git(&["push"]).await?;
        Ok(())
    }

    async fn restore(&self, path: &Path) -> Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| TcrError::Git(format!("non-utf8 path: {}", path.display())))?;
        self.run_git(&["checkout", "HEAD", "--", path]).await?;
        Ok(())
    }

    async fn working_branch(&self) -> Result<String> {
        self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    fn is_push_enabled(&self) -> bool {
        self.push_enabled.load(Ordering::SeqCst)
    }

    fn enable_push(&self, enabled: bool) {
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn test_working_branch() {
        let repo = make_git_repo();
        let git = GitCli::new(repo.path());
        assert_eq!(git.working_branch().await.unwrap(), "main");
    }

    #[tokio::test]
    async fn test_commit_records_new_files() {
        let repo = make_git_repo();
        let git = GitCli::new(repo.path());

        std::fs::write(repo.path().join("hello.txt"), "world").unwrap();
        assert!(git.has_changes().await.unwrap());

        git.commit(false, &["add hello".to_string()])
            .await
            .expect("commit");
        assert!(!git.has_changes().await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_with_clean_tree_is_ok() {
        let repo = make_git_repo();
        let git = GitCli::new(repo.path());
        git.commit(false, &["noop".to_string()]).await.expect("commit");
    }

    #[tokio::test]
    async fn test_restore_discards_committed_file_edits() {
        let repo = make_git_repo();
        let git = GitCli::new(repo.path());

        let src = repo.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("lib.rs"), "original").unwrap();
        git.commit(false, &["base".to_string()]).await.unwrap();

        std::fs::write(src.join("lib.rs"), "broken").unwrap();
        git.restore(Path::new("src")).await.expect("restore");

        let content = std::fs::read_to_string(src.join("lib.rs")).unwrap();
        assert_eq!(content, "original");
    }

    #[tokio::test]
    async fn test_restore_leaves_test_dir_untouched() {
        // A failing test just written must survive the revert.
        let repo = make_git_repo();
        let git = GitCli::new(repo.path());

        let src = repo.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("lib.rs"), "v1").unwrap();
        git.commit(false, &["base".to_string()]).await.unwrap();

        let tests = repo.path().join("tests");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("new_test.rs"), "#[test] fn red() {}").unwrap();

        std::fs::write(src.join("lib.rs"), "v2-broken").unwrap();
        git.restore(Path::new("src")).await.unwrap();

        assert!(tests.join("new_test.rs").exists());
        assert_eq!(
            std::fs::read_to_string(src.join("lib.rs")).unwrap(),
            "v1"
        );
    }

    #[tokio::test]
    async fn test_push_and_pull_against_local_remote() {
        let remote = tempfile::tempdir().unwrap();
        run_git(remote.path(), &["init", "--bare", "-b", "main"]);

        let clone = tempfile::tempdir().unwrap();
        let remote_path = remote.path().to_str().unwrap();
        let clone_path = clone.path().join("work");
        let output = StdCommand::new("git")
            .args(["clone", remote_path, clone_path.to_str().unwrap()])
            .output()
            .unwrap();
        assert!(output.status.success());
        run_git(&clone_path, &["config", "user.name", "test-user"]);
        run_git(&clone_path, &["config", "user.email", "test@example.com"]);
        run_git(&clone_path, &["commit", "--allow-empty", "-m", "initial"]);
        run_git(&clone_path, &["push", "-u", "origin", "main"]);

        let git = GitCli::new(&clone_path);
        std::fs::write(clone_path.join("a.txt"), "a").unwrap();
        git.commit(false, &["a".to_string()]).await.unwrap();
        git.push().await.expect("push");
        git.pull().await.expect("pull");
    }

    #[test]
    fn test_push_toggle() {
        let git = GitCli::new(".");
        assert!(!git.is_push_enabled());
        git.enable_push(true);
        assert!(git.is_push_enabled());
        git.enable_push(false);
        assert!(!git.is_push_enabled());
    }
}
