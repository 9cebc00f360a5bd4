//! In-memory fakes for the collaborator traits (testing only).
//!
//! Each fake records its calls so tests can assert not just outcomes but
//! which collaborators were (or were not) invoked, and in what order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Result, TcrError};
use crate::language::Language;
use crate::role::Role;
use crate::toolchain::Toolchain;
use crate::ui::{SessionInfo, Ui};
use crate::vcs::Vcs;
use crate::watch::SourceWatcher;

// ---------------------------------------------------------------------------
// FakeToolchain
// ---------------------------------------------------------------------------

/// Toolchain fake with scriptable build/test results and call counters.
#[derive(Default)]
pub struct FakeToolchain {
    fail_build: AtomicBool,
    fail_tests: AtomicBool,
    build_calls: AtomicU32,
    test_calls: AtomicU32,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_build() -> Self {
        let toolchain = Self::default();
        toolchain.fail_build.store(true, Ordering::SeqCst);
        toolchain
    }

    pub fn failing_tests() -> Self {
        let toolchain = Self::default();
        toolchain.fail_tests.store(true, Ordering::SeqCst);
        toolchain
    }

    pub fn set_fail_tests(&self, fail: bool) {
        self.fail_tests.store(fail, Ordering::SeqCst);
    }

    pub fn build_calls(&self) -> u32 {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn test_calls(&self) -> u32 {
        self.test_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn run_build(&self) -> Result<()> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_build.load(Ordering::SeqCst) {
            Err(TcrError::Build("fake build failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn run_tests(&self) -> Result<()> {
        self.test_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_tests.load(Ordering::SeqCst) {
            Err(TcrError::Test("fake test failure".to_string()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

/// One recorded call on the [`FakeVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Pull,
    Commit { amend: bool },
    Push,
    Restore(PathBuf),
}

/// VCS fake: every operation succeeds unless scripted to fail, and every
/// call is recorded.
#[derive(Default)]
pub struct FakeVcs {
    calls: Mutex<Vec<VcsCall>>,
    fail_pull: AtomicBool,
    fail_commit: AtomicBool,
    fail_push: AtomicBool,
    fail_restore: AtomicBool,
    push_enabled: AtomicBool,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_restore(&self, fail: bool) {
        self.fail_restore.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pull_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, VcsCall::Pull))
            .count()
    }

    /// Paths passed to `restore`, in call order.
    pub fn restored_paths(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VcsCall::Restore(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: VcsCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn pull(&self) -> Result<()> {
        self.record(VcsCall::Pull);
        if self.fail_pull.load(Ordering::SeqCst) {
            Err(TcrError::Git("fake pull failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn commit(&self, amend: bool, _messages: &[String]) -> Result<()> {
        self.record(VcsCall::Commit { amend });
        if self.fail_commit.load(Ordering::SeqCst) {
            Err(TcrError::Git("fake commit failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn push(&self) -> Result<()> {
        self.record(VcsCall::Push);
        if self.fail_push.load(Ordering::SeqCst) {
            Err(TcrError::Git("fake push failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn restore(&self, path: &Path) -> Result<()> {
        self.record(VcsCall::Restore(path.to_path_buf()));
        if self.fail_restore.load(Ordering::SeqCst) {
            Err(TcrError::Git("fake restore failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn working_branch(&self) -> Result<String> {
        Ok("main".to_string())
    }

    fn is_push_enabled(&self) -> bool {
        self.push_enabled.load(Ordering::SeqCst)
    }

    fn enable_push(&self, enabled: bool) {
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// FakeLanguage
// ---------------------------------------------------------------------------

/// Language fake with a rust-like `src`/`tests` layout.
pub struct FakeLanguage {
    src_dirs: Vec<PathBuf>,
    test_dirs: Vec<PathBuf>,
}

impl FakeLanguage {
    pub fn new() -> Self {
        Self {
            src_dirs: vec![PathBuf::from("src")],
            test_dirs: vec![PathBuf::from("tests")],
        }
    }
}

impl Default for FakeLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl Language for FakeLanguage {
    fn name(&self) -> &str {
        "fake"
    }

    fn src_dirs(&self) -> Vec<PathBuf> {
        self.src_dirs.clone()
    }

    fn test_dirs(&self) -> Vec<PathBuf> {
        self.test_dirs.clone()
    }

    fn is_language_file(&self, path: &Path) -> bool {
        path.extension().map(|ext| ext == "rs").unwrap_or(false)
    }

    fn is_src_file(&self, path: &Path) -> bool {
        self.is_language_file(path) && path.starts_with("src")
    }

    fn dirs_to_watch(&self) -> Vec<PathBuf> {
        self.src_dirs
            .iter()
            .chain(self.test_dirs.iter())
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// FakeWatcher
// ---------------------------------------------------------------------------

/// Watcher fake fed by the test through a channel sender.
pub struct FakeWatcher {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PathBuf>>,
}

impl FakeWatcher {
    /// Returns the watcher and the sender used to inject changes.
    pub fn channel() -> (Self, mpsc::UnboundedSender<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: tokio::sync::Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl SourceWatcher for FakeWatcher {
    async fn wait_for_change(&self) -> Result<PathBuf> {
        let mut rx = self.rx.lock().await;
        let mut path = rx
            .recv()
            .await
            .ok_or_else(|| TcrError::Watcher("fake watch channel closed".to_string()))?;
        // Same coalescing as the real watcher: a burst counts once.
        while let Ok(later) = rx.try_recv() {
            path = later;
        }
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// FakeUi
// ---------------------------------------------------------------------------

/// UI fake recording every notification as a plain string.
#[derive(Default)]
pub struct FakeUi {
    events: Mutex<Vec<String>>,
    confirm_answer: AtomicBool,
}

impl FakeUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_confirm_answer(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Ui for FakeUi {
    fn show_running_mode(&self, mode: &str) {
        self.record(format!("running_mode:{mode}"));
    }

    fn notify_role_starting(&self, role: Role) {
        self.record(format!("role_starting:{role}"));
    }

    fn notify_role_ending(&self, role: Role) {
        self.record(format!("role_ending:{role}"));
    }

    fn show_session_info(&self, info: &SessionInfo) {
        self.record(format!("session_info:{}", info.branch));
    }

    fn confirm(&self, _message: &str, _default_answer: bool) -> bool {
        self.confirm_answer.load(Ordering::SeqCst)
    }
}
