//! UI collaborator seam.
//!
//! The engine never renders anything itself: role transitions and session
//! facts go through this trait, and progress text goes through the report
//! bus. Terminal rendering lives in the CLI crate.

use std::path::PathBuf;

use crate::role::Role;

/// Facts about the running session, announced at role start.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub base_dir: PathBuf,
    pub language: String,
    pub branch: String,
    pub auto_push: bool,
}

/// Calls made by the engine on whatever UI is attached.
pub trait Ui: Send + Sync {
    /// Announce the overall running mode ("mob", "one-shot", ...).
    fn show_running_mode(&self, mode: &str);
    fn notify_role_starting(&self, role: Role);
    fn notify_role_ending(&self, role: Role);
    fn show_session_info(&self, info: &SessionInfo);
    /// Ask a yes/no question; non-interactive UIs return the default.
    fn confirm(&self, message: &str, default_answer: bool) -> bool;
}

/// UI that swallows everything; used by tests and headless runs.
#[derive(Debug, Default)]
pub struct SilentUi;

impl Ui for SilentUi {
    fn show_running_mode(&self, _mode: &str) {}
    fn notify_role_starting(&self, _role: Role) {}
    fn notify_role_ending(&self, _role: Role) {}
    fn show_session_info(&self, _info: &SessionInfo) {}
    fn confirm(&self, _message: &str, default_answer: bool) -> bool {
        default_answer
    }
}
