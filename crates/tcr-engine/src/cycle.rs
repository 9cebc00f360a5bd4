//! The TCR decision procedure: build, then test, then commit on green or
//! revert on red — keeping the failing test.
//!
//! Exactly one cycle runs at a time (the role loop is strictly
//! sequential), so this is the single writer of the status registry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{MessageKind, Status, StatusRegistry};
use crate::language::Language;
use crate::report::ReportBus;
use crate::toolchain::Toolchain;
use crate::vcs::Vcs;

/// What one cycle run did, and the status it recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub build_passed: bool,
    /// `None` when the build failure prevented the test run.
    pub tests_passed: Option<bool>,
    pub committed: bool,
    pub reverted: bool,
    pub status: Status,
}

impl CycleOutcome {
    fn new() -> Self {
        Self {
            build_passed: false,
            tests_passed: None,
            committed: false,
            reverted: false,
            status: Status::Ok,
        }
    }
}

/// One build→test→commit/revert pass over the collaborators.
pub struct Cycle {
    toolchain: Arc<dyn Toolchain>,
    vcs: Arc<dyn Vcs>,
    language: Arc<dyn Language>,
    bus: Arc<ReportBus>,
    status: Arc<StatusRegistry>,
    commit_message: String,
}

impl Cycle {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        vcs: Arc<dyn Vcs>,
        language: Arc<dyn Language>,
        bus: Arc<ReportBus>,
        status: Arc<StatusRegistry>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            toolchain,
            vcs,
            language,
            bus,
            status,
            commit_message: commit_message.into(),
        }
    }

    /// Run one full cycle. Build/test/git failures are absorbed into the
    /// recorded status; nothing here aborts the caller's loop.
    pub async fn run(&self) -> CycleOutcome {
        let mut outcome = CycleOutcome::new();

        self.bus.post(MessageKind::Info, "Launching the build");
        if let Err(e) = self.toolchain.run_build().await {
            // The working tree is left exactly as the user left it:
            // nothing is discarded on a build failure.
            self.bus.post(MessageKind::Warning, format!("{e}"));
            outcome.status = Status::BuildFailed;
            self.status.record(outcome.status);
            return outcome;
        }
        outcome.build_passed = true;

        self.bus.post(MessageKind::Info, "Running the tests");
        match self.toolchain.run_tests().await {
            Ok(()) => {
                outcome.tests_passed = Some(true);
                outcome.status = self.commit().await;
                outcome.committed = outcome.status == Status::Ok;
            }
            Err(e) => {
                outcome.tests_passed = Some(false);
                self.bus.post(MessageKind::Warning, format!("{e}"));
                outcome.status = self.revert().await;
                outcome.reverted = outcome.status == Status::TestFailed;
            }
        }

        self.status.record(outcome.status);
        info!(status = ?outcome.status, "cycle finished");
        outcome
    }

    async fn commit(&self) -> Status {
        self.bus.post(MessageKind::Info, "Committing the changes");
        let result = async {
            self.vcs.commit(false, &[self.commit_message.clone()]).await?;
            if self.vcs.is_push_enabled() {
                self.bus.post(MessageKind::Info, "Pushing to the remote");
                self.vcs.push().await?;
            }
            Ok::<(), crate::domain::TcrError>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.bus
                    .post(MessageKind::Notification, "Changes committed");
                Status::Ok
            }
            Err(e) => {
                self.bus.post(MessageKind::Error, format!("{e}"));
                Status::GitError
            }
        }
    }

    /// Restore source directories only; test directories keep the failing
    /// test for the next attempt.
    async fn revert(&self) -> Status {
        self.bus.post(
            MessageKind::Warning,
            "Reverting source changes (keeping the tests)",
        );
        for dir in self.language.src_dirs() {
            if let Err(e) = self.vcs.restore(&dir).await {
                self.bus.post(MessageKind::Error, format!("{e}"));
                return Status::GitError;
            }
        }
        // The safety net fired correctly, but no commit happened: in
        // one-shot mode this surfaces as the documented exit code 2.
        Status::TestFailed
    }
}
