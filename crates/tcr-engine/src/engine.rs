//! The engine facade: owns every piece of session state and wires the
//! collaborators together. Embedders construct one [`Engine`] per
//! session; nothing in this crate lives in a global.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cycle::{Cycle, CycleOutcome};
use crate::domain::{MessageKind, Result, Status, StatusRegistry, TcrError};
use crate::language::Language;
use crate::report::ReportBus;
use crate::role::Role;
use crate::runner::RoleRunner;
use crate::toolchain::Toolchain;
use crate::ui::{SessionInfo, Ui};
use crate::vcs::Vcs;
use crate::watch::SourceWatcher;

/// Tunable knobs for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_dir: PathBuf,
    pub commit_message: String,
    /// Length of one mob turn; zero means the built-in default.
    pub turn_duration: Duration,
    /// Countdown announcement period; zero means the built-in default.
    pub tick_period: Duration,
    /// Navigator pull period.
    pub polling_period: Duration,
    /// Nudge the driver after this much inactivity; `None` disables it.
    pub inactivity_timeout: Option<Duration>,
    /// Push after every green commit.
    pub auto_push: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            commit_message: "[TCR] tests passing".to_string(),
            turn_duration: Duration::from_secs(5 * 60),
            tick_period: Duration::from_secs(60),
            polling_period: Duration::from_secs(30),
            inactivity_timeout: None,
            auto_push: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.commit_message.trim().is_empty() {
            return Err(TcrError::Configuration(
                "commit message cannot be empty".to_string(),
            ));
        }
        if self.polling_period.is_zero() {
            return Err(TcrError::Configuration(
                "polling period cannot be zero".to_string(),
            ));
        }
        if let Some(timeout) = self.inactivity_timeout {
            if timeout.is_zero() {
                return Err(TcrError::Configuration(
                    "inactivity timeout cannot be zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One fully wired session.
pub struct Engine {
    config: EngineConfig,
    bus: Arc<ReportBus>,
    status: Arc<StatusRegistry>,
    vcs: Arc<dyn Vcs>,
    language: Arc<dyn Language>,
    ui: Arc<dyn Ui>,
    cycle: Arc<Cycle>,
    runner: RoleRunner,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        toolchain: Arc<dyn Toolchain>,
        vcs: Arc<dyn Vcs>,
        language: Arc<dyn Language>,
        watcher: Arc<dyn SourceWatcher>,
        ui: Arc<dyn Ui>,
    ) -> Result<Self> {
        config.validate()?;
        vcs.enable_push(config.auto_push);

        let bus = Arc::new(ReportBus::new());
        let status = Arc::new(StatusRegistry::new());
        let cycle = Arc::new(Cycle::new(
            toolchain,
            vcs.clone(),
            language.clone(),
            bus.clone(),
            status.clone(),
            config.commit_message.clone(),
        ));
        let runner = RoleRunner::new(
            cycle.clone(),
            vcs.clone(),
            watcher,
            ui.clone(),
            bus.clone(),
            config.turn_duration,
            config.tick_period,
            config.polling_period,
            config.inactivity_timeout,
        );

        Ok(Self {
            config,
            bus,
            status,
            vcs,
            language,
            ui,
            cycle,
            runner,
        })
    }

    pub fn report_bus(&self) -> Arc<ReportBus> {
        self.bus.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Session facts for UIs, built from live collaborators.
    pub async fn session_info(&self) -> Result<SessionInfo> {
        Ok(SessionInfo {
            base_dir: self.config.base_dir.clone(),
            language: self.language.name().to_string(),
            branch: self.vcs.working_branch().await?,
            auto_push: self.config.auto_push,
        })
    }

    pub async fn run_as_driver(&self) -> Result<JoinHandle<()>> {
        self.run_as(Role::Driver).await
    }

    pub async fn run_as_navigator(&self) -> Result<JoinHandle<()>> {
        self.run_as(Role::Navigator).await
    }

    async fn run_as(&self, role: Role) -> Result<JoinHandle<()>> {
        self.ui.show_running_mode("mob");
        let info = self.session_info().await?;
        self.ui.show_session_info(&info);
        self.runner.run_as(role)
    }

    /// Stop the active role loop; fails when no role is running.
    pub fn stop(&self) -> Result<()> {
        self.runner.stop()
    }

    /// End the session: stop whatever role is running. Safe to call with
    /// no role active.
    pub fn quit(&self) {
        self.bus.post(MessageKind::Info, "Exiting the session");
        let _ = self.runner.stop();
    }

    pub fn active_role(&self) -> Option<Role> {
        self.runner.active_role()
    }

    /// Run exactly one build/test/commit-or-revert pass, without any
    /// role loop. One-shot mode.
    pub async fn run_cycle_once(&self) -> CycleOutcome {
        self.ui.show_running_mode("one-shot");
        let outcome = self.cycle.run().await;
        info!(status = ?outcome.status, "one-shot cycle done");
        outcome
    }

    pub fn status(&self) -> Status {
        self.status.current()
    }

    /// Process exit code for the most severe thing that happened.
    pub fn return_code(&self) -> i32 {
        self.status.return_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeLanguage, FakeToolchain, FakeUi, FakeVcs, FakeWatcher};

    fn engine_with(config: EngineConfig, toolchain: FakeToolchain) -> Engine {
        let (watcher, _tx) = FakeWatcher::channel();
        Engine::new(
            config,
            Arc::new(toolchain),
            Arc::new(FakeVcs::new()),
            Arc::new(FakeLanguage::new()),
            Arc::new(watcher),
            Arc::new(FakeUi::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_config_rejects_empty_commit_message() {
        let config = EngineConfig {
            commit_message: "  ".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TcrError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_polling_period() {
        let config = EngineConfig {
            polling_period: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_fresh_engine_reports_ok() {
        let engine = engine_with(EngineConfig::default(), FakeToolchain::new());
        assert_eq!(engine.status(), Status::Ok);
        assert_eq!(engine.return_code(), 0);
        assert_eq!(engine.active_role(), None);
    }

    #[tokio::test]
    async fn test_one_shot_green_cycle_commits() {
        let engine = engine_with(EngineConfig::default(), FakeToolchain::new());
        let outcome = engine.run_cycle_once().await;
        assert!(outcome.committed);
        assert_eq!(engine.return_code(), 0);
    }

    #[tokio::test]
    async fn test_one_shot_build_failure_exit_code() {
        let engine = engine_with(EngineConfig::default(), FakeToolchain::failing_build());
        let outcome = engine.run_cycle_once().await;
        assert!(!outcome.build_passed);
        assert_eq!(engine.return_code(), 1);
    }

    #[tokio::test]
    async fn test_quit_without_active_role_is_harmless() {
        let engine = engine_with(EngineConfig::default(), FakeToolchain::new());
        engine.quit();
        assert_eq!(engine.active_role(), None);
    }

    #[tokio::test]
    async fn test_quit_stops_the_active_role() {
        let engine = engine_with(EngineConfig::default(), FakeToolchain::new());
        let handle = engine.run_as_navigator().await.unwrap();
        engine.quit();
        handle.await.unwrap();
        assert_eq!(engine.active_role(), None);
    }

    #[tokio::test]
    async fn test_auto_push_is_propagated_to_vcs() {
        let vcs = Arc::new(FakeVcs::new());
        let (watcher, _tx) = FakeWatcher::channel();
        let config = EngineConfig {
            auto_push: true,
            ..EngineConfig::default()
        };
        let engine = Engine::new(
            config,
            Arc::new(FakeToolchain::new()),
            vcs.clone(),
            Arc::new(FakeLanguage::new()),
            Arc::new(watcher),
            Arc::new(FakeUi::new()),
        )
        .unwrap();
        assert!(vcs.is_push_enabled());
        drop(engine);
    }
}
