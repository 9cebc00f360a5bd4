//! TCR Engine Library
//!
//! Test && Commit || Revert: watch the sources, run the build and the
//! tests on every change, commit when green, revert when red while
//! keeping the failing test. Re-exports the session engine and its
//! collaborator seams for programmatic embedding.

pub mod cycle;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod language;
pub mod reminder;
pub mod report;
pub mod role;
pub mod runner;
pub mod telemetry;
pub mod toolchain;
pub mod ui;
pub mod vcs;
pub mod watch;

pub use cycle::{Cycle, CycleOutcome};
pub use domain::{Message, MessageKind, Result, Status, StatusRegistry, TcrError};
pub use engine::{Engine, EngineConfig};
pub use language::{KnownLanguage, Language};
pub use reminder::{
    format_duration, PeriodicReminder, ReminderEvent, ReminderEventKind, ReminderState,
};
pub use report::{ReportBus, SubscriptionToken};
pub use role::Role;
pub use runner::RoleRunner;
pub use telemetry::init_tracing;
pub use toolchain::{CommandOutcome, CommandToolchain, Toolchain};
pub use ui::{SessionInfo, SilentUi, Ui};
pub use vcs::{GitCli, Vcs};
pub use watch::{IdleWatcher, NotifyWatcher, SourceWatcher};

/// Crate version, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
