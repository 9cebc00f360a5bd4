//! End-to-end properties of the build/test/commit-or-revert decision,
//! checked against recording fakes.

use std::path::PathBuf;
use std::sync::Arc;

use tcr_engine::domain::{Status, StatusRegistry};
use tcr_engine::fakes::{FakeLanguage, FakeToolchain, FakeVcs, VcsCall};
use tcr_engine::report::ReportBus;
use tcr_engine::{Cycle, Vcs};

struct Fixture {
    cycle: Cycle,
    toolchain: Arc<FakeToolchain>,
    vcs: Arc<FakeVcs>,
    status: Arc<StatusRegistry>,
}

fn fixture(toolchain: FakeToolchain) -> Fixture {
    let toolchain = Arc::new(toolchain);
    let vcs = Arc::new(FakeVcs::new());
    let status = Arc::new(StatusRegistry::new());
    let cycle = Cycle::new(
        toolchain.clone(),
        vcs.clone(),
        Arc::new(FakeLanguage::new()),
        Arc::new(ReportBus::new()),
        status.clone(),
        "[TCR] tests passing",
    );
    Fixture {
        cycle,
        toolchain,
        vcs,
        status,
    }
}

#[tokio::test]
async fn test_build_failure_stops_everything() {
    let f = fixture(FakeToolchain::failing_build());

    let outcome = f.cycle.run().await;

    assert!(!outcome.build_passed);
    assert_eq!(outcome.tests_passed, None);
    assert!(!outcome.committed);
    assert!(!outcome.reverted);
    assert_eq!(outcome.status, Status::BuildFailed);
    // No test run and no VCS operation of any kind.
    assert_eq!(f.toolchain.test_calls(), 0);
    assert!(f.vcs.calls().is_empty());
    assert_eq!(f.status.return_code(), 1);
}

#[tokio::test]
async fn test_green_cycle_commits_without_push() {
    let f = fixture(FakeToolchain::new());

    let outcome = f.cycle.run().await;

    assert!(outcome.build_passed);
    assert_eq!(outcome.tests_passed, Some(true));
    assert!(outcome.committed);
    assert!(!outcome.reverted);
    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(f.vcs.calls(), vec![VcsCall::Commit { amend: false }]);
    assert_eq!(f.status.return_code(), 0);
}

#[tokio::test]
async fn test_green_cycle_pushes_when_enabled() {
    let f = fixture(FakeToolchain::new());
    f.vcs.enable_push(true);

    let outcome = f.cycle.run().await;

    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(
        f.vcs.calls(),
        vec![VcsCall::Commit { amend: false }, VcsCall::Push]
    );
}

#[tokio::test]
async fn test_commit_failure_is_a_git_error() {
    let f = fixture(FakeToolchain::new());
    f.vcs.set_fail_commit(true);

    let outcome = f.cycle.run().await;

    assert!(!outcome.committed);
    assert_eq!(outcome.status, Status::GitError);
    assert_eq!(f.status.return_code(), 4);
}

#[tokio::test]
async fn test_push_failure_is_a_git_error() {
    let f = fixture(FakeToolchain::new());
    f.vcs.enable_push(true);
    f.vcs.set_fail_push(true);

    let outcome = f.cycle.run().await;

    assert!(!outcome.committed);
    assert_eq!(outcome.status, Status::GitError);
}

#[tokio::test]
async fn test_red_cycle_reverts_source_dirs_only() {
    let f = fixture(FakeToolchain::failing_tests());

    let outcome = f.cycle.run().await;

    assert!(outcome.build_passed);
    assert_eq!(outcome.tests_passed, Some(false));
    assert!(!outcome.committed);
    assert!(outcome.reverted);
    assert_eq!(outcome.status, Status::TestFailed);
    // Only `src` is restored; the `tests` directory keeps the red test.
    assert_eq!(f.vcs.restored_paths(), vec![PathBuf::from("src")]);
    assert!(!f
        .vcs
        .calls()
        .iter()
        .any(|call| matches!(call, VcsCall::Commit { .. } | VcsCall::Push)));
    assert_eq!(f.status.return_code(), 2);
}

#[tokio::test]
async fn test_restore_failure_is_a_git_error() {
    let f = fixture(FakeToolchain::failing_tests());
    f.vcs.set_fail_restore(true);

    let outcome = f.cycle.run().await;

    assert!(!outcome.reverted);
    assert_eq!(outcome.status, Status::GitError);
    assert_eq!(f.status.return_code(), 4);
}

#[tokio::test]
async fn test_latest_cycle_wins_in_the_registry() {
    let f = fixture(FakeToolchain::failing_tests());

    f.cycle.run().await;
    assert_eq!(f.status.current(), Status::TestFailed);

    f.toolchain.set_fail_tests(false);
    f.cycle.run().await;
    assert_eq!(f.status.current(), Status::Ok);
    assert_eq!(f.status.return_code(), 0);
}
