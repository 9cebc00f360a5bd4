//! Generic tick-based countdown/notifier.
//!
//! A [`PeriodicReminder`] fires a callback on every tick boundary until
//! its timeout elapses or it is explicitly stopped. It backs the
//! user-visible mob-turn countdown and the feature-toggled inactivity
//! nudge; run modes that need no countdown construct one with
//! [`PeriodicReminder::off`] so calling code keeps a uniform start/stop
//! contract.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

/// Default countdown length when constructed with a zero timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default tick period when constructed with a zero tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(60);

/// Lifecycle of one reminder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    NotStarted,
    Running,
    StoppedAfterTimeout,
    StoppedAfterInterruption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderEventKind {
    Start,
    Periodic,
    Interrupt,
    Timeout,
}

/// Snapshot passed to the callback at each occurrence.
#[derive(Debug, Clone)]
pub struct ReminderEvent {
    pub kind: ReminderEventKind,
    /// Tick counter: 0 for the first periodic event, strictly increasing.
    pub index: u32,
    /// Highest periodic index this run can reach: `timeout / tick - 1`.
    pub index_max: u32,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub timestamp: DateTime<Utc>,
}

type Callback = Arc<dyn Fn(ReminderEvent) + Send + Sync + 'static>;

struct Inner {
    state: ReminderState,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    /// Run generation, so a stale background task never touches the state
    /// of a later run.
    run: u64,
    stop_tx: Option<mpsc::Sender<()>>,
}

/// Generic timeout+tick notifier. See module docs.
pub struct PeriodicReminder {
    timeout: Duration,
    tick_period: Duration,
    enabled: bool,
    callback: Callback,
    inner: Arc<Mutex<Inner>>,
}

impl PeriodicReminder {
    /// Build a reminder in state `NotStarted`. Zero durations fall back to
    /// [`DEFAULT_TIMEOUT`] / [`DEFAULT_TICK_PERIOD`].
    pub fn new<F>(timeout: Duration, tick_period: Duration, callback: F) -> Self
    where
        F: Fn(ReminderEvent) + Send + Sync + 'static,
    {
        let timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        let tick_period = if tick_period.is_zero() {
            DEFAULT_TICK_PERIOD
        } else {
            tick_period
        };
        Self {
            timeout,
            tick_period,
            enabled: true,
            callback: Arc::new(callback),
            inner: Arc::new(Mutex::new(Inner {
                state: ReminderState::NotStarted,
                started_at: None,
                stopped_at: None,
                run: 0,
                stop_tx: None,
            })),
        }
    }

    /// A reminder that honors the start/stop/query contract but runs no
    /// ticks and fires no events. Used by run modes without a countdown.
    pub fn off() -> Self {
        let mut reminder = Self::new(Duration::from_secs(1), Duration::from_secs(1), |_| {});
        reminder.timeout = Duration::ZERO;
        reminder.enabled = false;
        reminder
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn state(&self) -> ReminderState {
        self.inner.lock().unwrap().state
    }

    /// Time elapsed in the current (or last) run; zero before the first
    /// start.
    pub fn elapsed(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        match (inner.state, inner.started_at) {
            (ReminderState::NotStarted, _) | (_, None) => Duration::ZERO,
            (ReminderState::Running, Some(started)) => started.elapsed(),
            (_, Some(started)) => inner
                .stopped_at
                .map(|stopped| stopped.duration_since(started))
                .unwrap_or_default(),
        }
    }

    /// Time left before timeout; the full timeout before the first start,
    /// exactly zero once stopped.
    pub fn remaining(&self) -> Duration {
        let state = self.state();
        match state {
            ReminderState::NotStarted => self.timeout,
            ReminderState::Running => self.timeout.saturating_sub(self.elapsed()),
            _ => Duration::ZERO,
        }
    }

    /// Begin a run: `NotStarted` (or a stopped state) becomes `Running`
    /// and the tick/timeout watcher task is spawned. Starting an already
    /// running reminder is a no-op. Each start is a fresh run: the tick
    /// index restarts at 0.
    pub fn start(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == ReminderState::Running {
            return;
        }
        inner.state = ReminderState::Running;
        inner.started_at = Some(Instant::now());
        inner.stopped_at = None;
        inner.run += 1;

        if !self.enabled {
            inner.stop_tx = None;
            return;
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        inner.stop_tx = Some(stop_tx);
        let run = inner.run;
        drop(inner);

        let timeout = self.timeout;
        let tick_period = self.tick_period;
        let callback = self.callback.clone();
        let shared = self.inner.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let index_max =
                (timeout.as_nanos() / tick_period.as_nanos().max(1)) as u32;
            let index_max = index_max.saturating_sub(1);

            // A panicking callback is isolated to this run: further
            // events are suppressed but the state machine completes.
            let mut poisoned = false;
            let mut fire = |kind: ReminderEventKind, index: u32, elapsed: Duration| {
                if poisoned {
                    return;
                }
                let event = ReminderEvent {
                    kind,
                    index,
                    index_max,
                    elapsed,
                    remaining: timeout.saturating_sub(elapsed),
                    timestamp: Utc::now(),
                };
                if catch_unwind(AssertUnwindSafe(|| (callback)(event))).is_err() {
                    poisoned = true;
                    warn!(kind = ?kind, "reminder callback panicked, suppressing further events for this run");
                }
            };

            fire(ReminderEventKind::Start, 0, Duration::ZERO);

            let mut ticker = tokio::time::interval_at(started + tick_period, tick_period);
            let deadline = tokio::time::sleep_until(started + timeout);
            tokio::pin!(deadline);
            let mut index: u32 = 0;

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => {
                        fire(ReminderEventKind::Interrupt, index, started.elapsed());
                        break;
                    }
                    _ = ticker.tick() => {
                        // A tick boundary that coincides with the timeout
                        // still counts, up to index_max.
                        if index <= index_max {
                            fire(ReminderEventKind::Periodic, index, started.elapsed());
                        }
                        index = index.saturating_add(1);
                    }
                    _ = &mut deadline => {
                        finish(&shared, run, ReminderState::StoppedAfterTimeout);
                        fire(ReminderEventKind::Timeout, index, timeout);
                        break;
                    }
                }
            }
        });
    }

    /// Stop a running reminder: transitions to
    /// `StoppedAfterInterruption` and fires one `Interrupt` event; no
    /// periodic event fires after this returns. No-op when not running.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != ReminderState::Running {
            return;
        }
        inner.state = ReminderState::StoppedAfterInterruption;
        inner.stopped_at = Some(Instant::now());
        if let Some(stop_tx) = inner.stop_tx.take() {
            // Single-shot, edge-triggered: consumed once by the waiter.
            let _ = stop_tx.try_send(());
        }
    }
}

/// Transition the shared state, unless the run already ended or a newer
/// run took over.
fn finish(shared: &Arc<Mutex<Inner>>, run: u64, state: ReminderState) {
    let mut inner = shared.lock().unwrap();
    if inner.run == run && inner.state == ReminderState::Running {
        inner.state = state;
        inner.stopped_at = Some(Instant::now());
        inner.stop_tx = None;
    }
}

/// Render a duration as a compact `2m30s` / `45s` string for countdown
/// messages.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let minutes = total / 60;
    let seconds = total % 60;
    if minutes > 0 && seconds > 0 {
        format!("{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let reminder = PeriodicReminder::new(Duration::ZERO, Duration::ZERO, |_| {});
        assert_eq!(reminder.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(reminder.tick_period(), DEFAULT_TICK_PERIOD);
        assert_eq!(reminder.state(), ReminderState::NotStarted);
    }

    #[test]
    fn test_queries_before_start() {
        let reminder =
            PeriodicReminder::new(Duration::from_secs(10), Duration::from_secs(1), |_| {});
        assert_eq!(reminder.elapsed(), Duration::ZERO);
        assert_eq!(reminder.remaining(), Duration::from_secs(10));
    }

    #[test]
    fn test_off_reminder_reports_zero_remaining() {
        let reminder = PeriodicReminder::off();
        assert_eq!(reminder.remaining(), Duration::ZERO);
        assert_eq!(reminder.state(), ReminderState::NotStarted);
    }

    #[tokio::test]
    async fn test_off_reminder_start_stop_contract() {
        let reminder = PeriodicReminder::off();
        reminder.start();
        assert_eq!(reminder.state(), ReminderState::Running);
        reminder.stop();
        assert_eq!(reminder.state(), ReminderState::StoppedAfterInterruption);
        assert_eq!(reminder.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_stop_before_start_is_a_no_op() {
        let reminder =
            PeriodicReminder::new(Duration::from_secs(10), Duration::from_secs(1), |_| {});
        reminder.stop();
        assert_eq!(reminder.state(), ReminderState::NotStarted);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(150)), "2m30s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
