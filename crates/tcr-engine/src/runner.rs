//! Role lifecycle: one active role per engine, driven by an explicit,
//! cancellable background task.
//!
//! A driver watches the filesystem and runs the cycle on every relevant
//! change; a navigator only polls the remote. Both go through the same
//! birth / life / death sequence so the UI and the report bus see a
//! consistent session story.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cycle::Cycle;
use crate::domain::{MessageKind, Result, TcrError};
use crate::reminder::{format_duration, PeriodicReminder, ReminderEvent, ReminderEventKind};
use crate::report::ReportBus;
use crate::role::Role;
use crate::ui::Ui;
use crate::vcs::Vcs;
use crate::watch::SourceWatcher;

struct ActiveRole {
    role: Role,
    /// Generation guard so a finished task never clears a successor.
    id: u64,
    // Capacity 1, edge-triggered: repeated stops collapse into one.
    stop_tx: mpsc::Sender<()>,
}

/// Starts and stops role loops, holding the single-active-role invariant.
pub struct RoleRunner {
    cycle: Arc<Cycle>,
    vcs: Arc<dyn Vcs>,
    watcher: Arc<dyn SourceWatcher>,
    ui: Arc<dyn Ui>,
    bus: Arc<ReportBus>,
    turn_duration: Duration,
    tick_period: Duration,
    polling_period: Duration,
    inactivity_timeout: Option<Duration>,
    active: Arc<Mutex<Option<ActiveRole>>>,
    next_id: AtomicU64,
}

impl RoleRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cycle: Arc<Cycle>,
        vcs: Arc<dyn Vcs>,
        watcher: Arc<dyn SourceWatcher>,
        ui: Arc<dyn Ui>,
        bus: Arc<ReportBus>,
        turn_duration: Duration,
        tick_period: Duration,
        polling_period: Duration,
        inactivity_timeout: Option<Duration>,
    ) -> Self {
        Self {
            cycle,
            vcs,
            watcher,
            ui,
            bus,
            turn_duration,
            tick_period,
            polling_period,
            inactivity_timeout,
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// The currently active role, if any.
    pub fn active_role(&self) -> Option<Role> {
        self.active.lock().unwrap().as_ref().map(|a| a.role)
    }

    /// Start a role loop. Fails with [`TcrError::RoleAlreadyActive`] while
    /// another loop is still running; the returned handle resolves when
    /// the loop has fully wound down.
    pub fn run_as(&self, role: Role) -> Result<JoinHandle<()>> {
        let mut active = self.active.lock().unwrap();
        if let Some(current) = active.as_ref() {
            return Err(TcrError::RoleAlreadyActive(current.role.name().to_string()));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        *active = Some(ActiveRole { role, id, stop_tx });
        drop(active);

        let mut role_loop = RoleLoop {
            role,
            cycle: self.cycle.clone(),
            vcs: self.vcs.clone(),
            watcher: self.watcher.clone(),
            ui: self.ui.clone(),
            bus: self.bus.clone(),
            turn: self.turn_reminder(role),
            nudge: self.nudge_reminder(role),
            polling_period: self.polling_period,
            stop_rx,
        };
        let slot = self.active.clone();

        info!(role = %role, "starting role");
        Ok(tokio::spawn(async move {
            role_loop.run().await;
            let mut active = slot.lock().unwrap();
            if active.as_ref().map(|a| a.id) == Some(id) {
                *active = None;
            }
        }))
    }

    /// Signal the active role loop to stop. The loop finishes any cycle
    /// already in flight before winding down.
    pub fn stop(&self) -> Result<()> {
        let active = self.active.lock().unwrap();
        match active.as_ref() {
            None => Err(TcrError::NoActiveRole),
            Some(current) => {
                debug!(role = %current.role, "stop requested");
                let _ = current.stop_tx.try_send(());
                Ok(())
            }
        }
    }

    /// Mob-turn countdown, posting its progress on the report bus. Only
    /// the driver gets one.
    fn turn_reminder(&self, role: Role) -> PeriodicReminder {
        if !role.runs_the_cycle() {
            return PeriodicReminder::off();
        }
        let bus = self.bus.clone();
        PeriodicReminder::new(self.turn_duration, self.tick_period, move |event| {
            post_turn_event(&bus, role, &event)
        })
    }

    /// Inactivity nudge, armed while the driver waits for a change.
    fn nudge_reminder(&self, role: Role) -> PeriodicReminder {
        let Some(timeout) = self.inactivity_timeout else {
            return PeriodicReminder::off();
        };
        if !role.runs_the_cycle() {
            return PeriodicReminder::off();
        }
        let bus = self.bus.clone();
        // Tick period == timeout, so the deadline tick coincides with the
        // timeout; posting on Timeout alone keeps the nudge to one message.
        PeriodicReminder::new(timeout, timeout, move |event| {
            if event.kind == ReminderEventKind::Timeout {
                bus.post(
                    MessageKind::Notification,
                    format!(
                        "No change detected for {}; save a file to run the cycle",
                        format_duration(event.elapsed)
                    ),
                );
            }
        })
    }
}

fn post_turn_event(bus: &ReportBus, role: Role, event: &ReminderEvent) {
    match event.kind {
        ReminderEventKind::Start => bus.post(
            MessageKind::Info,
            format!(
                "Starting a {} turn as {role}",
                format_duration(event.remaining)
            ),
        ),
        ReminderEventKind::Periodic => bus.post(
            MessageKind::Info,
            format!("{} remaining in this turn", format_duration(event.remaining)),
        ),
        ReminderEventKind::Timeout => bus.post(
            MessageKind::Notification,
            "Turn is over, time to rotate roles",
        ),
        ReminderEventKind::Interrupt => {}
    }
}

/// What the driver loop decided to do after waking up.
enum Step {
    RunCycle,
    Break,
}

struct RoleLoop {
    role: Role,
    cycle: Arc<Cycle>,
    vcs: Arc<dyn Vcs>,
    watcher: Arc<dyn SourceWatcher>,
    ui: Arc<dyn Ui>,
    bus: Arc<ReportBus>,
    turn: PeriodicReminder,
    nudge: PeriodicReminder,
    polling_period: Duration,
    stop_rx: mpsc::Receiver<()>,
}

impl RoleLoop {
    async fn run(&mut self) {
        self.birth().await;
        if self.role.runs_the_cycle() {
            self.drive().await;
        } else {
            self.navigate().await;
        }
        self.death();
    }

    async fn birth(&mut self) {
        self.ui.notify_role_starting(self.role);
        self.bus
            .post(MessageKind::Title, format!("Starting as a {}", self.role));
        if self.role.runs_the_cycle() {
            if let Err(e) = self.vcs.pull().await {
                self.bus.post(MessageKind::Warning, format!("{e}"));
            }
        }
        self.turn.start();
    }

    fn death(&mut self) {
        self.turn.stop();
        self.bus
            .post(MessageKind::Info, format!("Ending the {} role", self.role));
        self.ui.notify_role_ending(self.role);
        info!(role = %self.role, "role ended");
    }

    /// Driver loop: wait for a change, run one cycle, repeat. The stop
    /// signal wins over a pending change; a cycle in flight always
    /// completes.
    async fn drive(&mut self) {
        loop {
            self.nudge.start();
            let step = tokio::select! {
                biased;
                _ = self.stop_rx.recv() => Step::Break,
                change = self.watcher.wait_for_change() => match change {
                    Ok(path) => {
                        self.bus.post(
                            MessageKind::Event,
                            format!("{} changed", path.display()),
                        );
                        Step::RunCycle
                    }
                    Err(e) => {
                        self.bus.post(MessageKind::Error, format!("{e}"));
                        Step::Break
                    }
                },
            };
            self.nudge.stop();

            match step {
                Step::Break => break,
                Step::RunCycle => {
                    self.cycle.run().await;
                }
            }
        }
    }

    /// Navigator loop: pull, sleep, repeat. The stop check comes before
    /// the pull so an interrupt delivered before the loop first runs
    /// never reaches the remote.
    async fn navigate(&mut self) {
        loop {
            match self.stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            if let Err(e) = self.vcs.pull().await {
                self.bus.post(MessageKind::Warning, format!("{e}"));
            }
            tokio::select! {
                biased;
                _ = self.stop_rx.recv() => break,
                _ = tokio::time::sleep(self.polling_period) => {}
            }
        }
    }
}
