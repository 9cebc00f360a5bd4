//! Outcome status taxonomy and the registry holding the current one.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Integer-ranked outcome of the last cycle, documented as the process
/// exit-code contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    BuildFailed,
    TestFailed,
    ConfigError,
    GitError,
    OtherError,
}

impl Status {
    /// The documented process exit code for this status (identity, 0-5).
    pub fn return_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::BuildFailed => 1,
            Status::TestFailed => 2,
            Status::ConfigError => 3,
            Status::GitError => 4,
            Status::OtherError => 5,
        }
    }
}

/// Holder of the single current [`Status`].
///
/// Single-writer by construction: only the one active cycle records a
/// status, while the process boundary reads it to compute an exit code.
/// Owned by the engine instance, never global.
#[derive(Debug)]
pub struct StatusRegistry {
    current: Mutex<Status>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Status::Ok),
        }
    }

    /// Overwrite the held status.
    pub fn record(&self, status: Status) {
        *self.current.lock().unwrap() = status;
    }

    /// The last recorded status.
    pub fn current(&self) -> Status {
        *self.current.lock().unwrap()
    }

    /// The process exit code for the last recorded status.
    pub fn return_code(&self) -> i32 {
        self.current().return_code()
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}
