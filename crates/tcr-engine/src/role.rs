//! Role vocabulary for pair/mob sessions.

use serde::{Deserialize, Serialize};

/// The two session roles. Exactly one may be actively running at a time.
///
/// The driver produces changes and owns the commit/revert cycle; the
/// navigator only observes and periodically syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Navigator,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Navigator => "navigator",
        }
    }

    /// Whether this role runs the build/test/commit/revert cycle.
    pub fn runs_the_cycle(&self) -> bool {
        matches!(self, Role::Driver)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
