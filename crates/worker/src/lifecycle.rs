//! Worker lifecycle state machine.
//!
//! The host-imposed version lifecycle: `installing → waiting → activating →
//! active → redundant`. A version that fails install goes straight to
//! `redundant` and the previously active version keeps controlling the
//! scope. Fetch interception only happens in `active`.

use std::fmt;

/// Lifecycle states of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Populating the cache generation from the asset manifest.
    Installing,
    /// Manifest fully cached; eligible to take over the scope.
    Waiting,
    /// Sweeping superseded cache generations.
    Activating,
    /// Controlling the scope; fetch events are intercepted.
    Active,
    /// Failed install or superseded by a newer version. Terminal.
    Redundant,
}

impl WorkerState {
    /// Whether fetch events are intercepted in this state.
    pub fn can_intercept_fetch(self) -> bool {
        matches!(self, WorkerState::Active)
    }

    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Redundant)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
