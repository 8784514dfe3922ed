//! Engine lifecycle: `Idle → Running → (Stopped | Completed)`.

use serde::Serialize;

/// Where the engine is in its run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run has started since the last program load.
    Idle,
    Running,
    /// The last run was cut short by a stop request.
    Stopped,
    /// The last run walked every command.
    Completed,
}

impl RunState {
    /// Whether a run has ended, one way or the other.
    pub fn is_finished(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Completed)
    }
}

/// Summary of one `execute()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// `Completed` or `Stopped`.
    pub state: RunState,
    /// Total scheduled length in seconds.
    pub duration: f64,
    /// Number of scheduling calls issued to the backend.
    pub dispatched: usize,
    /// Resolution warnings, in the order they were raised.
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn completed(&self) -> bool {
        self.state == RunState::Completed
    }
}
