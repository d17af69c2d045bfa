use serde::{Deserialize, Serialize};

/// Lifecycle of a run: `Pending → Running → {Completed, Cancelled}`.
///
/// Both `Completed` and `Cancelled` are terminal; there is no transition out
/// of a terminal state. The final [`RunResult`](crate::RunResult) is only
/// authoritative once the state is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
