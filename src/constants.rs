//! Shared enumerations for task and execution state.
//!
//! These are wire-stable: `ExecutionStatus` travels inside every
//! [`StatusMessage`](crate::messaging::StatusMessage) published to the
//! control queue, so variants serialize under their canonical
//! SCREAMING_SNAKE_CASE names.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Started, no execution currently in flight.
    Idle,
    /// At least one execution is currently in flight.
    Running,
    /// Not started, or stopped on teardown.
    Stopped,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        };
        write!(f, "{name}")
    }
}

/// Terminal outcome of a single execution, reported exactly once per
/// execution id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The transform succeeded and the correctness predicate passed or is
    /// absent.
    Finished,
    /// The transform succeeded but the correctness predicate failed.
    FinishedWithErrors,
    /// The transform raised an error.
    ErrorAborted,
    /// A cooperative cancellation was observed inside the job, distinct
    /// from a timeout-triggered cancellation.
    Interrupted,
    /// The timeout supervisor cancelled the job after the configured
    /// timeout elapsed.
    Timeout,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Finished => "FINISHED",
            Self::FinishedWithErrors => "FINISHED_WITH_ERRORS",
            Self::ErrorAborted => "ERROR_ABORTED",
            Self::Interrupted => "INTERRUPTED",
            Self::Timeout => "TIMEOUT",
        };
        write!(f, "{name}")
    }
}
