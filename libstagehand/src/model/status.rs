//! Task status and everything derived from it. Every consumer (polling, log
//! retrieval, rendering) matches on [`TaskStatus`] here rather than keeping
//! its own copy of the branch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a task execution as reported by the backend:
/// `pending -> running -> {succeeded | failed | canceled}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    /// A status this client doesn't know about. Kept verbatim.
    Unknown(String),
}

/// Whether the log endpoint may be called for a task in a given status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogPolicy {
    /// Don't call the log endpoint, show the given placeholder instead.
    Placeholder(&'static str),
    Fetch,
}

pub const PENDING_PLACEHOLDER: &str =
    "Task is pending. Logs will be available after it starts/completes.";
pub const UNKNOWN_PLACEHOLDER: &str = "No log content loaded or task not yet run.";

impl TaskStatus {
    /// The statuses a task can be filtered by, in lifecycle order.
    pub const KNOWN: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Succeeded,
        TaskStatus::Failed,
        TaskStatus::Canceled,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Unknown(s) => s,
        }
    }

    /// No further transition happens from a terminal status.
    pub fn is_terminal(&self) -> bool {
        match self {
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled => true,
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Unknown(_) => false,
        }
    }

    /// Canceled tasks get one final log fetch, same as the other terminal
    /// statuses.
    pub fn log_policy(&self) -> LogPolicy {
        match self {
            TaskStatus::Pending => LogPolicy::Placeholder(PENDING_PLACEHOLDER),
            TaskStatus::Running
            | TaskStatus::Succeeded
            | TaskStatus::Failed
            | TaskStatus::Canceled => LogPolicy::Fetch,
            TaskStatus::Unknown(_) => LogPolicy::Placeholder(UNKNOWN_PLACEHOLDER),
        }
    }

    /// Badge colour as a hex triplet.
    pub fn color(&self) -> &'static str {
        match self {
            TaskStatus::Succeeded => "#28a745",
            TaskStatus::Failed => "#dc3545",
            TaskStatus::Running => "#007bff",
            TaskStatus::Pending => "#ffc107",
            TaskStatus::Canceled => "#6c757d",
            TaskStatus::Unknown(_) => "#343a40",
        }
    }

    /// Single-character icon for terminal output.
    pub fn symbol(&self) -> char {
        match self {
            TaskStatus::Succeeded => '✔',
            TaskStatus::Failed => '✘',
            TaskStatus::Running => '▶',
            TaskStatus::Pending => '…',
            TaskStatus::Canceled => '■',
            TaskStatus::Unknown(_) => '?',
        }
    }

    /// Human readable label, e.g. `Succeeded`.
    pub fn label(&self) -> String {
        match self {
            TaskStatus::Pending => "Pending".into(),
            TaskStatus::Running => "Running".into(),
            TaskStatus::Succeeded => "Succeeded".into(),
            TaskStatus::Failed => "Failed".into(),
            TaskStatus::Canceled => "Canceled".into(),
            TaskStatus::Unknown(s) => format!("Unknown ({s})"),
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "succeeded" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            "canceled" => TaskStatus::Canceled,
            _ => TaskStatus::Unknown(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskStatus::from(s.to_string()))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
