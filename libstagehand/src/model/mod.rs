//! The data model mirrored from the automation backend. Records are plain
//! attribute bags owned by the server; the client never has authority over
//! them.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub mod inventory;
pub mod playbook;
pub mod status;
pub mod user;

pub use inventory::{Host, HostForm, HostGroup, HostGroupForm, HostPayload};
pub use playbook::{Playbook, PlaybookForm};
pub use status::{LogPolicy, TaskStatus};
pub use user::{Credentials, Registration, Role, TokenPair, User};

/// Backend-assigned record identifier.
pub type Id = u64;

/// A server-tracked record of one playbook run against a target
/// specification.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskExecution {
    pub id: Id,
    pub playbook: Id,
    #[serde(default)]
    pub playbook_name: Option<String>,
    /// `all`, a group name, or a comma separated host list. Never validated
    /// client side.
    pub target_spec: String,
    pub status: TaskStatus,
    /// Correlates the record with the backend's worker job.
    #[serde(default)]
    pub celery_task_id: Option<String>,
    #[serde(default)]
    pub output_log_directory: Option<String>,
    #[serde(default)]
    pub executed_by: Option<Id>,
    #[serde(default)]
    pub executed_by_username: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl TaskExecution {
    /// The playbook's display name, falling back to its id.
    pub fn playbook_label(&self) -> String {
        self.playbook_name
            .clone()
            .unwrap_or_else(|| format!("Playbook ID: {}", self.playbook))
    }
}

/// The only way the client creates a [`TaskExecution`]: ask the backend to
/// run a playbook against a target specification.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRequest {
    pub playbook: Id,
    pub target_spec: String,
}
