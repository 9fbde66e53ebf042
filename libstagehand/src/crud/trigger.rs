//! Running a playbook. The new task's id always comes from the backend's
//! response.

use crate::api::Backend;
use crate::crud::{Form, Route};
use crate::error::ApiError;
use crate::log::*;
use crate::model::{Id, TaskExecution, TriggerRequest};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerForm {
    pub playbook: Option<Id>,
    pub target_spec: String,
}

impl Default for TriggerForm {
    fn default() -> Self {
        Self {
            playbook: None,
            target_spec: "all".into(),
        }
    }
}

impl Form for TriggerForm {
    type Payload = TriggerRequest;

    fn validate(&self) -> Result<TriggerRequest, ApiError> {
        let playbook = self
            .playbook
            .ok_or_else(|| ApiError::Validation("Please select a playbook.".into()))?;
        if self.target_spec.trim().is_empty() {
            return Err(ApiError::Validation(
                "Target specification cannot be empty.".into(),
            ));
        }
        Ok(TriggerRequest {
            playbook,
            target_spec: self.target_spec.clone(),
        })
    }
}

/// Submit the trigger form and return the created task with the route to its
/// detail view.
#[tracing::instrument(skip(backend))]
pub async fn trigger(
    backend: &dyn Backend,
    form: &TriggerForm,
) -> Result<(TaskExecution, Route), ApiError> {
    let request = form.validate()?;
    let task = backend.trigger_task(&request).await?;
    info!(
        "triggered task {} for playbook {} on '{}'",
        task.id, request.playbook, request.target_spec
    );
    let route = Route::Task(task.id);
    Ok((task, route))
}
