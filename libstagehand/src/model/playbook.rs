use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::Id;
use crate::crud::Form;
use crate::error::ApiError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Playbook {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// YAML source of the playbook.
    pub content: String,
    #[serde(default)]
    pub created_by_username: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybookForm {
    pub name: String,
    pub description: String,
    pub content: String,
}

impl Form for PlaybookForm {
    type Payload = PlaybookForm;

    fn validate(&self) -> Result<Self::Payload, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Playbook name is required.".into()));
        }
        if self.content.trim().is_empty() {
            return Err(ApiError::Validation(
                "Playbook content cannot be empty.".into(),
            ));
        }
        Ok(self.clone())
    }
}

impl From<&Playbook> for PlaybookForm {
    fn from(playbook: &Playbook) -> Self {
        Self {
            name: playbook.name.clone(),
            description: playbook.description.clone().unwrap_or_default(),
            content: playbook.content.clone(),
        }
    }
}
