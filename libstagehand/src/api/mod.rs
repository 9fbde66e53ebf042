//! The seam between the console and the automation backend. Everything the
//! client knows about the REST API goes through [`Backend`]; [`http`] is the
//! real implementation.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{
    Credentials, Host, HostGroup, HostGroupForm, HostPayload, Id, Playbook, PlaybookForm,
    Registration, TaskExecution, TokenPair, TriggerRequest, User,
};

pub mod http;

pub use http::HttpBackend;

pub type Result<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait Backend: std::fmt::Debug + Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair>;

    async fn register(&self, registration: &Registration) -> Result<User>;

    /// Ask the backend to blacklist the refresh token.
    async fn logout(&self, refresh: &str) -> Result<()>;

    async fn current_user(&self) -> Result<User>;

    async fn host_groups(&self) -> Result<Vec<HostGroup>>;

    async fn host_group(&self, id: Id) -> Result<HostGroup>;

    async fn create_host_group(&self, form: &HostGroupForm) -> Result<HostGroup>;

    async fn update_host_group(&self, id: Id, form: &HostGroupForm) -> Result<HostGroup>;

    async fn delete_host_group(&self, id: Id) -> Result<()>;

    /// List hosts, optionally only those in the given group.
    async fn hosts(&self, group: Option<Id>) -> Result<Vec<Host>>;

    async fn host(&self, id: Id) -> Result<Host>;

    async fn create_host(&self, payload: &HostPayload) -> Result<Host>;

    async fn update_host(&self, id: Id, payload: &HostPayload) -> Result<Host>;

    async fn delete_host(&self, id: Id) -> Result<()>;

    async fn playbooks(&self) -> Result<Vec<Playbook>>;

    async fn playbook(&self, id: Id) -> Result<Playbook>;

    async fn create_playbook(&self, form: &PlaybookForm) -> Result<Playbook>;

    async fn update_playbook(&self, id: Id, form: &PlaybookForm) -> Result<Playbook>;

    async fn delete_playbook(&self, id: Id) -> Result<()>;

    /// List task executions, optionally only those of the given playbook.
    async fn task_executions(&self, playbook: Option<Id>) -> Result<Vec<TaskExecution>>;

    async fn task_execution(&self, id: Id) -> Result<TaskExecution>;

    async fn trigger_task(&self, request: &TriggerRequest) -> Result<TaskExecution>;

    /// Raw log text of a task execution.
    async fn task_log(&self, id: Id) -> Result<String>;
}
