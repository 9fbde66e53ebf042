//! A scripted, in-memory [`Backend`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{Backend, Result};
use crate::error::ApiError;
use crate::model::{
    Credentials, Host, HostGroup, HostGroupForm, HostPayload, Id, Playbook, PlaybookForm,
    Registration, Role, TaskExecution, TaskStatus, TokenPair, TriggerRequest, User,
};
use crate::model::user::Profile;

pub(crate) fn user() -> User {
    User {
        id: 1,
        username: "admin".into(),
        email: "admin@example.com".into(),
        first_name: "Ada".into(),
        last_name: "Admin".into(),
        profile: Some(Profile { role: Role::Admin }),
    }
}

pub(crate) fn task(id: Id, status: TaskStatus) -> TaskExecution {
    TaskExecution {
        id,
        playbook: 3,
        playbook_name: Some("site.yml".into()),
        target_spec: "all".into(),
        status,
        celery_task_id: None,
        output_log_directory: None,
        executed_by: Some(1),
        executed_by_username: Some("admin".into()),
        created_at: None,
        started_at: None,
        completed_at: None,
    }
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<(String, Option<Id>)>,
    failures: HashMap<String, ApiError>,
    delay: Option<Duration>,
    task_scripts: HashMap<Id, VecDeque<TaskStatus>>,
    task_lists: VecDeque<Result<Vec<TaskExecution>>>,
    next_id: Id,
    next_task_id: Option<Id>,
    host_groups: Vec<HostGroup>,
    hosts: Vec<Host>,
    playbooks: Vec<Playbook>,
    created_host_groups: Vec<HostGroupForm>,
    triggered: Vec<TriggerRequest>,
}

impl Inner {
    fn id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

/// Pop the next scripted value; the last one repeats forever.
fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

fn not_found() -> ApiError {
    ApiError::from_response(404, r#"{"detail": "Not found."}"#)
}

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    inner: Mutex<Inner>,
}

impl FakeBackend {
    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        f(&mut self.inner.lock().unwrap())
    }

    /// Record the call, wait out any configured delay, then apply any
    /// configured failure.
    async fn enter(&self, op: &str, id: Option<Id>) -> Result<()> {
        let delay = self.with(|i| {
            i.calls.push((op.to_string(), id));
            i.delay
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.with(|i| i.failures.get(op).cloned()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn count(&self, op: &str) -> usize {
        self.with(|i| i.calls.iter().filter(|(o, _)| o == op).count())
    }

    pub(crate) fn count_for(&self, op: &str, id: Id) -> usize {
        self.with(|i| {
            i.calls
                .iter()
                .filter(|(o, i)| o == op && *i == Some(id))
                .count()
        })
    }

    /// Make every call to `op` fail with `e`.
    pub(crate) fn fail(&self, op: &str, e: ApiError) {
        self.with(|i| i.failures.insert(op.to_string(), e));
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.with(|i| i.delay = Some(delay));
    }

    pub(crate) fn script_task(&self, id: Id, statuses: &[TaskStatus]) {
        self.with(|i| {
            i.task_scripts
                .insert(id, statuses.iter().cloned().collect())
        });
    }

    pub(crate) fn script_task_lists(&self, lists: Vec<Result<Vec<TaskExecution>>>) {
        self.with(|i| i.task_lists = lists.into_iter().collect());
    }

    pub(crate) fn set_next_task_id(&self, id: Id) {
        self.with(|i| i.next_task_id = Some(id));
    }

    pub(crate) fn triggered(&self) -> Vec<TriggerRequest> {
        self.with(|i| i.triggered.clone())
    }

    pub(crate) fn created_host_groups(&self) -> Vec<HostGroupForm> {
        self.with(|i| i.created_host_groups.clone())
    }

    pub(crate) fn seed_host_group(&self, name: &str) -> HostGroup {
        self.with(|i| {
            let group = HostGroup {
                id: i.id(),
                name: name.into(),
                description: None,
                created_by_username: Some("admin".into()),
                created_at: None,
                updated_at: None,
            };
            i.host_groups.push(group.clone());
            group
        })
    }

    pub(crate) fn seed_host(&self, name: &str, groups: Vec<Id>) -> Host {
        self.with(|i| {
            let host = Host {
                id: i.id(),
                name: name.into(),
                ip_address: Some("10.0.0.1".into()),
                fqdn: None,
                ansible_user: Some("root".into()),
                ansible_port: Some(22),
                ssh_key_name: None,
                groups,
                group_details: None,
                variables: Default::default(),
                created_by_username: None,
                created_at: None,
                updated_at: None,
            };
            i.hosts.push(host.clone());
            host
        })
    }

    pub(crate) fn seed_playbook(&self, name: &str) -> Playbook {
        self.with(|i| {
            let playbook = Playbook {
                id: i.id(),
                name: name.into(),
                description: None,
                content: "- hosts: all\n  tasks: []\n".into(),
                created_by_username: None,
                created_at: None,
                updated_at: None,
            };
            i.playbooks.push(playbook.clone());
            playbook
        })
    }

    fn host_from(id: Id, payload: &HostPayload) -> Host {
        Host {
            id,
            name: payload.name().clone(),
            ip_address: payload.ip_address().clone(),
            fqdn: payload.fqdn().clone(),
            ansible_user: payload.ansible_user().clone(),
            ansible_port: *payload.ansible_port(),
            ssh_key_name: payload.ssh_key_name().clone(),
            groups: payload.groups().clone(),
            group_details: None,
            variables: payload.variables().clone(),
            created_by_username: Some("admin".into()),
            created_at: None,
            updated_at: None,
        }
    }

    fn playbook_from(id: Id, form: &PlaybookForm) -> Playbook {
        Playbook {
            id,
            name: form.name.clone(),
            description: Some(form.description.clone()),
            content: form.content.clone(),
            created_by_username: Some("admin".into()),
            created_at: None,
            updated_at: None,
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, _credentials: &Credentials) -> Result<TokenPair> {
        self.enter("login", None).await?;
        Ok(TokenPair {
            access: "access-token".into(),
            refresh: "refresh-token".into(),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<User> {
        self.enter("register", None).await?;
        Ok(User {
            id: 2,
            username: registration.username.clone(),
            email: registration.email.clone(),
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            profile: None,
        })
    }

    async fn logout(&self, _refresh: &str) -> Result<()> {
        self.enter("logout", None).await
    }

    async fn current_user(&self) -> Result<User> {
        self.enter("current_user", None).await?;
        Ok(user())
    }

    async fn host_groups(&self) -> Result<Vec<HostGroup>> {
        self.enter("host_groups", None).await?;
        Ok(self.with(|i| i.host_groups.clone()))
    }

    async fn host_group(&self, id: Id) -> Result<HostGroup> {
        self.enter("host_group", Some(id)).await?;
        self.with(|i| i.host_groups.iter().find(|g| g.id == id).cloned())
            .ok_or_else(not_found)
    }

    async fn create_host_group(&self, form: &HostGroupForm) -> Result<HostGroup> {
        self.enter("create_host_group", None).await?;
        self.with(|i| {
            i.created_host_groups.push(form.clone());
            let group = HostGroup {
                id: i.id(),
                name: form.name.clone(),
                description: Some(form.description.clone()),
                created_by_username: Some("admin".into()),
                created_at: None,
                updated_at: None,
            };
            i.host_groups.push(group.clone());
            Ok(group)
        })
    }

    async fn update_host_group(&self, id: Id, form: &HostGroupForm) -> Result<HostGroup> {
        self.enter("update_host_group", Some(id)).await?;
        self.with(|i| {
            let group = i
                .host_groups
                .iter_mut()
                .find(|g| g.id == id)
                .ok_or_else(not_found)?;
            group.name = form.name.clone();
            group.description = Some(form.description.clone());
            Ok(group.clone())
        })
    }

    async fn delete_host_group(&self, id: Id) -> Result<()> {
        self.enter("delete_host_group", Some(id)).await?;
        self.with(|i| i.host_groups.retain(|g| g.id != id));
        Ok(())
    }

    async fn hosts(&self, group: Option<Id>) -> Result<Vec<Host>> {
        self.enter("hosts", group).await?;
        Ok(self.with(|i| {
            i.hosts
                .iter()
                .filter(|h| group.map(|g| h.groups.contains(&g)).unwrap_or(true))
                .cloned()
                .collect()
        }))
    }

    async fn host(&self, id: Id) -> Result<Host> {
        self.enter("host", Some(id)).await?;
        self.with(|i| i.hosts.iter().find(|h| h.id == id).cloned())
            .ok_or_else(not_found)
    }

    async fn create_host(&self, payload: &HostPayload) -> Result<Host> {
        self.enter("create_host", None).await?;
        Ok(self.with(|i| {
            let host = Self::host_from(i.id(), payload);
            i.hosts.push(host.clone());
            host
        }))
    }

    async fn update_host(&self, id: Id, payload: &HostPayload) -> Result<Host> {
        self.enter("update_host", Some(id)).await?;
        self.with(|i| {
            let host = i.hosts.iter_mut().find(|h| h.id == id).ok_or_else(not_found)?;
            *host = Self::host_from(id, payload);
            Ok(host.clone())
        })
    }

    async fn delete_host(&self, id: Id) -> Result<()> {
        self.enter("delete_host", Some(id)).await?;
        self.with(|i| i.hosts.retain(|h| h.id != id));
        Ok(())
    }

    async fn playbooks(&self) -> Result<Vec<Playbook>> {
        self.enter("playbooks", None).await?;
        Ok(self.with(|i| i.playbooks.clone()))
    }

    async fn playbook(&self, id: Id) -> Result<Playbook> {
        self.enter("playbook", Some(id)).await?;
        self.with(|i| i.playbooks.iter().find(|p| p.id == id).cloned())
            .ok_or_else(not_found)
    }

    async fn create_playbook(&self, form: &PlaybookForm) -> Result<Playbook> {
        self.enter("create_playbook", None).await?;
        Ok(self.with(|i| {
            let playbook = Self::playbook_from(i.id(), form);
            i.playbooks.push(playbook.clone());
            playbook
        }))
    }

    async fn update_playbook(&self, id: Id, form: &PlaybookForm) -> Result<Playbook> {
        self.enter("update_playbook", Some(id)).await?;
        self.with(|i| {
            let playbook = i
                .playbooks
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(not_found)?;
            *playbook = Self::playbook_from(id, form);
            Ok(playbook.clone())
        })
    }

    async fn delete_playbook(&self, id: Id) -> Result<()> {
        self.enter("delete_playbook", Some(id)).await?;
        self.with(|i| i.playbooks.retain(|p| p.id != id));
        Ok(())
    }

    async fn task_executions(&self, playbook: Option<Id>) -> Result<Vec<TaskExecution>> {
        self.enter("task_executions", playbook).await?;
        self.with(|i| next(&mut i.task_lists)).unwrap_or(Ok(vec![]))
    }

    async fn task_execution(&self, id: Id) -> Result<TaskExecution> {
        self.enter("task_execution", Some(id)).await?;
        let status = self
            .with(|i| i.task_scripts.get_mut(&id).and_then(next))
            .ok_or_else(not_found)?;
        Ok(task(id, status))
    }

    async fn trigger_task(&self, request: &TriggerRequest) -> Result<TaskExecution> {
        self.enter("trigger_task", None).await?;
        Ok(self.with(|i| {
            i.triggered.push(request.clone());
            let id = match i.next_task_id.take() {
                Some(id) => id,
                None => i.id(),
            };
            let mut created = task(id, TaskStatus::Pending);
            created.playbook = request.playbook;
            created.target_spec = request.target_spec.clone();
            created
        }))
    }

    async fn task_log(&self, id: Id) -> Result<String> {
        self.enter("task_log", Some(id)).await?;
        Ok(format!("log for task {id}"))
    }
}
