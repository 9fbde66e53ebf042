use async_trait::async_trait;

use super::{Resource, Route};
use crate::api::Backend;
use crate::error::ApiError;
use crate::model::{
    Host, HostForm, HostGroup, HostGroupForm, HostPayload, Id, Playbook, PlaybookForm,
};

#[derive(Debug, Clone, Copy)]
pub struct HostGroups;

#[derive(Debug, Clone, Copy)]
pub struct Hosts;

#[derive(Debug, Clone, Copy)]
pub struct Playbooks;

#[async_trait]
impl Resource for HostGroups {
    type Record = HostGroup;
    type Form = HostGroupForm;
    type Filter = ();

    const NAME: &'static str = "host group";
    const LIST_ROUTE: Route = Route::HostGroups;
    const DELETE_PROMPT: &'static str =
        "Are you sure you want to delete this host group? This might affect hosts in this group.";

    fn id(record: &HostGroup) -> Id {
        record.id
    }

    async fn list(backend: &dyn Backend, _filter: &()) -> Result<Vec<HostGroup>, ApiError> {
        backend.host_groups().await
    }

    async fn get(backend: &dyn Backend, id: Id) -> Result<HostGroup, ApiError> {
        backend.host_group(id).await
    }

    async fn create(backend: &dyn Backend, payload: &HostGroupForm) -> Result<HostGroup, ApiError> {
        backend.create_host_group(payload).await
    }

    async fn update(
        backend: &dyn Backend,
        id: Id,
        payload: &HostGroupForm,
    ) -> Result<HostGroup, ApiError> {
        backend.update_host_group(id, payload).await
    }

    async fn delete(backend: &dyn Backend, id: Id) -> Result<(), ApiError> {
        backend.delete_host_group(id).await
    }
}

/// Hosts, optionally filtered to the members of one group.
#[async_trait]
impl Resource for Hosts {
    type Record = Host;
    type Form = HostForm;
    type Filter = Option<Id>;

    const NAME: &'static str = "host";
    const LIST_ROUTE: Route = Route::Hosts;
    const DELETE_PROMPT: &'static str =
        "Are you sure you want to delete this host? This action cannot be undone.";

    fn id(record: &Host) -> Id {
        record.id
    }

    async fn list(backend: &dyn Backend, group: &Option<Id>) -> Result<Vec<Host>, ApiError> {
        backend.hosts(*group).await
    }

    async fn get(backend: &dyn Backend, id: Id) -> Result<Host, ApiError> {
        backend.host(id).await
    }

    async fn create(backend: &dyn Backend, payload: &HostPayload) -> Result<Host, ApiError> {
        backend.create_host(payload).await
    }

    async fn update(
        backend: &dyn Backend,
        id: Id,
        payload: &HostPayload,
    ) -> Result<Host, ApiError> {
        backend.update_host(id, payload).await
    }

    async fn delete(backend: &dyn Backend, id: Id) -> Result<(), ApiError> {
        backend.delete_host(id).await
    }
}

#[async_trait]
impl Resource for Playbooks {
    type Record = Playbook;
    type Form = PlaybookForm;
    type Filter = ();

    const NAME: &'static str = "playbook";
    const LIST_ROUTE: Route = Route::Playbooks;
    const DELETE_PROMPT: &'static str =
        "Are you sure you want to delete this playbook? This action cannot be undone.";

    fn id(record: &Playbook) -> Id {
        record.id
    }

    async fn list(backend: &dyn Backend, _filter: &()) -> Result<Vec<Playbook>, ApiError> {
        backend.playbooks().await
    }

    async fn get(backend: &dyn Backend, id: Id) -> Result<Playbook, ApiError> {
        backend.playbook(id).await
    }

    async fn create(backend: &dyn Backend, payload: &PlaybookForm) -> Result<Playbook, ApiError> {
        backend.create_playbook(payload).await
    }

    async fn update(
        backend: &dyn Backend,
        id: Id,
        payload: &PlaybookForm,
    ) -> Result<Playbook, ApiError> {
        backend.update_playbook(id, payload).await
    }

    async fn delete(backend: &dyn Backend, id: Id) -> Result<(), ApiError> {
        backend.delete_playbook(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::crud::CrudShell;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_that_hosts_can_be_filtered_by_group() -> Result<(), ApiError> {
        let backend = Arc::new(FakeBackend::default());
        let web = backend.seed_host_group("web");
        backend.seed_host("web-1", vec![web.id]);
        backend.seed_host("db-1", vec![]);

        let mut all = CrudShell::<Hosts>::new(backend.clone());
        assert_eq!(2, all.refresh().await?.len());

        let mut members = CrudShell::<Hosts>::with_filter(backend.clone(), Some(web.id));
        let hosts = members.refresh().await?;
        assert_eq!(1, hosts.len());
        assert_eq!("web-1", hosts[0].name);
        Ok(())
    }
}
