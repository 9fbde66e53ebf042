//! CRUD shells around the backend's REST resources.
//!
//! A [`CrudShell`] mirrors one collection (host groups, hosts, playbooks) and
//! owns the draft of an inline create form. Every mutation is validated
//! client side first, and a successful mutation re-fetches the collection.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use derive_getters::Getters;
use serde::Serialize;

use crate::api::Backend;
use crate::error::ApiError;
use crate::log::*;
use crate::model::Id;

pub mod resources;
pub mod trigger;

pub use resources::{HostGroups, Hosts, Playbooks};
pub use trigger::{trigger, TriggerForm};

/// User input that has to be checked before it is sent anywhere.
pub trait Form {
    type Payload: Serialize + fmt::Debug + Send + Sync;

    /// Check the input and produce the request body. Never touches the
    /// network.
    fn validate(&self) -> Result<Self::Payload, ApiError>;
}

/// A blocking yes/no question put to the operator.
pub trait Confirm: Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Where the console should go after an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    HostGroups,
    Hosts,
    Playbooks,
    Tasks,
    Task(Id),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::HostGroups => f.write_str("/hostgroups"),
            Route::Hosts => f.write_str("/hosts"),
            Route::Playbooks => f.write_str("/playbooks"),
            Route::Tasks => f.write_str("/tasks"),
            Route::Task(id) => write!(f, "/tasks/{id}"),
        }
    }
}

/// One REST collection as seen by a [`CrudShell`].
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Record: Clone + fmt::Debug + Send + Sync;
    type Form: Form + Default + Clone + fmt::Debug + Send + Sync + for<'a> From<&'a Self::Record>;
    type Filter: Clone + fmt::Debug + Default + Send + Sync;

    /// Singular display name, e.g. `host group`.
    const NAME: &'static str;
    const LIST_ROUTE: Route;
    const DELETE_PROMPT: &'static str;

    fn id(record: &Self::Record) -> Id;

    async fn list(
        backend: &dyn Backend,
        filter: &Self::Filter,
    ) -> Result<Vec<Self::Record>, ApiError>;

    async fn get(backend: &dyn Backend, id: Id) -> Result<Self::Record, ApiError>;

    async fn create(
        backend: &dyn Backend,
        payload: &<Self::Form as Form>::Payload,
    ) -> Result<Self::Record, ApiError>;

    async fn update(
        backend: &dyn Backend,
        id: Id,
        payload: &<Self::Form as Form>::Payload,
    ) -> Result<Self::Record, ApiError>;

    async fn delete(backend: &dyn Backend, id: Id) -> Result<(), ApiError>;
}

/// A record loaded for editing, with the form pre-filled from it.
#[derive(Getters, Debug, Clone)]
pub struct EditForm<R: Resource> {
    id: Id,
    original: R::Record,
    #[getter(skip)]
    pub form: R::Form,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The operator declined; nothing was sent.
    Declined,
}

#[derive(Getters, Debug)]
pub struct CrudShell<R: Resource> {
    #[getter(skip)]
    backend: Arc<dyn Backend>,
    filter: R::Filter,
    records: Vec<R::Record>,
    loading: bool,
    /// Page-level error: failed list fetch or failed delete.
    error: Option<String>,
    create_open: bool,
    draft: R::Form,
    /// Error from the last create attempt, shown next to the form.
    create_error: Option<String>,
}

impl<R: Resource> CrudShell<R> {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_filter(backend, R::Filter::default())
    }

    pub fn with_filter(backend: Arc<dyn Backend>, filter: R::Filter) -> Self {
        Self {
            backend,
            filter,
            records: vec![],
            loading: false,
            error: None,
            create_open: false,
            draft: R::Form::default(),
            create_error: None,
        }
    }

    pub fn draft_mut(&mut self) -> &mut R::Form {
        &mut self.draft
    }

    pub fn find(&self, id: Id) -> Option<&R::Record> {
        self.records.iter().find(|r| R::id(r) == id)
    }

    /// Re-fetch the collection. On failure the previous records stay and the
    /// error is kept as the page-level error.
    #[tracing::instrument(skip(self), fields(resource = R::NAME))]
    pub async fn refresh(&mut self) -> Result<&[R::Record], ApiError> {
        self.loading = true;
        let result = R::list(self.backend.as_ref(), &self.filter).await;
        self.loading = false;
        match result {
            Ok(records) => {
                debug!("fetched {} {} records", records.len(), R::NAME);
                self.records = records;
                self.error = None;
                Ok(&self.records)
            }
            Err(e) => {
                error!("failed to fetch {} records: {e}", R::NAME);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Show or hide the create form. The draft survives hiding.
    pub fn toggle_create(&mut self) -> bool {
        self.create_open = !self.create_open;
        self.error = None;
        self.create_error = None;
        self.create_open
    }

    /// Submit the create form. Success closes and clears the form and
    /// re-fetches the list; failure keeps the draft as typed.
    #[tracing::instrument(skip(self), fields(resource = R::NAME))]
    pub async fn submit_create(&mut self) -> Result<R::Record, ApiError> {
        self.create_error = None;
        let payload = match self.draft.validate() {
            Ok(payload) => payload,
            Err(e) => {
                self.create_error = Some(e.to_string());
                return Err(e);
            }
        };
        match R::create(self.backend.as_ref(), &payload).await {
            Ok(record) => {
                info!("created {} {}", R::NAME, R::id(&record));
                self.create_open = false;
                self.draft = R::Form::default();
                // The record exists either way; a failed re-fetch only shows
                // up as the page-level error.
                let _ = self.refresh().await;
                Ok(record)
            }
            Err(e) => {
                warn!("creating {} failed: {e}", R::NAME);
                self.create_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch a single record and pre-fill an edit form from it.
    pub async fn load_for_edit(&self, id: Id) -> Result<EditForm<R>, ApiError> {
        let original = R::get(self.backend.as_ref(), id).await?;
        let form = R::Form::from(&original);
        Ok(EditForm { id, original, form })
    }

    /// Submit an edit. Success navigates back to the list; the error is
    /// handed back otherwise so the caller keeps the edited form.
    #[tracing::instrument(skip(self, edit), fields(resource = R::NAME, id = edit.id))]
    pub async fn submit_edit(&mut self, edit: &EditForm<R>) -> Result<Route, ApiError> {
        let payload = edit.form.validate()?;
        R::update(self.backend.as_ref(), edit.id, &payload).await?;
        info!("updated {} {}", R::NAME, edit.id);
        Ok(R::LIST_ROUTE)
    }

    /// Delete after explicit confirmation, then re-fetch the list. A failed
    /// delete leaves the record listed and sets the page-level error.
    #[tracing::instrument(skip(self, confirm), fields(resource = R::NAME))]
    pub async fn delete(
        &mut self,
        id: Id,
        confirm: &dyn Confirm,
    ) -> Result<DeleteOutcome, ApiError> {
        if !confirm.confirm(R::DELETE_PROMPT) {
            debug!("delete of {} {id} declined", R::NAME);
            return Ok(DeleteOutcome::Declined);
        }
        match R::delete(self.backend.as_ref(), id).await {
            Ok(()) => {
                info!("deleted {} {id}", R::NAME);
                let _ = self.refresh().await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                error!("deleting {} {id} failed: {e}", R::NAME);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
