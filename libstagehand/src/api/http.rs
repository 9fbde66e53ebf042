use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::{Backend, Result};
use crate::error::ApiError;
use crate::log::*;
use crate::model::{
    Credentials, Host, HostGroup, HostGroupForm, HostPayload, Id, Playbook, PlaybookForm,
    Registration, TaskExecution, TokenPair, TriggerRequest, User,
};
use crate::session::{TokenStore, ACCESS_TOKEN_KEY};

/// [`Backend`] over the versioned REST API, e.g. `http://host/api/v1`.
/// Authenticated requests carry the access token currently held by the
/// token store.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl HttpBackend {
    pub fn new<S: Into<String>>(base_url: S, tokens: Arc<dyn TokenStore>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, tokens)
    }

    pub fn with_client<S: Into<String>>(
        client: reqwest::Client,
        base_url: S,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path);
        debug!("{method} {url}");
        let builder = self.client.request(method, url);
        match self.tokens.get(ACCESS_TOKEN_KEY).await? {
            Some(token) => {
                trace!("attaching bearer token {}", redact(&token));
                Ok(builder.bearer_auth(token))
            }
            None => Ok(builder),
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("request failed with {status}: {body}");
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, Id)]) -> Result<T> {
        let response = self.request(Method::GET, path).await?.query(query).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.request(method, path).await?.json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.request(Method::DELETE, path).await?.send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn filter(key: &'static str, id: Option<Id>) -> Vec<(&'static str, Id)> {
    id.map(|id| vec![(key, id)]).unwrap_or_default()
}

#[async_trait]
impl Backend for HttpBackend {
    #[tracing::instrument(skip(self))]
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair> {
        let response = self
            .client
            .post(self.url("auth/login/"))
            .json(credentials)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn register(&self, registration: &Registration) -> Result<User> {
        let response = self
            .client
            .post(self.url("auth/register/"))
            .json(registration)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    #[tracing::instrument(skip_all)]
    async fn logout(&self, refresh: &str) -> Result<()> {
        let response = self
            .request(Method::POST, "auth/logout/")
            .await?
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn current_user(&self) -> Result<User> {
        if self.tokens.get(ACCESS_TOKEN_KEY).await?.is_none() {
            return Err(ApiError::NotAuthenticated);
        }
        self.get_json("auth/user/", &[]).await
    }

    async fn host_groups(&self) -> Result<Vec<HostGroup>> {
        self.get_json("hostgroups/", &[]).await
    }

    async fn host_group(&self, id: Id) -> Result<HostGroup> {
        self.get_json(&format!("hostgroups/{id}/"), &[]).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_host_group(&self, form: &HostGroupForm) -> Result<HostGroup> {
        self.send_json(Method::POST, "hostgroups/", form).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_host_group(&self, id: Id, form: &HostGroupForm) -> Result<HostGroup> {
        self.send_json(Method::PUT, &format!("hostgroups/{id}/"), form)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_host_group(&self, id: Id) -> Result<()> {
        self.delete(&format!("hostgroups/{id}/")).await
    }

    async fn hosts(&self, group: Option<Id>) -> Result<Vec<Host>> {
        self.get_json("hosts/", &filter("group_id", group)).await
    }

    async fn host(&self, id: Id) -> Result<Host> {
        self.get_json(&format!("hosts/{id}/"), &[]).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_host(&self, payload: &HostPayload) -> Result<Host> {
        self.send_json(Method::POST, "hosts/", payload).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_host(&self, id: Id, payload: &HostPayload) -> Result<Host> {
        self.send_json(Method::PUT, &format!("hosts/{id}/"), payload)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_host(&self, id: Id) -> Result<()> {
        self.delete(&format!("hosts/{id}/")).await
    }

    async fn playbooks(&self) -> Result<Vec<Playbook>> {
        self.get_json("playbooks/", &[]).await
    }

    async fn playbook(&self, id: Id) -> Result<Playbook> {
        self.get_json(&format!("playbooks/{id}/"), &[]).await
    }

    #[tracing::instrument(skip(self, form), fields(name = %form.name))]
    async fn create_playbook(&self, form: &PlaybookForm) -> Result<Playbook> {
        self.send_json(Method::POST, "playbooks/", form).await
    }

    #[tracing::instrument(skip(self, form), fields(name = %form.name))]
    async fn update_playbook(&self, id: Id, form: &PlaybookForm) -> Result<Playbook> {
        self.send_json(Method::PUT, &format!("playbooks/{id}/"), form)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_playbook(&self, id: Id) -> Result<()> {
        self.delete(&format!("playbooks/{id}/")).await
    }

    async fn task_executions(&self, playbook: Option<Id>) -> Result<Vec<TaskExecution>> {
        self.get_json("taskexecutions/", &filter("playbook_id", playbook))
            .await
    }

    async fn task_execution(&self, id: Id) -> Result<TaskExecution> {
        self.get_json(&format!("taskexecutions/{id}/"), &[]).await
    }

    #[tracing::instrument(skip(self))]
    async fn trigger_task(&self, request: &TriggerRequest) -> Result<TaskExecution> {
        self.send_json(Method::POST, "taskexecutions/", request)
            .await
    }

    async fn task_log(&self, id: Id) -> Result<String> {
        let response = self
            .request(Method::GET, &format!("taskexecutions/{id}/log_content/"))
            .await?
            .send()
            .await?;
        Ok(Self::check(response).await?.text().await?)
    }
}
