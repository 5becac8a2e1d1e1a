//! Director HTTP client

use crate::Director;
use crate::error::{DirectorError, Result};
use crate::manifest::Manifest;
use crate::model::{Binding, BindingRequest, Task, TaskId, TaskState};
use crate::version::DirectorVersion;
use async_trait::async_trait;
use odb_core::RequestContext;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Header correlating a deployment with its errands
pub const CONTEXT_ID_HEADER: &str = "X-Bosh-Context-Id";

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentResponse {
    #[serde(default)]
    manifest: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentSummary {
    name: String,
}

/// HTTP implementation of [`Director`]
///
/// Redirects are not followed: task submissions answer with a redirect to
/// `/tasks/<id>` and the id is read from the `Location` header.
pub struct DirectorClient {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl DirectorClient {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DirectorError::Setup(e.to_string()))?;

        let url: String = url.into();
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Authenticated request bounded by the context deadline
    fn request(&self, ctx: &RequestContext, method: Method, url: &str) -> Result<RequestBuilder> {
        let remaining = ctx.remaining();
        if remaining.is_some_and(|left| left.is_zero()) {
            return Err(DirectorError::Timeout(url.to_string()));
        }

        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(timeout) = remaining {
            request = request.timeout(timeout);
        }
        Ok(request)
    }

    async fn send(ctx: &RequestContext, url: &str, request: RequestBuilder) -> Result<Response> {
        tracing::debug!(%url, request_id = %ctx.request_id(), "Director request");
        request
            .send()
            .await
            .map_err(|e| DirectorError::from_transport(url, e))
    }

    async fn read_body(url: &str, response: Response) -> Result<(StatusCode, String)> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DirectorError::from_transport(url, e))?;
        Ok((status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, ctx: &RequestContext, path: &str) -> Result<T> {
        let url = self.url_for(path);
        let request = self.request(ctx, Method::GET, &url)?;
        let response = Self::send(ctx, &url, request).await?;
        let (status, body) = Self::read_body(&url, response).await?;

        if !status.is_success() {
            return Err(DirectorError::from_status(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| DirectorError::InvalidResponse(e.to_string()))
    }

    /// Send a task-creating request and read the task id from the redirect
    async fn submit_task(
        &self,
        ctx: &RequestContext,
        url: &str,
        request: RequestBuilder,
        context_id: Option<&str>,
    ) -> Result<TaskId> {
        let request = match context_id {
            Some(context_id) => request.header(CONTEXT_ID_HEADER, context_id),
            None => request,
        };

        let response = Self::send(ctx, url, request).await?;
        if !response.status().is_redirection() {
            let (status, body) = Self::read_body(url, response).await?;
            return Err(DirectorError::from_status(status.as_u16(), &body));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                DirectorError::InvalidResponse("task redirect without a location".into())
            })?;

        task_id_from_location(location).ok_or_else(|| {
            DirectorError::InvalidResponse(format!("unexpected task location: {}", location))
        })
    }

    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &[(&str, &str)],
    ) -> Result<Vec<Task>> {
        let url = self.url_for("/tasks");
        let request = self.request(ctx, Method::GET, &url)?.query(query);
        let response = Self::send(ctx, &url, request).await?;
        let (status, body) = Self::read_body(&url, response).await?;

        if !status.is_success() {
            return Err(DirectorError::from_status(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| DirectorError::InvalidResponse(e.to_string()))
    }
}

/// Task id from a `Location` such as `https://director:25555/tasks/42`
fn task_id_from_location(location: &str) -> Option<TaskId> {
    let (_, id) = location.trim_end_matches('/').rsplit_once("/tasks/")?;
    id.parse().ok().map(TaskId)
}

#[async_trait]
impl Director for DirectorClient {
    #[tracing::instrument(skip(self, ctx, manifest), fields(deployment = %manifest.name))]
    async fn submit_deployment(
        &self,
        ctx: &RequestContext,
        manifest: &Manifest,
        context_id: Option<&str>,
    ) -> Result<TaskId> {
        let yaml = manifest
            .to_yaml()
            .map_err(|e| DirectorError::Manifest(e.to_string()))?;

        let url = self.url_for("/deployments");
        let request = self
            .request(ctx, Method::POST, &url)?
            .header(CONTENT_TYPE, "text/yaml")
            .body(yaml);

        let task_id = self.submit_task(ctx, &url, request, context_id).await?;
        tracing::info!(%task_id, "Submitted deployment");
        Ok(task_id)
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn delete_deployment(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        context_id: Option<&str>,
    ) -> Result<TaskId> {
        let url = self.url_for(&format!("/deployments/{}", deployment));
        let request = self.request(ctx, Method::DELETE, &url)?;

        let task_id = self.submit_task(ctx, &url, request, context_id).await?;
        tracing::info!(%task_id, "Submitted deployment deletion");
        Ok(task_id)
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn run_errand(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        errand: &str,
        context_id: Option<&str>,
    ) -> Result<TaskId> {
        let url = self.url_for(&format!("/deployments/{}/errands/{}/runs", deployment, errand));
        let request = self
            .request(ctx, Method::POST, &url)?
            .json(&serde_json::json!({}));

        let task_id = self.submit_task(ctx, &url, request, context_id).await?;
        tracing::info!(%task_id, "Submitted errand");
        Ok(task_id)
    }

    async fn poll_task(&self, ctx: &RequestContext, task_id: TaskId) -> Result<Task> {
        self.get_json(ctx, &format!("/tasks/{}", task_id)).await
    }

    async fn tasks_for_context(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        context_id: &str,
    ) -> Result<Vec<Task>> {
        self.list_tasks(
            ctx,
            &[
                ("deployment", deployment),
                ("context_id", context_id),
                ("verbose", "1"),
            ],
        )
        .await
    }

    async fn incomplete_tasks(&self, ctx: &RequestContext, deployment: &str) -> Result<Vec<Task>> {
        let states = TaskState::INCOMPLETE
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let tasks = self
            .list_tasks(
                ctx,
                &[
                    ("deployment", deployment),
                    ("state", states.as_str()),
                    ("verbose", "1"),
                ],
            )
            .await?;

        Ok(tasks
            .into_iter()
            .filter(|task| task.state.is_incomplete())
            .collect())
    }

    async fn get_current_manifest(
        &self,
        ctx: &RequestContext,
        deployment: &str,
    ) -> Result<Option<Manifest>> {
        let response: DeploymentResponse = match self
            .get_json(ctx, &format!("/deployments/{}", deployment))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        if response.manifest.trim().is_empty() {
            return Ok(None);
        }

        Manifest::from_yaml(&response.manifest)
            .map(Some)
            .map_err(|e| DirectorError::InvalidResponse(format!("manifest: {}", e)))
    }

    async fn deployments(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let deployments: Vec<DeploymentSummary> = self.get_json(ctx, "/deployments").await?;
        Ok(deployments.into_iter().map(|d| d.name).collect())
    }

    async fn director_version(&self, ctx: &RequestContext) -> Result<DirectorVersion> {
        let info: InfoResponse = self.get_json(ctx, "/info").await?;
        Ok(DirectorVersion::parse(&info.version)?)
    }

    #[tracing::instrument(skip(self, ctx, request))]
    async fn create_binding(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        binding_id: &str,
        request: &BindingRequest,
    ) -> Result<Binding> {
        let url = self.url_for(&format!("/deployments/{}/bindings/{}", deployment, binding_id));
        let builder = self.request(ctx, Method::PUT, &url)?.json(request);
        let response = Self::send(ctx, &url, builder).await?;
        let (status, body) = Self::read_body(&url, response).await?;

        match status {
            StatusCode::CONFLICT => Err(DirectorError::BindingAlreadyExists(binding_id.to_string())),
            StatusCode::UNPROCESSABLE_ENTITY if request.app_guid.is_none() => {
                Err(DirectorError::AppGuidNotProvided)
            }
            status if status.is_success() => serde_json::from_str(&body)
                .map_err(|e| DirectorError::InvalidResponse(e.to_string())),
            status => Err(DirectorError::from_status(status.as_u16(), &body)),
        }
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn delete_binding(
        &self,
        ctx: &RequestContext,
        deployment: &str,
        binding_id: &str,
    ) -> Result<()> {
        let url = self.url_for(&format!("/deployments/{}/bindings/{}", deployment, binding_id));
        let request = self.request(ctx, Method::DELETE, &url)?;
        let response = Self::send(ctx, &url, request).await?;
        let (status, body) = Self::read_body(&url, response).await?;

        match status {
            StatusCode::NOT_FOUND => Err(DirectorError::BindingNotFound(binding_id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(DirectorError::from_status(status.as_u16(), &body)),
        }
    }
}
