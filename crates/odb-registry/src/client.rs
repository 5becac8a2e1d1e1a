//! Registry HTTP client

use crate::Registry;
use crate::auth::{AuthHeaderBuilder, TokenCache};
use crate::error::{RegistryError, Result};
use crate::model::{
    Binding, BindingEntity, BrokerEntity, InfoEntity, Instance, InstanceEntity, InstanceRef,
    InstanceState, OperationState, Page, PlanEntity, Resource, ServiceEntity, ServiceKey,
};
use async_trait::async_trait;
use odb_core::RequestContext;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// HTTP implementation of [`Registry`]
pub struct RegistryClient {
    client: reqwest::Client,
    url: String,
    tokens: TokenCache,
}

impl RegistryClient {
    pub fn new(url: impl Into<String>, auth: Arc<dyn AuthHeaderBuilder>) -> Self {
        Self::with_client(reqwest::Client::new(), url, auth)
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        auth: Arc<dyn AuthHeaderBuilder>,
    ) -> Self {
        let url: String = url.into();
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            tokens: TokenCache::new(auth),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Send once with the cached header; on 401 refresh once and resend
    async fn send(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let header = self.tokens.header(ctx).await?;
        let response = self.execute(ctx, &method, path, body, &header).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path, "Registry rejected auth header, refreshing");
        let header = self.tokens.refresh(ctx, &header).await?;
        self.execute(ctx, &method, path, body, &header).await
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        header: &str,
    ) -> Result<Response> {
        let url = self.url_for(path);
        let remaining = ctx.remaining();
        if remaining.is_some_and(|left| left.is_zero()) {
            return Err(RegistryError::Timeout(url));
        }

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, header);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = remaining {
            request = request.timeout(timeout);
        }

        tracing::debug!(%method, %url, request_id = %ctx.request_id(), "Registry request");
        request
            .send()
            .await
            .map_err(|e| RegistryError::from_transport(&url, e))
    }

    /// Read the body of a response, classifying non-2xx statuses
    async fn read_body(path: &str, response: Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::from_transport(path, e))?;

        if !status.is_success() {
            return Err(RegistryError::from_status(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, ctx: &RequestContext, path: &str) -> Result<T> {
        let response = self.send(ctx, Method::GET, path, None).await?;
        let body = Self::read_body(path, response).await?;
        serde_json::from_str(&body).map_err(|e| RegistryError::InvalidResponse(e.to_string()))
    }

    /// Follow `next_url` from `path` until the last page
    ///
    /// A `next_url` pointing back at a page already read fails the call.
    async fn list_all<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<Vec<Resource<T>>> {
        let mut resources = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(path.to_string());

        while let Some(page_path) = next {
            if !visited.insert(page_path.clone()) {
                return Err(RegistryError::InvalidResponse(format!(
                    "pagination loops back to {}",
                    page_path
                )));
            }
            let page: Page<T> = self.get_json(ctx, &page_path).await?;
            resources.extend(page.resources);
            next = page.next_url;
        }

        Ok(resources)
    }

    /// DELETE that treats an already-absent resource as success
    async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<()> {
        let response = self.send(ctx, Method::DELETE, path, None).await?;
        match Self::read_body(path, response).await {
            Ok(_) => Ok(()),
            Err(RegistryError::NotFound(description)) => {
                tracing::info!(path, %description, "Resource already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Guid of the registered service matching the offering id
    async fn find_service_guid(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
    ) -> Result<Option<String>> {
        let services: Vec<Resource<ServiceEntity>> = self.list_all(ctx, "/v2/services").await?;
        Ok(services
            .into_iter()
            .find(|service| service.entity.unique_id == offering_id)
            .map(|service| service.metadata.guid))
    }

    async fn plans_of_offering(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
    ) -> Result<Vec<Resource<PlanEntity>>> {
        match self.find_service_guid(ctx, offering_id).await? {
            Some(service_guid) => {
                self.list_all(ctx, &format!("/v2/services/{}/service_plans", service_guid))
                    .await
            }
            None => {
                tracing::debug!(offering_id, "Service offering is not registered");
                Ok(Vec::new())
            }
        }
    }

    async fn instances_of_plan(
        &self,
        ctx: &RequestContext,
        plan_guid: &str,
    ) -> Result<Vec<Resource<serde_json::Value>>> {
        self.list_all(
            ctx,
            &format!("/v2/service_plans/{}/service_instances", plan_guid),
        )
        .await
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn api_version(&self, ctx: &RequestContext) -> Result<String> {
        let info: InfoEntity = self.get_json(ctx, "/v2/info").await?;
        Ok(info.api_version)
    }

    async fn broker_guid(&self, ctx: &RequestContext, broker_name: &str) -> Result<String> {
        let brokers: Vec<Resource<BrokerEntity>> =
            self.list_all(ctx, "/v2/service_brokers").await?;
        brokers
            .into_iter()
            .find(|broker| broker.entity.name == broker_name)
            .map(|broker| broker.metadata.guid)
            .ok_or_else(|| RegistryError::BrokerNotFound(broker_name.to_string()))
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn count_instances_of_service_offering(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
    ) -> Result<HashMap<String, usize>> {
        let mut counts = HashMap::new();
        for plan in self.plans_of_offering(ctx, offering_id).await? {
            let instances = self.instances_of_plan(ctx, &plan.metadata.guid).await?;
            counts.insert(plan.entity.unique_id, instances.len());
        }
        Ok(counts)
    }

    async fn count_instances_of_plan(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
        plan_id: &str,
    ) -> Result<usize> {
        let plan = self
            .plans_of_offering(ctx, offering_id)
            .await?
            .into_iter()
            .find(|plan| plan.entity.unique_id == plan_id)
            .ok_or_else(|| RegistryError::PlanNotFound(plan_id.to_string()))?;

        Ok(self.instances_of_plan(ctx, &plan.metadata.guid).await?.len())
    }

    async fn get_instance(&self, ctx: &RequestContext, instance_id: &str) -> Result<Instance> {
        let resource: Resource<InstanceEntity> = self
            .get_json(ctx, &format!("/v2/service_instances/{}", instance_id))
            .await?;

        Ok(Instance {
            guid: resource.metadata.guid,
            service_plan_url: resource.entity.service_plan_url,
            last_operation: resource.entity.last_operation,
        })
    }

    async fn get_instance_state(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<InstanceState> {
        let instance = self.get_instance(ctx, instance_id).await?;
        let plan: Resource<PlanEntity> = self.get_json(ctx, &instance.service_plan_url).await?;

        let operation_in_progress = instance
            .last_operation
            .is_some_and(|operation| operation.state == OperationState::InProgress);

        Ok(InstanceState {
            plan_id: plan.entity.unique_id,
            operation_in_progress,
        })
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn get_instances_of_service_offering(
        &self,
        ctx: &RequestContext,
        offering_id: &str,
    ) -> Result<Vec<InstanceRef>> {
        let mut instances = Vec::new();
        for plan in self.plans_of_offering(ctx, offering_id).await? {
            for instance in self.instances_of_plan(ctx, &plan.metadata.guid).await? {
                instances.push(InstanceRef {
                    guid: instance.metadata.guid,
                    plan_unique_id: plan.entity.unique_id.clone(),
                });
            }
        }
        Ok(instances)
    }

    async fn get_bindings_for_instance(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<Vec<Binding>> {
        let bindings: Vec<Resource<BindingEntity>> = self
            .list_all(
                ctx,
                &format!("/v2/service_instances/{}/service_bindings", instance_id),
            )
            .await?;

        Ok(bindings
            .into_iter()
            .map(|binding| Binding {
                guid: binding.metadata.guid,
                app_guid: binding.entity.app_guid,
            })
            .collect())
    }

    async fn get_service_keys_for_instance(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
    ) -> Result<Vec<ServiceKey>> {
        let keys: Vec<Resource<serde_json::Value>> = self
            .list_all(
                ctx,
                &format!("/v2/service_instances/{}/service_keys", instance_id),
            )
            .await?;

        Ok(keys
            .into_iter()
            .map(|key| ServiceKey {
                guid: key.metadata.guid,
            })
            .collect())
    }

    async fn delete_binding(&self, ctx: &RequestContext, binding: &Binding) -> Result<()> {
        tracing::info!(binding_guid = %binding.guid, app_guid = %binding.app_guid, "Deleting service binding");
        self.delete(ctx, &format!("/v2/service_bindings/{}", binding.guid))
            .await
    }

    async fn delete_service_key(&self, ctx: &RequestContext, key: &ServiceKey) -> Result<()> {
        tracing::info!(service_key_guid = %key.guid, "Deleting service key");
        self.delete(ctx, &format!("/v2/service_keys/{}", key.guid))
            .await
    }

    async fn delete_service_instance(&self, ctx: &RequestContext, instance_id: &str) -> Result<()> {
        tracing::info!(instance_id, "Deleting service instance");
        self.delete(
            ctx,
            &format!("/v2/service_instances/{}?accepts_incomplete=true", instance_id),
        )
        .await
    }

    async fn disable_service_access(&self, ctx: &RequestContext, offering_id: &str) -> Result<()> {
        let body = serde_json::json!({ "public": false });
        for plan in self.plans_of_offering(ctx, offering_id).await? {
            let path = format!("/v2/service_plans/{}", plan.metadata.guid);
            tracing::info!(plan_id = %plan.entity.unique_id, "Disabling service access");
            let response = self.send(ctx, Method::PUT, &path, Some(&body)).await?;
            Self::read_body(&path, response).await?;
        }
        Ok(())
    }

    async fn deregister_broker(&self, ctx: &RequestContext, broker_guid: &str) -> Result<()> {
        let path = format!("/v2/service_brokers/{}", broker_guid);
        let response = self.send(ctx, Method::DELETE, &path, None).await?;
        Self::read_body(&path, response).await?;
        Ok(())
    }
}
