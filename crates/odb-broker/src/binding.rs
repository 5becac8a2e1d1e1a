//! Synchronous bind and unbind

use crate::broker::{Broker, deployment_name, scoped};
use crate::error::{BrokerError, Result};
use crate::operation::OperationType;
use odb_core::RequestContext;
use odb_director::{Binding, BindingRequest, DirectorError};
use serde_json::Value;
use std::collections::HashMap;

impl Broker {
    pub async fn bind(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        binding_id: &str,
        app_guid: Option<&str>,
        params: HashMap<String, Value>,
    ) -> Result<Binding> {
        let ctx = &scoped(ctx, instance_id, OperationType::Bind);
        let request = BindingRequest {
            app_guid: app_guid.map(str::to_string),
            parameters: params,
        };

        let binding = self
            .director
            .create_binding(ctx, &deployment_name(instance_id), binding_id, &request)
            .await
            .map_err(|e| match e {
                DirectorError::BindingAlreadyExists(_) => {
                    BrokerError::AlreadyExists(binding_id.to_string())
                }
                DirectorError::AppGuidNotProvided => BrokerError::AppGuidMissing,
                DirectorError::NotFound(_) => BrokerError::NotFound(instance_id.to_string()),
                other => BrokerError::Director(other),
            })?;

        tracing::info!(instance_id, binding_id, "Created binding");
        Ok(binding)
    }

    /// Remove a binding; a binding that is already gone counts as removed
    pub async fn unbind(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<()> {
        let ctx = &scoped(ctx, instance_id, OperationType::Unbind);
        match self
            .director
            .delete_binding(ctx, &deployment_name(instance_id), binding_id)
            .await
        {
            Ok(()) => {
                tracing::info!(instance_id, binding_id, "Deleted binding");
                Ok(())
            }
            Err(DirectorError::BindingNotFound(_)) => {
                tracing::info!(instance_id, binding_id, "Binding already deleted");
                Ok(())
            }
            Err(DirectorError::NotFound(_)) => Err(BrokerError::NotFound(instance_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
