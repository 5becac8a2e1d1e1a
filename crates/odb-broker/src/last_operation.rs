//! Last-operation polling and errand sequencing
//!
//! A token with a context id is resolved through every task run under that
//! id; the most recent one decides the state. When that is the only task
//! and it finished, the next step of the operation is submitted here:
//!
//! ```text
//! deploy ──done──▶ post-deploy errand ──done──▶ succeeded
//! pre-delete errand ──done──▶ delete deployment ──done──▶ succeeded
//! ```

use crate::broker::{Broker, deployment_name, scoped};
use crate::error::{BrokerError, Result};
use crate::operation::{LastOperation, OperationState, OperationToken};
use odb_core::{DisplayableError, RequestContext};
use odb_director::{Task, latest};

impl Broker {
    pub async fn last_operation(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        token: &OperationToken,
    ) -> Result<LastOperation> {
        let ctx = &scoped(ctx, instance_id, token.operation_type);
        let deployment = deployment_name(instance_id);

        let (task, tasks_in_context) = match &token.context_id {
            Some(context_id) => {
                let tasks = self
                    .director
                    .tasks_for_context(ctx, &deployment, context_id)
                    .await?;
                let task = latest(&tasks).cloned().ok_or_else(|| {
                    BrokerError::generic(
                        ctx,
                        format!("no tasks found for context id {}", context_id),
                    )
                })?;
                (task, tasks.len())
            }
            None => (self.director.poll_task(ctx, token.task_id).await?, 1),
        };

        match OperationState::from(task.state) {
            OperationState::InProgress => Ok(LastOperation::in_progress(token.operation_type)),
            OperationState::Failed => Ok(self.failed(ctx, instance_id, &task)),
            OperationState::Succeeded if tasks_in_context == 1 => {
                self.next_step(ctx, instance_id, &deployment, token).await
            }
            OperationState::Succeeded => Ok(LastOperation::succeeded(token.operation_type)),
        }
    }

    /// Submit the follow-up task of a two-step operation, if any
    async fn next_step(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        deployment: &str,
        token: &OperationToken,
    ) -> Result<LastOperation> {
        let context_id = token.context_id.as_deref();

        if let Some(errand) = token.post_deploy_errand.as_deref()
            && context_id.is_some()
        {
            let task_id = self
                .director
                .run_errand(ctx, deployment, errand, context_id)
                .await?;
            tracing::info!(instance_id, errand, %task_id, "Running post-deploy errand");
            return Ok(LastOperation::in_progress(token.operation_type));
        }

        if token.pre_delete_errand.is_some() && context_id.is_some() {
            let task_id = self
                .director
                .delete_deployment(ctx, deployment, context_id)
                .await?;
            tracing::info!(instance_id, %task_id, "Pre-delete errand finished, deleting deployment");
            return Ok(LastOperation::in_progress(token.operation_type));
        }

        Ok(LastOperation::succeeded(token.operation_type))
    }

    fn failed(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        task: &Task,
    ) -> LastOperation {
        let task_ctx = ctx.clone().with_task_id(task.id.0);
        let err = DisplayableError::generic(
            &task_ctx,
            format!(
                "task {} {}: {} {}",
                task.id,
                task.state,
                task.description,
                task.result.as_deref().unwrap_or_default()
            ),
        );

        tracing::error!(
            instance_id,
            task_id = %task.id,
            request_id = %ctx.request_id(),
            operation = ctx.operation().unwrap_or_default(),
            error = err.operator_message(),
            "Operation failed"
        );
        LastOperation::failed(err.user_message())
    }
}
