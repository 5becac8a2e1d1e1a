//! Request-scoped context
//!
//! Carries the identifiers that make a failure traceable (request id,
//! instance id, operation, director task id) and the optional deadline that
//! bounds every outbound call made on behalf of the request.

use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    service_name: String,
    instance_id: Option<String>,
    operation: Option<String>,
    task_id: Option<u64>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Create a context with a fresh request id
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            service_name: service_name.into(),
            instance_id: None,
            operation: None,
            task_id: None,
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_task_id(mut self, task_id: u64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn task_id(&self) -> Option<u64> {
        self.task_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when the request is unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_context() {
        let ctx = RequestContext::new("svc");
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = RequestContext::new("svc").with_deadline(Instant::now() - Duration::from_secs(1));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert!(ctx.is_expired());
    }

    #[test]
    fn test_builder_fields() {
        let ctx = RequestContext::new("svc")
            .with_instance_id("i-1")
            .with_operation("provision")
            .with_task_id(7)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(ctx.service_name(), "svc");
        assert_eq!(ctx.instance_id(), Some("i-1"));
        assert_eq!(ctx.operation(), Some("provision"));
        assert_eq!(ctx.task_id(), Some(7));
        assert!(ctx.remaining().is_some_and(|left| left > Duration::from_secs(50)));
    }
}
