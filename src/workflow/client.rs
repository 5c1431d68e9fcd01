use async_trait::async_trait;

use super::errors::WorkflowError;
use super::types::{ActivityInstance, EventSubscription, ProcessInstanceId};

// ============================================================================
// Workflow Client Port
// ============================================================================
//
// The narrow surface this crate consumes from the external workflow engine.
// Implementations:
// - InMemoryWorkflowEngine  (sequential wait-state stub, tests and local runs)
// - CamundaRestClient       (Camunda 7 REST API)
//
// Every call is a single request/response against the engine. Implementations
// must not retry; transient failures surface as WorkflowError::Transport.
//
// ============================================================================

#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start a new instance of `definition_key`, tagged with `business_key`.
    async fn start_instance(
        &self,
        definition_key: &str,
        business_key: &str,
    ) -> Result<ProcessInstanceId, WorkflowError>;

    /// Deliver `message_name` to the instance carrying `business_key`.
    ///
    /// Fails with `NotFound` when no instance exists and `NotWaiting` when the
    /// instance holds no subscription for the message.
    async fn correlate_message(
        &self,
        message_name: &str,
        business_key: &str,
    ) -> Result<(), WorkflowError>;

    async fn find_instance_by_business_key(
        &self,
        business_key: &str,
    ) -> Result<ProcessInstanceId, WorkflowError>;

    /// Root of the activity-instance tree for a running instance.
    async fn activity_tree(
        &self,
        instance_id: &ProcessInstanceId,
    ) -> Result<ActivityInstance, WorkflowError>;

    /// Message-type event subscriptions, in engine listing order.
    async fn pending_message_subscriptions(
        &self,
        instance_id: &ProcessInstanceId,
    ) -> Result<Vec<EventSubscription>, WorkflowError>;
}
