use std::sync::Arc;

use crate::metrics::Metrics;

use super::client::WorkflowClient;
use super::errors::WorkflowError;
use super::observed;
use super::types::ActivityInstance;

// ============================================================================
// Status Projector
// ============================================================================
//
// An order's status is never stored. It is read on demand as the name of the
// single activity the order's process instance is currently waiting in.
//
// The order model has no parallel branches, so the root of the activity
// tree must have exactly one child. Anything else means the deployed model
// and this projection disagree; that is reported as ModelInvariantViolation
// and never as "no status".
//
// ============================================================================

#[derive(Clone)]
pub struct StatusProjector {
    client: Arc<dyn WorkflowClient>,
    metrics: Option<Arc<Metrics>>,
}

impl StatusProjector {
    pub fn new(client: Arc<dyn WorkflowClient>) -> Self {
        Self { client, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn status(&self, business_key: &str) -> Result<String, WorkflowError> {
        let metrics = self.metrics.as_deref();

        let instance_id = observed(
            metrics,
            "find_instance_by_business_key",
            self.client.find_instance_by_business_key(business_key),
        )
        .await?;

        // The instance may end between the lookup and the tree query
        let tree = observed(metrics, "activity_tree", self.client.activity_tree(&instance_id))
            .await
            .map_err(|e| e.for_business_key(business_key))?;

        let active = single_active_activity(&tree).map_err(|e| {
            if let Some(metrics) = metrics {
                metrics.record_invariant_violation();
            }
            tracing::error!(
                business_key = %business_key,
                instance_id = %instance_id,
                error = %e,
                "Activity tree does not match the sequential order model"
            );
            e
        })?;

        tracing::debug!(
            business_key = %business_key,
            status = %active.activity_name,
            "Projected order status"
        );

        Ok(active.activity_name.clone())
    }
}

/// The one child under the root, or `ModelInvariantViolation`.
pub fn single_active_activity(root: &ActivityInstance) -> Result<&ActivityInstance, WorkflowError> {
    match root.children.as_slice() {
        [only] => Ok(only),
        children => Err(WorkflowError::ModelInvariantViolation {
            instance_id: root.id.clone(),
            active_children: children.len(),
        }),
    }
}
