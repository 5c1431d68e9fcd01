use std::sync::Arc;

use crate::metrics::Metrics;

use super::client::WorkflowClient;
use super::errors::WorkflowError;
use super::observed;
use super::types::ProcessInstanceId;

/// Definition key of the order process deployed to the engine.
pub const DEFAULT_PROCESS_KEY: &str = "order";

// ============================================================================
// Correlation Bridge
// ============================================================================
//
// Maps an order's business key onto its process instance:
// - start:     one instance per business key, started exactly once
// - correlate: deliver a lifecycle message to that instance
// - instance:  look up the instance currently carrying the business key
//
// Failures are propagated exactly as the engine reports them. In particular
// NotWaiting (an out-of-order transition) is never swallowed, and nothing is
// retried here. Two concurrent correlations for the same key race at the
// engine; whatever the engine decides is what the caller sees.
//
// ============================================================================

#[derive(Clone)]
pub struct CorrelationBridge {
    client: Arc<dyn WorkflowClient>,
    process_key: String,
    metrics: Option<Arc<Metrics>>,
}

impl CorrelationBridge {
    pub fn new(client: Arc<dyn WorkflowClient>) -> Self {
        Self {
            client,
            process_key: DEFAULT_PROCESS_KEY.to_string(),
            metrics: None,
        }
    }

    pub fn with_process_key(mut self, process_key: impl Into<String>) -> Self {
        self.process_key = process_key.into();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start the order process for `business_key`.
    ///
    /// Calling this twice for one key is a caller error; the engine decides
    /// whether the duplicate is rejected.
    pub async fn start(&self, business_key: &str) -> Result<ProcessInstanceId, WorkflowError> {
        let instance_id = observed(
            self.metrics.as_deref(),
            "start_instance",
            self.client.start_instance(&self.process_key, business_key),
        )
        .await?;

        tracing::info!(
            business_key = %business_key,
            process_key = %self.process_key,
            instance_id = %instance_id,
            "Started order process instance"
        );

        Ok(instance_id)
    }

    pub async fn instance(&self, business_key: &str) -> Result<ProcessInstanceId, WorkflowError> {
        observed(
            self.metrics.as_deref(),
            "find_instance_by_business_key",
            self.client.find_instance_by_business_key(business_key),
        )
        .await
    }

    /// Deliver `message_name` to the instance for `business_key`.
    pub async fn correlate(&self, business_key: &str, message_name: &str) -> Result<(), WorkflowError> {
        let result = observed(
            self.metrics.as_deref(),
            "correlate_message",
            self.client.correlate_message(message_name, business_key),
        )
        .await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(()) => "ok",
                Err(e) => e.kind(),
            };
            metrics.record_correlation(message_name, outcome);
        }

        match &result {
            Ok(()) => tracing::info!(
                business_key = %business_key,
                message_name = %message_name,
                "Correlated lifecycle message"
            ),
            Err(WorkflowError::NotWaiting { .. }) => tracing::warn!(
                business_key = %business_key,
                message_name = %message_name,
                "Rejected out-of-order transition"
            ),
            Err(e) => tracing::error!(
                business_key = %business_key,
                message_name = %message_name,
                error = %e,
                "Failed to correlate lifecycle message"
            ),
        }

        result
    }
}
