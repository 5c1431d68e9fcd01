// ============================================================================
// Workflow Bridge - order lifecycle delegated to an external engine
// ============================================================================
//
// This module contains everything that talks to the workflow engine:
// - client:  the port the engine is consumed through
// - bridge:  business key -> process instance correlation
// - status:  status projection from the active activity
// - links:   affordance discovery from pending message subscriptions
// - memory:  in-process engine stub
// - rest:    Camunda REST adapter
//
// Nothing here knows about orders beyond their business key.
//
// ============================================================================

pub mod bridge;
pub mod client;
pub mod errors;
pub mod links;
pub mod memory;
pub mod rest;
pub mod status;
pub mod types;

pub use bridge::{CorrelationBridge, DEFAULT_PROCESS_KEY};
pub use client::WorkflowClient;
pub use errors::WorkflowError;
pub use links::{links_for_resource_type, AffordanceDiscovery, SubscriptionName};
pub use memory::{InMemoryWorkflowEngine, ProcessDefinition, WaitState};
pub use rest::CamundaRestClient;
pub use status::{single_active_activity, StatusProjector};
pub use types::{ActivityInstance, EventSubscription, ProcessInstanceId};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::Metrics;

/// Await one engine call, recording its latency and outcome when metrics are on.
pub(crate) async fn observed<T, F>(
    metrics: Option<&Metrics>,
    operation: &'static str,
    call: F,
) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, WorkflowError>>,
{
    let started = Instant::now();
    let result = call.await;

    if let Some(metrics) = metrics {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics.record_engine_call(operation, started.elapsed().as_secs_f64(), outcome);
    }

    result
}

/// The three engine-facing collaborators, built over one shared client.
#[derive(Clone)]
pub struct WorkflowServices {
    pub bridge: CorrelationBridge,
    pub status: StatusProjector,
    pub links: AffordanceDiscovery,
}

impl WorkflowServices {
    pub fn new(client: Arc<dyn WorkflowClient>) -> Self {
        Self {
            bridge: CorrelationBridge::new(client.clone()),
            status: StatusProjector::new(client.clone()),
            links: AffordanceDiscovery::new(client),
        }
    }

    pub fn with_process_key(mut self, process_key: impl Into<String>) -> Self {
        self.bridge = self.bridge.with_process_key(process_key);
        self
    }

    pub fn with_metrics(self, metrics: Arc<Metrics>) -> Self {
        Self {
            bridge: self.bridge.with_metrics(metrics.clone()),
            status: self.status.with_metrics(metrics.clone()),
            links: self.links.with_metrics(metrics),
        }
    }
}
