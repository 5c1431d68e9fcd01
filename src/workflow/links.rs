use std::sync::Arc;

use crate::metrics::Metrics;

use super::client::WorkflowClient;
use super::errors::WorkflowError;
use super::observed;

/// Prefix every message subscription name in the order model carries.
pub const MESSAGE_PREFIX: &str = "Message_";

// ============================================================================
// Affordance Discovery
// ============================================================================
//
// "What can happen next" is read from the instance's pending message
// subscriptions. The process model names its messages
//
//     Message_<ResourceType>_<LinkName>
//
// and the trailing <LinkName> is what callers get to see as an available
// link for that resource type.
//
// ============================================================================

/// A message subscription name split according to the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionName {
    pub resource_type: String,
    pub link_name: String,
}

impl SubscriptionName {
    /// Split `name` into resource type and link name.
    ///
    /// The link name is everything after the last `_`. A name with a single
    /// token after the prefix (`Message_PAYMENT`) uses that token for both.
    pub fn parse(name: &str) -> Result<Self, WorkflowError> {
        let malformed = || WorkflowError::MalformedSubscription(name.to_string());

        let rest = name.strip_prefix(MESSAGE_PREFIX).ok_or_else(malformed)?;
        if rest.is_empty() {
            return Err(malformed());
        }

        let (resource_type, link_name) = match rest.rfind('_') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, rest),
        };

        if resource_type.is_empty() || link_name.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            resource_type: resource_type.to_string(),
            link_name: link_name.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct AffordanceDiscovery {
    client: Arc<dyn WorkflowClient>,
    metrics: Option<Arc<Metrics>>,
}

impl AffordanceDiscovery {
    pub fn new(client: Arc<dyn WorkflowClient>) -> Self {
        Self { client, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Link names currently available for `resource_type`.
    ///
    /// The result follows the engine's subscription listing order and is not
    /// sorted. An empty vector means nothing is possible right now.
    pub async fn available_links(
        &self,
        business_key: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, WorkflowError> {
        let metrics = self.metrics.as_deref();

        let instance_id = observed(
            metrics,
            "find_instance_by_business_key",
            self.client.find_instance_by_business_key(business_key),
        )
        .await?;

        let subscriptions = observed(
            metrics,
            "pending_message_subscriptions",
            self.client.pending_message_subscriptions(&instance_id),
        )
        .await
        .map_err(|e| e.for_business_key(business_key))?;

        let links = links_for_resource_type(
            subscriptions.iter().map(|s| s.event_name.as_str()),
            resource_type,
        )?;

        tracing::debug!(
            business_key = %business_key,
            resource_type = %resource_type,
            links = ?links,
            "Discovered available links"
        );

        Ok(links)
    }
}

/// Filter subscription names by `Message_<resource_type>` and extract link names.
pub fn links_for_resource_type<'a>(
    names: impl IntoIterator<Item = &'a str>,
    resource_type: &str,
) -> Result<Vec<String>, WorkflowError> {
    let prefix = format!("{MESSAGE_PREFIX}{resource_type}");

    names
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .map(|name| SubscriptionName::parse(name).map(|parsed| parsed.link_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::memory::{InMemoryWorkflowEngine, ProcessDefinition, WaitState};
    use crate::workflow::types::{ActivityInstance, EventSubscription, ProcessInstanceId};

    #[test]
    fn test_parse_table() {
        let cases = [
            ("Message_Payment_Settle", "Payment", "Settle"),
            ("Message_Payment_Pay", "Payment", "Pay"),
            ("Message_Order_Cancel", "Order", "Cancel"),
            ("Message_START_PREPARATION", "START", "PREPARATION"),
            ("Message_PAYMENT", "PAYMENT", "PAYMENT"),
            ("Message_Order_Item_Remove", "Order_Item", "Remove"),
        ];

        for (name, resource_type, link_name) in cases {
            let parsed = SubscriptionName::parse(name).unwrap();
            assert_eq!(parsed.resource_type, resource_type, "resource type of {name}");
            assert_eq!(parsed.link_name, link_name, "link name of {name}");
        }
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for name in ["Payment_Settle", "Message_", "Message_Payment_", "Message__Settle", "", "Message"] {
            let result = SubscriptionName::parse(name);
            assert!(
                matches!(result, Err(WorkflowError::MalformedSubscription(ref n)) if n == name),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_links_keep_listing_order() {
        let names = ["Message_Payment_Settle", "Message_Order_Cancel", "Message_Payment_Refund"];

        let links = links_for_resource_type(names, "Payment").unwrap();
        assert_eq!(links, vec!["Settle".to_string(), "Refund".to_string()]);
    }

    #[test]
    fn test_no_matching_subscription_is_empty() {
        let links = links_for_resource_type(["Message_Order_Cancel"], "Payment").unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_matching_but_malformed_name_is_an_error() {
        let result = links_for_resource_type(["Message_Payment_"], "Payment");
        assert!(matches!(result, Err(WorkflowError::MalformedSubscription(_))));
    }

    #[tokio::test]
    async fn test_available_links_from_engine() {
        let definition = ProcessDefinition::new("order")
            .step(WaitState::new("Payment expected").on("Message_Payment_Settle").on("Message_Order_Cancel"))
            .step(WaitState::new("Paid"));
        let engine = Arc::new(InMemoryWorkflowEngine::with_definition(definition));
        engine.start_instance("order", "order-1").await.unwrap();

        let discovery = AffordanceDiscovery::new(engine);
        assert_eq!(discovery.available_links("order-1", "Payment").await.unwrap(), vec!["Settle"]);
        assert_eq!(discovery.available_links("order-1", "Order").await.unwrap(), vec!["Cancel"]);
        assert!(discovery.available_links("order-1", "Receipt").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_available_links_unknown_order() {
        let engine = Arc::new(InMemoryWorkflowEngine::with_definition(ProcessDefinition::order()));
        let discovery = AffordanceDiscovery::new(engine);

        let result = discovery.available_links("missing", "Payment").await;
        assert!(matches!(result, Err(WorkflowError::NotFound { .. })));
    }

    /// Engine stub whose instance ends right after it has been looked up.
    struct EndingInstanceClient;

    #[async_trait::async_trait]
    impl WorkflowClient for EndingInstanceClient {
        async fn start_instance(&self, _: &str, _: &str) -> Result<ProcessInstanceId, WorkflowError> {
            Ok(ProcessInstanceId::new("pi-1"))
        }

        async fn correlate_message(&self, _: &str, _: &str) -> Result<(), WorkflowError> {
            Ok(())
        }

        async fn find_instance_by_business_key(&self, _: &str) -> Result<ProcessInstanceId, WorkflowError> {
            Ok(ProcessInstanceId::new("pi-1"))
        }

        async fn activity_tree(&self, id: &ProcessInstanceId) -> Result<ActivityInstance, WorkflowError> {
            Err(WorkflowError::InstanceNotFound { instance_id: id.to_string() })
        }

        async fn pending_message_subscriptions(
            &self,
            id: &ProcessInstanceId,
        ) -> Result<Vec<EventSubscription>, WorkflowError> {
            Err(WorkflowError::InstanceNotFound { instance_id: id.to_string() })
        }
    }

    #[tokio::test]
    async fn test_instance_ending_mid_query_is_not_found() {
        let discovery = AffordanceDiscovery::new(Arc::new(EndingInstanceClient));

        let err = discovery.available_links("order-1", "Payment").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { ref business_key } if business_key == "order-1"));
        assert!(!err.is_transient());
    }
}
