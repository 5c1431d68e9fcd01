use std::sync::Arc;
use uuid::Uuid;

use crate::events::{serialize_event, EventEnvelope};
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::workflow::{ProcessInstanceId, WorkflowServices};

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::value_objects::{LineItem, Location};

/// Topic order events are published to.
pub const ORDER_EVENTS_TOPIC: &str = "order-events";

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Aggregate → Workflow Engine → Event Publisher
//
// create:    build the order, then start its process instance
// command:   correlate the lifecycle message, then raise and publish the
//            aggregate's domain events
// status:    project the active activity
// links:     discover affordances from pending message subscriptions
// instance:  the process instance currently carrying the order
//
// The workflow engine is optional. Without one, orders can still be created
// (no instance is started), but lifecycle commands and queries fail with
// WorkflowNotConfigured.
//
// ============================================================================

pub struct OrderCommandHandler {
    workflow: Option<WorkflowServices>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<Metrics>>,
}

impl OrderCommandHandler {
    pub fn new(workflow: Option<WorkflowServices>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { workflow, publisher, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn workflow(&self) -> Result<&WorkflowServices, OrderError> {
        self.workflow.as_ref().ok_or(OrderError::WorkflowNotConfigured)
    }

    /// Build an order and register it with the workflow engine, if any.
    pub async fn create(&self, line_items: Vec<LineItem>, location: Option<Location>) -> Result<Order, OrderError> {
        let order = Order::new(line_items, location);

        tracing::info!(
            order_id = %order.id(),
            location = ?order.location(),
            item_count = order.line_items().len(),
            "Creating new order"
        );

        match &self.workflow {
            Some(workflow) => {
                workflow.bridge.start(&order.business_key()).await?;
            }
            None => {
                tracing::debug!(
                    order_id = %order.id(),
                    "No workflow engine configured, skipping process start"
                );
            }
        }

        Ok(order)
    }

    /// Run one lifecycle command against `order`.
    ///
    /// The message is correlated first. Only when the engine accepts it are
    /// the aggregate's events raised and published, so a rejected transition
    /// publishes nothing. A publication failure after a successful
    /// correlation is reported as EventPublication; the engine has already
    /// moved on, and the unpublished events stay pending on the order for
    /// `publish_pending`.
    pub async fn handle<'a>(&self, order: &'a mut Order, command: OrderCommand) -> Result<&'a mut Order, OrderError> {
        let workflow = self.workflow()?;

        tracing::debug!(
            order_id = %order.id(),
            command = command.name(),
            "Handling order command"
        );

        workflow
            .bridge
            .correlate(&order.business_key(), command.message_name())
            .await?;

        order.apply(&command);
        self.publish_pending(order).await?;

        Ok(order)
    }

    pub async fn mark_paid<'a>(&self, order: &'a mut Order) -> Result<&'a mut Order, OrderError> {
        self.handle(order, OrderCommand::MarkPaid).await
    }

    pub async fn mark_in_preparation<'a>(&self, order: &'a mut Order) -> Result<&'a mut Order, OrderError> {
        self.handle(order, OrderCommand::MarkInPreparation).await
    }

    pub async fn mark_prepared<'a>(&self, order: &'a mut Order) -> Result<&'a mut Order, OrderError> {
        self.handle(order, OrderCommand::MarkPrepared).await
    }

    pub async fn mark_taken<'a>(&self, order: &'a mut Order) -> Result<&'a mut Order, OrderError> {
        self.handle(order, OrderCommand::MarkTaken).await
    }

    /// Current status: the name of the activity the order's process waits in.
    pub async fn status(&self, order: &Order) -> Result<String, OrderError> {
        Ok(self.workflow()?.status.status(&order.business_key()).await?)
    }

    pub async fn process_instance_id(&self, order: &Order) -> Result<ProcessInstanceId, OrderError> {
        Ok(self.workflow()?.bridge.instance(&order.business_key()).await?)
    }

    /// Link names currently available for `resource_type`, in engine order.
    pub async fn available_links(&self, order: &Order, resource_type: &str) -> Result<Vec<String>, OrderError> {
        Ok(self
            .workflow()?
            .links
            .available_links(&order.business_key(), resource_type)
            .await?)
    }

    /// Publish the order's pending events, oldest first.
    ///
    /// An event leaves the order only after the publisher accepted it, so a
    /// failed call can be repeated without losing or duplicating events.
    pub async fn publish_pending(&self, order: &mut Order) -> Result<(), OrderError> {
        if order.pending_events().is_empty() {
            return Ok(());
        }

        let correlation_id = Uuid::new_v4();
        let key = order.id().to_string();

        while let Some(event) = order.pending_events().first().cloned() {
            let envelope = EventEnvelope::new(order.id().as_uuid(), event, correlation_id);
            let payload = serialize_event(&envelope).map_err(|e| OrderError::EventPublication(e.to_string()))?;

            if let Err(e) = self.publisher.publish(ORDER_EVENTS_TOPIC, &key, &payload).await {
                tracing::error!(
                    order_id = %order.id(),
                    event_type = %envelope.event_type,
                    pending = order.pending_events().len(),
                    error = %e,
                    "Failed to publish order event"
                );
                return Err(OrderError::EventPublication(e.to_string()));
            }
            order.mark_oldest_published();

            if let Some(metrics) = &self.metrics {
                metrics.record_event_published(&envelope.event_type);
            }

            tracing::info!(
                order_id = %order.id(),
                event_type = %envelope.event_type,
                event_id = %envelope.event_id,
                "Published order event"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryPublisher;
    use crate::workflow::{
        ActivityInstance, EventSubscription, InMemoryWorkflowEngine, ProcessDefinition, WaitState, WorkflowClient,
        WorkflowError,
    };
    use super::super::value_objects::MonetaryAmount;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine stub: every instance exists and shows `active_children`
    /// activities, unless the engine is unreachable. Counts engine calls.
    struct StubEngine {
        reachable: bool,
        active_children: usize,
        calls: AtomicUsize,
    }

    impl StubEngine {
        fn unreachable() -> Self {
            Self { reachable: false, active_children: 1, calls: AtomicUsize::new(0) }
        }

        fn with_active_children(active_children: usize) -> Self {
            Self { reachable: true, active_children, calls: AtomicUsize::new(0) }
        }

        fn answer<T>(&self, value: T) -> Result<T, WorkflowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reachable {
                Ok(value)
            } else {
                Err(WorkflowError::Transport("connection refused".to_string()))
            }
        }
    }

    #[async_trait]
    impl WorkflowClient for StubEngine {
        async fn start_instance(&self, _: &str, _: &str) -> Result<ProcessInstanceId, WorkflowError> {
            self.answer(ProcessInstanceId::new("pi-1"))
        }

        async fn correlate_message(&self, _: &str, _: &str) -> Result<(), WorkflowError> {
            self.answer(())
        }

        async fn find_instance_by_business_key(&self, _: &str) -> Result<ProcessInstanceId, WorkflowError> {
            self.answer(ProcessInstanceId::new("pi-1"))
        }

        async fn activity_tree(&self, _: &ProcessInstanceId) -> Result<ActivityInstance, WorkflowError> {
            let tree = (0..self.active_children).fold(ActivityInstance::leaf("pi-1", "order", "Order"), |tree, i| {
                tree.with_child(ActivityInstance::leaf(format!("ai-{i}"), "Task", format!("Task {i}")))
            });
            self.answer(tree)
        }

        async fn pending_message_subscriptions(
            &self,
            _: &ProcessInstanceId,
        ) -> Result<Vec<EventSubscription>, WorkflowError> {
            self.answer(Vec::new())
        }
    }

    /// Publisher that refuses the first `failures` records.
    struct FlakyPublisher {
        failures: AtomicUsize,
        inner: InMemoryPublisher,
    }

    impl FlakyPublisher {
        fn failing(failures: usize) -> Self {
            Self { failures: AtomicUsize::new(failures), inner: InMemoryPublisher::new() }
        }
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, topic: &str, key: &str, payload: &str) -> anyhow::Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                anyhow::bail!("broker down");
            }
            self.inner.publish(topic, key, payload).await
        }
    }

    fn stub_handler(engine: Arc<StubEngine>) -> (OrderCommandHandler, Arc<InMemoryPublisher>) {
        let publisher = Arc::new(InMemoryPublisher::new());
        let handler = OrderCommandHandler::new(Some(WorkflowServices::new(engine)), publisher.clone());
        (handler, publisher)
    }

    struct Fixture {
        handler: OrderCommandHandler,
        engine: Arc<InMemoryWorkflowEngine>,
        publisher: Arc<InMemoryPublisher>,
    }

    fn fixture_with(definition: ProcessDefinition) -> Fixture {
        let engine = Arc::new(InMemoryWorkflowEngine::with_definition(definition));
        let publisher = Arc::new(InMemoryPublisher::new());
        let handler = OrderCommandHandler::new(
            Some(WorkflowServices::new(engine.clone())),
            publisher.clone(),
        );
        Fixture { handler, engine, publisher }
    }

    fn fixture() -> Fixture {
        fixture_with(ProcessDefinition::order())
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("Latte", 1, MonetaryAmount::new(Decimal::new(250, 2), "EUR")),
            LineItem::new("Cookie", 1, MonetaryAmount::new(Decimal::new(120, 2), "EUR")),
        ]
    }

    #[tokio::test]
    async fn test_create_starts_process_instance() {
        let f = fixture();
        let order = f.handler.create(items(), None).await.unwrap();

        assert!(f.engine.find_instance_by_business_key(&order.business_key()).await.is_ok());
        assert_eq!(f.handler.status(&order).await.unwrap(), "Payment expected");
    }

    #[tokio::test]
    async fn test_create_without_engine_still_succeeds() {
        let handler = OrderCommandHandler::new(None, Arc::new(InMemoryPublisher::new()));

        let order = handler.create(items(), Some(Location::InStore)).await.unwrap();
        assert_eq!(order.location(), Location::InStore);

        let result = handler.status(&order).await;
        assert!(matches!(result, Err(OrderError::WorkflowNotConfigured)));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let f = fixture();
        let mut order = f.handler.create(items(), None).await.unwrap();

        let steps = [
            (OrderCommand::MarkPaid, "Paid"),
            (OrderCommand::MarkInPreparation, "Preparing"),
            (OrderCommand::MarkPrepared, "Ready"),
            (OrderCommand::MarkTaken, "Taken"),
        ];

        for (command, expected) in steps {
            f.handler.handle(&mut order, command).await.unwrap();
            assert_eq!(f.handler.status(&order).await.unwrap(), expected, "after {:?}", command);
        }
    }

    #[tokio::test]
    async fn test_chained_commands() {
        let f = fixture();
        let mut order = f.handler.create(items(), None).await.unwrap();

        let order = f.handler.mark_paid(&mut order).await.unwrap();
        let order = f.handler.mark_in_preparation(order).await.unwrap();
        let order = f.handler.mark_prepared(order).await.unwrap();
        assert_eq!(f.handler.status(order).await.unwrap(), "Ready");

        f.handler.mark_taken(order).await.unwrap();
        assert_eq!(f.handler.status(order).await.unwrap(), "Taken");
    }

    #[tokio::test]
    async fn test_out_of_order_transition_is_a_conflict() {
        let f = fixture();
        let mut order = f.handler.create(items(), None).await.unwrap();

        let err = f.handler.mark_taken(&mut order).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(
            err,
            OrderError::Workflow(WorkflowError::NotWaiting { ref message_name, .. }) if message_name == "Message_TAKEN"
        ));

        // Nothing moved
        assert_eq!(f.handler.status(&order).await.unwrap(), "Payment expected");
    }

    #[tokio::test]
    async fn test_each_transition_succeeds_once() {
        let f = fixture();
        let mut order = f.handler.create(items(), None).await.unwrap();

        f.handler.mark_paid(&mut order).await.unwrap();
        let err = f.handler.mark_paid(&mut order).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(f.handler.status(&order).await.unwrap(), "Paid");
    }

    #[tokio::test]
    async fn test_mark_paid_publishes_order_paid() {
        let f = fixture();
        let mut order = f.handler.create(items(), None).await.unwrap();

        f.handler.mark_paid(&mut order).await.unwrap();
        f.handler.mark_in_preparation(&mut order).await.unwrap();

        let records = f.publisher.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, ORDER_EVENTS_TOPIC);
        assert_eq!(records[0].key, order.id().to_string());

        let payload: serde_json::Value = serde_json::from_str(&records[0].payload).unwrap();
        assert_eq!(payload["event_type"], "OrderPaid");
        assert_eq!(payload["event_data"]["data"]["order_id"], order.id().to_string());
        assert!(order.pending_events().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_payment_publishes_nothing() {
        let f = fixture();
        let mut order = f.handler.create(items(), None).await.unwrap();
        f.handler.mark_paid(&mut order).await.unwrap();

        let _ = f.handler.mark_paid(&mut order).await;

        assert_eq!(f.publisher.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_command_for_unregistered_order_is_not_found() {
        let f = fixture();
        let mut order = Order::new(items(), None);

        let err = f.handler.mark_paid(&mut order).await.unwrap_err();
        assert!(matches!(err, OrderError::Workflow(WorkflowError::NotFound { .. })));
        assert!(f.publisher.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_available_links_follow_lifecycle() {
        let definition = ProcessDefinition::new("order")
            .step(WaitState::new("Payment expected").on("Message_PAYMENT").on("Message_Payment_Settle"))
            .step(WaitState::new("Paid").on("Message_START_PREPARATION"))
            .step(WaitState::new("Preparing"));
        let f = fixture_with(definition);
        let mut order = f.handler.create(items(), None).await.unwrap();

        assert_eq!(f.handler.available_links(&order, "Payment").await.unwrap(), vec!["Settle"]);
        assert_eq!(f.handler.available_links(&order, "PAYMENT").await.unwrap(), vec!["PAYMENT"]);

        f.handler.mark_paid(&mut order).await.unwrap();
        assert!(f.handler.available_links(&order, "Payment").await.unwrap().is_empty());
        assert_eq!(
            f.handler.available_links(&order, "START").await.unwrap(),
            vec!["PREPARATION"]
        );
    }

    #[tokio::test]
    async fn test_published_events_are_counted() {
        let engine = Arc::new(InMemoryWorkflowEngine::with_definition(ProcessDefinition::order()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderCommandHandler::new(
            Some(WorkflowServices::new(engine).with_metrics(metrics.clone())),
            Arc::new(InMemoryPublisher::new()),
        )
        .with_metrics(metrics.clone());

        let mut order = handler.create(items(), None).await.unwrap();
        handler.mark_paid(&mut order).await.unwrap();

        assert_eq!(metrics.domain_events_published.with_label_values(&["OrderPaid"]).get(), 1);
        assert_eq!(
            metrics.engine_calls_total.with_label_values(&["start_instance", "ok"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_process_instance_id_of_registered_order() {
        let f = fixture();
        let order = f.handler.create(items(), None).await.unwrap();

        let expected = f.engine.find_instance_by_business_key(&order.business_key()).await.unwrap();
        assert_eq!(f.handler.process_instance_id(&order).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_process_instance_id_of_unregistered_order_is_not_found() {
        let f = fixture();
        let order = Order::new(items(), None);

        let err = f.handler.process_instance_id(&order).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::Workflow(WorkflowError::NotFound { ref business_key }) if *business_key == order.business_key()
        ));

        let without_engine = OrderCommandHandler::new(None, Arc::new(InMemoryPublisher::new()));
        assert!(matches!(
            without_engine.process_instance_id(&order).await,
            Err(OrderError::WorkflowNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_reaches_caller_after_one_attempt() {
        let engine = Arc::new(StubEngine::unreachable());
        let (handler, publisher) = stub_handler(engine.clone());
        let mut order = Order::new(items(), None);

        let err = handler.mark_paid(&mut order).await.unwrap_err();

        assert!(matches!(err, OrderError::Workflow(WorkflowError::Transport(ref msg)) if msg == "connection refused"));
        assert!(!err.is_conflict());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert!(order.pending_events().is_empty());
        assert!(publisher.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_propagates_transport_failure() {
        let engine = Arc::new(StubEngine::unreachable());
        let (handler, _) = stub_handler(engine.clone());
        let order = Order::new(items(), None);

        let err = handler.status(&order).await.unwrap_err();

        assert!(matches!(err, OrderError::Workflow(WorkflowError::Transport(_))));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_propagates_model_invariant_violation() {
        let (handler, _) = stub_handler(Arc::new(StubEngine::with_active_children(2)));
        let order = Order::new(items(), None);

        let err = handler.status(&order).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::Workflow(WorkflowError::ModelInvariantViolation { active_children: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_publication_keeps_event_pending() {
        let engine = Arc::new(InMemoryWorkflowEngine::with_definition(ProcessDefinition::order()));
        let publisher = Arc::new(FlakyPublisher::failing(1));
        let handler = OrderCommandHandler::new(Some(WorkflowServices::new(engine)), publisher.clone());
        let mut order = handler.create(items(), None).await.unwrap();

        let err = handler.mark_paid(&mut order).await.unwrap_err();
        assert!(matches!(err, OrderError::EventPublication(ref msg) if msg == "broker down"));

        // The engine moved on; the event waits on the order
        assert_eq!(handler.status(&order).await.unwrap(), "Paid");
        assert_eq!(order.pending_events().len(), 1);
        assert!(publisher.inner.records().await.is_empty());

        handler.publish_pending(&mut order).await.unwrap();

        let records = publisher.inner.records().await;
        assert_eq!(records.len(), 1);
        let payload: serde_json::Value = serde_json::from_str(&records[0].payload).unwrap();
        assert_eq!(payload["event_type"], "OrderPaid");
        assert!(order.pending_events().is_empty());
    }
}
