use std::sync::Arc;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use restbucks_workflow::config::{Config, EngineKind};
use restbucks_workflow::domain::order::{LineItem, Location, MonetaryAmount, Order, OrderCommand, OrderCommandHandler};
use restbucks_workflow::messaging::LoggingPublisher;
use restbucks_workflow::metrics::Metrics;
use restbucks_workflow::workflow::{
    CamundaRestClient, InMemoryWorkflowEngine, ProcessDefinition, WorkflowClient, WorkflowServices,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,restbucks_workflow=debug"))
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(engine = ?config.engine, process_key = %config.process_key, "Starting Restbucks order workflow demo");

    // === 1. Workflow engine ===
    let client: Arc<dyn WorkflowClient> = match config.engine {
        EngineKind::Memory => {
            let definition = ProcessDefinition {
                key: config.process_key.clone(),
                ..ProcessDefinition::order()
            };
            Arc::new(InMemoryWorkflowEngine::with_definition(definition))
        }
        EngineKind::Rest => {
            tracing::info!(url = %config.engine_url, "Connecting to Camunda REST API");
            Arc::new(CamundaRestClient::new(&config.engine_url, config.request_timeout())?)
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 3. Command handler ===
    let workflow = WorkflowServices::new(client)
        .with_process_key(config.process_key.clone())
        .with_metrics(metrics.clone());
    let handler = OrderCommandHandler::new(Some(workflow), Arc::new(LoggingPublisher))
        .with_metrics(metrics.clone());

    // === 4. Demonstrate full order lifecycle ===
    let mut order = handler
        .create(
            vec![
                LineItem::new("Latte", 1, MonetaryAmount::new(Decimal::new(250, 2), "EUR")),
                LineItem::new("Cookie", 1, MonetaryAmount::new(Decimal::new(120, 2), "EUR")),
            ],
            Some(Location::InStore),
        )
        .await?;

    tracing::info!(order_id = %order.id(), price = %order.price()?, "✅ Order created");
    report(&handler, &order).await?;

    // Taking an unpaid order must be refused by the engine
    match handler.mark_taken(&mut order).await {
        Err(e) if e.is_conflict() => tracing::info!(error = %e, "Out-of-order transition refused as expected"),
        Err(e) => return Err(e.into()),
        Ok(_) => anyhow::bail!("Engine accepted Message_TAKEN for an unpaid order"),
    }

    for command in [
        OrderCommand::MarkPaid,
        OrderCommand::MarkInPreparation,
        OrderCommand::MarkPrepared,
        OrderCommand::MarkTaken,
    ] {
        handler.handle(&mut order, command).await?;
        report(&handler, &order).await?;
    }

    tracing::info!(metric_families = metrics.registry().gather().len(), "🎉 Demo complete!");

    Ok(())
}

async fn report(handler: &OrderCommandHandler, order: &Order) -> anyhow::Result<()> {
    let status = handler.status(order).await?;
    let links = handler.available_links(order, "").await?;

    tracing::info!(
        order_id = %order.id(),
        status = %status,
        pending_messages = ?links,
        "Order state"
    );

    Ok(())
}
