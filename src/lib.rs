//! # Restbucks Workflow
//!
//! Orders whose lifecycle is driven by an external workflow engine.
//!
//! This crate provides:
//! - The `Order` aggregate (line items, location, price) without a status field
//! - A correlation bridge from order ids to process instances
//! - Status projection from the engine's active activity
//! - Link discovery from pending message subscriptions
//! - An in-memory engine and a Camunda REST adapter behind one port

pub mod config;
pub mod domain;
pub mod events;
pub mod messaging;
pub mod metrics;
pub mod workflow;

pub use config::{Config, EngineKind};
pub use domain::order::{
    LineItem, Location, MonetaryAmount, Order, OrderCommand, OrderCommandHandler, OrderError, OrderId,
};
pub use workflow::{WorkflowClient, WorkflowError, WorkflowServices};
