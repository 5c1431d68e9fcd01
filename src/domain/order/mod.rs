// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderId, Location, MonetaryAmount, LineItem)
// - Events (OrderPaid)
// - Commands (MarkPaid, MarkInPreparation, MarkPrepared, MarkTaken)
// - Errors (OrderError enum)
// - Aggregate (Order)
// - Command Handler (OrderCommandHandler)
//
// Lifecycle state is not part of this module; it lives in the workflow
// engine and is reached through crate::workflow.
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
