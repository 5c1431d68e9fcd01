use crate::workflow::WorkflowError;

// ============================================================================
// Order Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot add {found} to an amount in {expected}")]
    CurrencyMismatch { expected: String, found: String },

    #[error("No workflow engine configured; lifecycle operations are unavailable")]
    WorkflowNotConfigured,

    /// Engine-side failures pass through untouched.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Failed to publish domain event: {0}")]
    EventPublication(String),
}

impl OrderError {
    /// True for an out-of-order lifecycle transition.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderError::Workflow(WorkflowError::NotWaiting { .. }))
    }
}
