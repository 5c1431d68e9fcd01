// ============================================================================
// Workflow Engine Errors
// ============================================================================
//
// Every failure the correlation bridge can observe while talking to the
// external engine. None of these are retried inside the crate.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// No active process instance carries this business key.
    #[error("No process instance found for business key {business_key}")]
    NotFound { business_key: String },

    /// A process instance looked up by id has ended or never existed.
    #[error("Process instance {instance_id} does not exist")]
    InstanceNotFound { instance_id: String },

    /// The instance exists but holds no subscription for the message.
    #[error("Process instance for business key {business_key} is not waiting for message {message_name}")]
    NotWaiting {
        business_key: String,
        message_name: String,
    },

    /// The activity tree does not have exactly one active child under its root.
    #[error("Process instance {instance_id} has {active_children} active activities, expected exactly 1; the status projection no longer matches the process model")]
    ModelInvariantViolation {
        instance_id: String,
        active_children: usize,
    },

    #[error("A process instance with business key {0} already exists")]
    DuplicateBusinessKey(String),

    #[error("Business key {business_key} matches {count} active process instances")]
    AmbiguousBusinessKey { business_key: String, count: usize },

    #[error("Malformed message subscription name: {0}")]
    MalformedSubscription(String),

    /// The engine is unreachable or answered with something we cannot read.
    #[error("Workflow engine transport error: {0}")]
    Transport(String),
}

impl WorkflowError {
    /// Only transport failures are worth retrying, and only for queries.
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowError::Transport(_))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } | WorkflowError::InstanceNotFound { .. } => "not_found",
            WorkflowError::NotWaiting { .. } => "not_waiting",
            WorkflowError::ModelInvariantViolation { .. } => "model_invariant_violation",
            WorkflowError::DuplicateBusinessKey(_) => "duplicate_business_key",
            WorkflowError::AmbiguousBusinessKey { .. } => "ambiguous_business_key",
            WorkflowError::MalformedSubscription(_) => "malformed_subscription",
            WorkflowError::Transport(_) => "transport",
        }
    }

    /// Report an instance that vanished between lookup and query as the
    /// business key no longer being found.
    pub fn for_business_key(self, business_key: &str) -> Self {
        match self {
            WorkflowError::InstanceNotFound { .. } => WorkflowError::NotFound {
                business_key: business_key.to_string(),
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for WorkflowError {
    fn from(err: reqwest::Error) -> Self {
        WorkflowError::Transport(err.to_string())
    }
}
