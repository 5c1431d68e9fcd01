use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Engine Runtime Types - read-only views of external engine state
// ============================================================================

/// Engine-assigned identifier of a running process instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessInstanceId(pub String);

impl ProcessInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node of the engine's execution-position tree.
///
/// The root represents the process instance itself; its children are the
/// activities the instance is currently waiting in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInstance {
    pub id: String,
    pub activity_id: String,
    pub activity_name: String,
    pub children: Vec<ActivityInstance>,
}

impl ActivityInstance {
    pub fn leaf(id: impl Into<String>, activity_id: impl Into<String>, activity_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            activity_id: activity_id.into(),
            activity_name: activity_name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ActivityInstance) -> Self {
        self.children.push(child);
        self
    }
}

/// Pending "waiting for message" registration on a process instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub event_name: String,
    pub process_instance_id: ProcessInstanceId,
}
