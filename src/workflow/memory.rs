use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::client::WorkflowClient;
use super::errors::WorkflowError;
use super::types::{ActivityInstance, EventSubscription, ProcessInstanceId};

// ============================================================================
// In-Memory Workflow Engine
// ============================================================================
//
// A stand-in for the external engine, good enough to exercise the bridge:
// a process definition is a straight line of wait states, each waiting for
// one or more messages. Delivering any of them moves the instance to the
// next wait state; leaving the last one completes the instance, after which
// it is no longer found by business key.
//
// No gateways, no parallel branches, no timers. Business keys are unique
// among running instances.
//
// ============================================================================

/// One wait state of a sequential process definition.
#[derive(Debug, Clone)]
pub struct WaitState {
    pub activity_id: String,
    pub activity_name: String,
    pub messages: Vec<String>,
}

impl WaitState {
    pub fn new(activity_name: impl Into<String>) -> Self {
        let activity_name = activity_name.into();
        Self {
            activity_id: format!("Activity_{}", activity_name.replace(' ', "_")),
            activity_name,
            messages: Vec::new(),
        }
    }

    /// Subscribe to `message_name` while waiting here.
    pub fn on(mut self, message_name: impl Into<String>) -> Self {
        self.messages.push(message_name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProcessDefinition {
    pub key: String,
    pub steps: Vec<WaitState>,
}

impl ProcessDefinition {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), steps: Vec::new() }
    }

    pub fn step(mut self, state: WaitState) -> Self {
        self.steps.push(state);
        self
    }

    /// The order lifecycle: payment expected → paid → preparing → ready → taken.
    pub fn order() -> Self {
        Self::new(super::bridge::DEFAULT_PROCESS_KEY)
            .step(WaitState::new("Payment expected").on("Message_PAYMENT"))
            .step(WaitState::new("Paid").on("Message_START_PREPARATION"))
            .step(WaitState::new("Preparing").on("Message_PREPARED"))
            .step(WaitState::new("Ready").on("Message_TAKEN"))
            .step(WaitState::new("Taken"))
    }
}

struct RunningInstance {
    id: ProcessInstanceId,
    definition_key: String,
    step: usize,
    activity_instance_id: String,
}

#[derive(Default)]
struct EngineState {
    definitions: HashMap<String, ProcessDefinition>,
    // business key -> instance
    instances: HashMap<String, RunningInstance>,
}

#[derive(Default)]
pub struct InMemoryWorkflowEngine {
    state: RwLock<EngineState>,
}

impl InMemoryWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definition(definition: ProcessDefinition) -> Self {
        let mut state = EngineState::default();
        state.definitions.insert(definition.key.clone(), definition);
        Self { state: RwLock::new(state) }
    }

    pub async fn deploy(&self, definition: ProcessDefinition) {
        tracing::debug!(process_key = %definition.key, steps = definition.steps.len(), "Deploying process definition");
        self.state.write().await.definitions.insert(definition.key.clone(), definition);
    }

    pub async fn running_instances(&self) -> usize {
        self.state.read().await.instances.len()
    }

    fn wait_state<'a>(state: &'a EngineState, instance: &RunningInstance) -> Result<&'a WaitState, WorkflowError> {
        state
            .definitions
            .get(&instance.definition_key)
            .and_then(|d| d.steps.get(instance.step))
            .ok_or_else(|| {
                WorkflowError::Transport(format!(
                    "Instance {} points at missing step {} of {}",
                    instance.id, instance.step, instance.definition_key
                ))
            })
    }

    fn instance_by_id<'a>(
        state: &'a EngineState,
        instance_id: &ProcessInstanceId,
    ) -> Result<&'a RunningInstance, WorkflowError> {
        state
            .instances
            .values()
            .find(|i| &i.id == instance_id)
            .ok_or_else(|| WorkflowError::InstanceNotFound { instance_id: instance_id.to_string() })
    }
}

#[async_trait]
impl WorkflowClient for InMemoryWorkflowEngine {
    async fn start_instance(
        &self,
        definition_key: &str,
        business_key: &str,
    ) -> Result<ProcessInstanceId, WorkflowError> {
        let mut state = self.state.write().await;

        let definition = state.definitions.get(definition_key).ok_or_else(|| {
            WorkflowError::Transport(format!("No process definition deployed with key {definition_key}"))
        })?;
        if definition.steps.is_empty() {
            return Err(WorkflowError::Transport(format!(
                "Process definition {definition_key} has no wait states"
            )));
        }
        if state.instances.contains_key(business_key) {
            return Err(WorkflowError::DuplicateBusinessKey(business_key.to_string()));
        }

        let id = ProcessInstanceId::new(Uuid::new_v4().to_string());
        state.instances.insert(
            business_key.to_string(),
            RunningInstance {
                id: id.clone(),
                definition_key: definition_key.to_string(),
                step: 0,
                activity_instance_id: Uuid::new_v4().to_string(),
            },
        );

        Ok(id)
    }

    async fn correlate_message(&self, message_name: &str, business_key: &str) -> Result<(), WorkflowError> {
        let mut state = self.state.write().await;

        let instance = state
            .instances
            .get(business_key)
            .ok_or_else(|| WorkflowError::NotFound { business_key: business_key.to_string() })?;

        let waiting = Self::wait_state(&state, instance)?;
        if !waiting.messages.iter().any(|m| m == message_name) {
            return Err(WorkflowError::NotWaiting {
                business_key: business_key.to_string(),
                message_name: message_name.to_string(),
            });
        }

        let next = instance.step + 1;
        let completes = state
            .definitions
            .get(&instance.definition_key)
            .map_or(true, |d| next >= d.steps.len());

        if completes {
            state.instances.remove(business_key);
            tracing::debug!(business_key = %business_key, "Process instance completed");
        } else if let Some(instance) = state.instances.get_mut(business_key) {
            instance.step = next;
            instance.activity_instance_id = Uuid::new_v4().to_string();
        }

        Ok(())
    }

    async fn find_instance_by_business_key(&self, business_key: &str) -> Result<ProcessInstanceId, WorkflowError> {
        self.state
            .read()
            .await
            .instances
            .get(business_key)
            .map(|i| i.id.clone())
            .ok_or_else(|| WorkflowError::NotFound { business_key: business_key.to_string() })
    }

    async fn activity_tree(&self, instance_id: &ProcessInstanceId) -> Result<ActivityInstance, WorkflowError> {
        let state = self.state.read().await;
        let instance = Self::instance_by_id(&state, instance_id)?;
        let waiting = Self::wait_state(&state, instance)?;

        Ok(
            ActivityInstance::leaf(instance.id.as_str(), &instance.definition_key, &instance.definition_key)
                .with_child(ActivityInstance::leaf(
                    &instance.activity_instance_id,
                    &waiting.activity_id,
                    &waiting.activity_name,
                )),
        )
    }

    async fn pending_message_subscriptions(
        &self,
        instance_id: &ProcessInstanceId,
    ) -> Result<Vec<EventSubscription>, WorkflowError> {
        let state = self.state.read().await;
        let instance = Self::instance_by_id(&state, instance_id)?;
        let waiting = Self::wait_state(&state, instance)?;

        Ok(waiting
            .messages
            .iter()
            .map(|name| EventSubscription {
                event_name: name.clone(),
                process_instance_id: instance.id.clone(),
            })
            .collect())
    }
}
