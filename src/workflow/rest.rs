use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::WorkflowClient;
use super::errors::WorkflowError;
use super::types::{ActivityInstance, EventSubscription, ProcessInstanceId};

// ============================================================================
// Camunda REST Adapter
// ============================================================================
//
// Implements the workflow client port against the Camunda 7 REST API:
//
//   start_instance                 POST /process-definition/key/{key}/start
//   find_instance_by_business_key  GET  /process-instance?businessKey=&active=true
//   correlate_message              POST /message
//   activity_tree                  GET  /process-instance/{id}/activity-instances
//   pending_message_subscriptions  GET  /event-subscription?processInstanceId=&eventType=message
//
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartInstanceRequest<'a> {
    business_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CorrelateMessageRequest<'a> {
    message_name: &'a str,
    business_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceDto {
    pub id: String,
    #[serde(default)]
    pub business_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInstanceDto {
    pub id: String,
    pub activity_id: String,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub child_activity_instances: Vec<ActivityInstanceDto>,
}

impl From<ActivityInstanceDto> for ActivityInstance {
    fn from(dto: ActivityInstanceDto) -> Self {
        // Unnamed activities fall back to their id
        let activity_name = dto.activity_name.unwrap_or_else(|| dto.activity_id.clone());
        Self {
            id: dto.id,
            activity_id: dto.activity_id,
            activity_name,
            children: dto.child_activity_instances.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubscriptionDto {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub process_instance_id: Option<String>,
}

/// Text of the engine's answer when no execution waits for a message.
const NO_MATCHING_EXECUTION: &str = "No process definition or execution matches";

#[derive(Debug, Default, Deserialize)]
struct RestErrorDto {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

pub struct CamundaRestClient {
    client: reqwest::Client,
    base_url: String,
}

impl CamundaRestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WorkflowError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_error(response: reqwest::Response) -> (StatusCode, RestErrorDto) {
        let status = response.status();
        let body: RestErrorDto = response.json().await.unwrap_or_default();
        (status, body)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WorkflowError> {
        let response = self.client.get(self.endpoint(path)).query(query).send().await?;
        if !response.status().is_success() {
            let (status, body) = Self::read_error(response).await;
            return Err(transport_error(status, &body));
        }
        Ok(response.json().await?)
    }

    /// Like `get_json`, for resources scoped to one process instance.
    async fn get_instance_json<T: for<'de> Deserialize<'de>>(
        &self,
        instance_id: &ProcessInstanceId,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WorkflowError> {
        let response = self.client.get(self.endpoint(path)).query(query).send().await?;
        if !response.status().is_success() {
            let (status, body) = Self::read_error(response).await;
            return Err(instance_query_error(instance_id, status, &body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WorkflowClient for CamundaRestClient {
    async fn start_instance(
        &self,
        definition_key: &str,
        business_key: &str,
    ) -> Result<ProcessInstanceId, WorkflowError> {
        let response = self
            .client
            .post(self.endpoint(&format!("process-definition/key/{definition_key}/start")))
            .json(&StartInstanceRequest { business_key })
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = Self::read_error(response).await;
            return Err(transport_error(status, &body));
        }

        let instance: ProcessInstanceDto = response.json().await?;
        Ok(ProcessInstanceId::new(instance.id))
    }

    async fn correlate_message(&self, message_name: &str, business_key: &str) -> Result<(), WorkflowError> {
        // The engine answers 400 both for "no instance" and "not waiting";
        // resolving the instance first keeps the two apart.
        self.find_instance_by_business_key(business_key).await?;

        let response = self
            .client
            .post(self.endpoint("message"))
            .json(&CorrelateMessageRequest { message_name, business_key })
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let (status, body) = Self::read_error(response).await;
        tracing::debug!(
            business_key = %business_key,
            message_name = %message_name,
            status = %status,
            engine_error = %body.message,
            "Engine refused message correlation"
        );
        Err(correlation_error(business_key, message_name, status, &body))
    }

    async fn find_instance_by_business_key(&self, business_key: &str) -> Result<ProcessInstanceId, WorkflowError> {
        let instances: Vec<ProcessInstanceDto> = self
            .get_json("process-instance", &[("businessKey", business_key), ("active", "true")])
            .await?;

        single_instance(business_key, instances)
    }

    async fn activity_tree(&self, instance_id: &ProcessInstanceId) -> Result<ActivityInstance, WorkflowError> {
        let dto: ActivityInstanceDto = self
            .get_instance_json(instance_id, &format!("process-instance/{instance_id}/activity-instances"), &[])
            .await?;
        Ok(dto.into())
    }

    async fn pending_message_subscriptions(
        &self,
        instance_id: &ProcessInstanceId,
    ) -> Result<Vec<EventSubscription>, WorkflowError> {
        let dtos: Vec<EventSubscriptionDto> = self
            .get_instance_json(
                instance_id,
                "event-subscription",
                &[("processInstanceId", instance_id.as_str()), ("eventType", "message")],
            )
            .await?;

        Ok(to_subscriptions(instance_id, dtos))
    }
}

fn transport_error(status: StatusCode, body: &RestErrorDto) -> WorkflowError {
    WorkflowError::Transport(format!("{} {}: {}", status, body.kind, body.message))
}

/// A 400 means "not waiting" only when the engine says no execution matched;
/// any other refusal is a request the engine could not use.
fn correlation_error(
    business_key: &str,
    message_name: &str,
    status: StatusCode,
    body: &RestErrorDto,
) -> WorkflowError {
    if status == StatusCode::BAD_REQUEST && body.message.contains(NO_MATCHING_EXECUTION) {
        WorkflowError::NotWaiting {
            business_key: business_key.to_string(),
            message_name: message_name.to_string(),
        }
    } else {
        transport_error(status, body)
    }
}

fn instance_query_error(instance_id: &ProcessInstanceId, status: StatusCode, body: &RestErrorDto) -> WorkflowError {
    if status == StatusCode::NOT_FOUND {
        WorkflowError::InstanceNotFound { instance_id: instance_id.to_string() }
    } else {
        transport_error(status, body)
    }
}

fn single_instance(
    business_key: &str,
    mut instances: Vec<ProcessInstanceDto>,
) -> Result<ProcessInstanceId, WorkflowError> {
    match instances.len() {
        0 => Err(WorkflowError::NotFound { business_key: business_key.to_string() }),
        1 => Ok(ProcessInstanceId::new(instances.remove(0).id)),
        count => Err(WorkflowError::AmbiguousBusinessKey {
            business_key: business_key.to_string(),
            count,
        }),
    }
}

fn to_subscriptions(instance_id: &ProcessInstanceId, dtos: Vec<EventSubscriptionDto>) -> Vec<EventSubscription> {
    dtos.into_iter()
        .filter_map(|dto| {
            dto.event_name.map(|event_name| EventSubscription {
                event_name,
                process_instance_id: dto
                    .process_instance_id
                    .map(ProcessInstanceId::new)
                    .unwrap_or_else(|| instance_id.clone()),
            })
        })
        .collect()
}
