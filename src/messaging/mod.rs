use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

// ============================================================================
// Event Publication Port
// ============================================================================
//
// Domain events are handed to an external dispatch mechanism as
// (topic, key, payload) records. Two implementations live here:
// - LoggingPublisher:  writes each record to the log
// - InMemoryPublisher: keeps records for inspection
//
// ============================================================================

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()>;
}

/// A record handed to a publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRecord {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

#[derive(Default)]
pub struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        tracing::info!(
            topic = %topic,
            key = %key,
            payload = %payload,
            "Published domain event"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPublisher {
    records: Mutex<Vec<PublishedRecord>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<PublishedRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        self.records.lock().await.push(PublishedRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
