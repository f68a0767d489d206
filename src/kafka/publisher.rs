//! Publisher abstraction with awaitable and callback completion
//!
//! [`send`] hands a record to a [`Publisher`] on a background task and returns
//! a [`PendingSend`]. Callers either await it (synchronous style) or attach an
//! `on_complete` closure (asynchronous style). The publisher never retries;
//! retry lives in the consumer's retry policy.

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::KafkaConfig;
use crate::error::{Error, Result};

/// Result type for publish operations
pub type PublishResult<T> = std::result::Result<T, PublishError>;

/// Publish error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("Failed to publish to topic '{topic}': {reason}")]
    PublishFailure { topic: String, reason: String },

    #[error("Failed to encode outbound record: {0}")]
    Encode(String),

    #[error("Publish task ended before completion")]
    Cancelled,
}

/// Record to be sent to a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutboundRecord {
    /// Create a record without headers
    pub fn new(topic: impl Into<String>, key: Option<Vec<u8>>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key,
            value,
            headers: Vec::new(),
        }
    }

    /// Attach a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Where a record landed after a successful send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    pub partition: i32,
    pub offset: i64,
}

/// Sends records to a topic
///
/// Implementations must tolerate concurrent calls from every worker.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send one record and wait for the broker's answer
    async fn publish(&self, record: OutboundRecord) -> PublishResult<SendReceipt>;
}

/// Completion handle of a send running in the background
///
/// Awaiting yields the outcome. Dropping the handle does not cancel the send.
#[derive(Debug)]
pub struct PendingSend {
    handle: JoinHandle<PublishResult<SendReceipt>>,
}

impl PendingSend {
    /// Run `callback` with the outcome once the send completes
    ///
    /// The callback runs on a background task; the returned handle still
    /// yields the same outcome.
    pub fn on_complete<F>(self, callback: F) -> PendingSend
    where
        F: FnOnce(&PublishResult<SendReceipt>) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let result = self.await;
            callback(&result);
            result
        });

        PendingSend { handle }
    }
}

impl Future for PendingSend {
    type Output = PublishResult<SendReceipt>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.unwrap_or(Err(PublishError::Cancelled)))
    }
}

/// Start sending `record` without waiting for the outcome
pub fn send(publisher: &Arc<dyn Publisher>, record: OutboundRecord) -> PendingSend {
    let publisher = Arc::clone(publisher);
    let handle = tokio::spawn(async move { publisher.publish(record).await });

    PendingSend { handle }
}

/// Kafka-backed publisher
#[derive(Clone)]
pub struct KafkaPublisher {
    /// Kafka producer instance
    producer: FutureProducer,

    /// Timeout for send operations
    send_timeout: Duration,
}

impl KafkaPublisher {
    /// Create a new Kafka publisher
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = config
            .build_producer_config()
            .create()
            .map_err(|e| Error::kafka(format!("Failed to create Kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            send_timeout: config.send_timeout(),
        })
    }

    /// Flush any pending messages
    pub fn flush(&self) {
        if let Err(e) = self.producer.flush(self.send_timeout) {
            warn!(error = %e, "Failed to flush Kafka producer");
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, record: OutboundRecord) -> PublishResult<SendReceipt> {
        let headers = record.headers.iter().fold(OwnedHeaders::new(), |headers, (name, value)| {
            headers.insert(Header {
                key: name.as_str(),
                value: Some(value.as_slice()),
            })
        });

        let mut kafka_record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&record.topic)
            .payload(record.value.as_slice())
            .headers(headers);
        if let Some(key) = &record.key {
            kafka_record = kafka_record.key(key.as_slice());
        }

        match self.producer.send(kafka_record, self.send_timeout).await {
            Ok(delivery) => {
                debug!(
                    topic = %record.topic,
                    partition = delivery.0,
                    offset = delivery.1,
                    "Record delivered"
                );
                Ok(SendReceipt {
                    partition: delivery.0,
                    offset: delivery.1,
                })
            },
            Err((kafka_error, _)) => Err(PublishError::PublishFailure {
                topic: record.topic.clone(),
                reason: kafka_error.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockPublisher;
    use std::sync::Mutex;

    fn record() -> OutboundRecord {
        OutboundRecord::new("library-events", Some(vec![0, 0, 0, 1]), b"payload".to_vec())
    }

    #[test]
    fn test_outbound_record_headers() {
        let record = record().with_header("event-source", "scanner");
        assert_eq!(
            record.headers,
            vec![("event-source".to_string(), b"scanner".to_vec())]
        );
    }

    #[test]
    fn test_kafka_publisher_creation() {
        let result = KafkaPublisher::new(&KafkaConfig::default());
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_pending_send_can_be_awaited() {
        let mock = Arc::new(MockPublisher::new());
        let publisher: Arc<dyn Publisher> = mock.clone();

        let receipt = send(&publisher, record()).await.unwrap();

        assert_eq!(receipt.partition, 0);
        assert_eq!(receipt.offset, 0);
        assert_eq!(mock.sent_records(), vec![record()]);
    }

    #[tokio::test]
    async fn test_on_complete_sees_success() {
        let publisher: Arc<dyn Publisher> = Arc::new(MockPublisher::new());
        let seen = Arc::new(Mutex::new(None));

        let seen_in_callback = Arc::clone(&seen);
        let result = send(&publisher, record())
            .on_complete(move |result| {
                *seen_in_callback.lock().unwrap() = Some(result.clone());
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(*seen.lock().unwrap(), Some(result));
    }

    #[tokio::test]
    async fn test_on_complete_sees_failure_unmodified() {
        let mock = Arc::new(MockPublisher::new());
        mock.fail_next_send("Exception calling Kafka");
        let publisher: Arc<dyn Publisher> = mock.clone();
        let seen = Arc::new(Mutex::new(None));

        let seen_in_callback = Arc::clone(&seen);
        let result = send(&publisher, record())
            .on_complete(move |result| {
                *seen_in_callback.lock().unwrap() = Some(result.clone());
            })
            .await;

        let expected = Err(PublishError::PublishFailure {
            topic: "library-events".to_string(),
            reason: "Exception calling Kafka".to_string(),
        });
        assert_eq!(result, expected);
        assert_eq!(*seen.lock().unwrap(), Some(expected));
    }
}
