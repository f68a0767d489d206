//! Recovery republish for records whose retries ran out

use std::sync::Arc;
use tracing::{error, info};

use super::{send, ConsumerRecord, OutboundRecord, PendingSend, Publisher};

/// Republishes exhausted records to the recovery topic
#[derive(Clone)]
pub struct RecoveryHandler {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl RecoveryHandler {
    /// Create a handler publishing to `topic`
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    /// Recovery topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Republish the original key and value bytes
    ///
    /// Returns immediately. The outcome is logged when the send completes and
    /// is never raised; the returned handle may be awaited or dropped.
    pub fn recover(&self, record: &ConsumerRecord) -> PendingSend {
        info!(
            source_topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            recovery_topic = %self.topic,
            "Inside recovery, republishing record"
        );

        let outbound = OutboundRecord::new(&self.topic, record.key.clone(), record.value.clone());
        let key = record.key_as_int();
        let value = record.value_lossy();

        send(&self.publisher, outbound).on_complete(move |result| match result {
            Ok(receipt) => info!(
                key = ?key,
                value = %value,
                partition = receipt.partition,
                offset = receipt.offset,
                "Recovered record republished"
            ),
            Err(e) => error!(key = ?key, error = %e, "Error republishing record"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::encode_key;
    use crate::test_utils::MockPublisher;

    #[tokio::test]
    async fn test_recover_republishes_identical_bytes() {
        let mock = Arc::new(MockPublisher::new());
        let handler = RecoveryHandler::new(mock.clone(), "library-events");
        let record = ConsumerRecord::new(
            "library-events",
            1,
            42,
            Some(encode_key(0).to_vec()),
            br#"{"libraryEventId":0}"#.to_vec(),
        );

        handler.recover(&record).await.unwrap();

        let sent = mock.sent_records();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "library-events");
        assert_eq!(sent[0].key, record.key);
        assert_eq!(sent[0].value, record.value);
        assert!(sent[0].headers.is_empty());
    }

    #[tokio::test]
    async fn test_recover_uses_configured_topic() {
        let mock = Arc::new(MockPublisher::new());
        let handler = RecoveryHandler::new(mock.clone(), "library-events.DLT");
        let record = ConsumerRecord::new("library-events", 0, 0, None, b"x".to_vec());

        handler.recover(&record).await.unwrap();

        assert_eq!(handler.topic(), "library-events.DLT");
        assert_eq!(mock.sent_records()[0].topic, "library-events.DLT");
    }

    #[tokio::test]
    async fn test_recover_failure_is_reported_not_raised() {
        let mock = Arc::new(MockPublisher::new());
        mock.fail_next_send("broker unavailable");
        let handler = RecoveryHandler::new(mock.clone(), "library-events");
        let record = ConsumerRecord::new("library-events", 0, 0, None, b"x".to_vec());

        let result = handler.recover(&record).await;

        assert!(result.is_err());
        assert_eq!(mock.send_count(), 1);
    }
}
