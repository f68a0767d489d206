//! Library event producer
//!
//! Encodes library events and sends them through a [`Publisher`] in three
//! styles: fire-and-forget with completion logging, awaited on the default
//! topic, and awaited on an explicit topic. The fire-and-forget and
//! explicit-topic styles tag the record with an `event-source` header.

use std::sync::Arc;
use tracing::{error, info};

use super::{
    encode_event, encode_key, send, OutboundRecord, PendingSend, PublishError, PublishResult,
    Publisher, SendReceipt,
};
use crate::models::LibraryEvent;

/// Header naming the system an event came from
pub const EVENT_SOURCE_HEADER: &str = "event-source";

const EVENT_SOURCE: &str = "scanner";

/// Producer of library events
#[derive(Clone)]
pub struct LibraryEventProducer {
    publisher: Arc<dyn Publisher>,
    default_topic: String,
}

impl LibraryEventProducer {
    /// Create a producer sending to `default_topic`
    pub fn new(publisher: Arc<dyn Publisher>, default_topic: impl Into<String>) -> Self {
        Self {
            publisher,
            default_topic: default_topic.into(),
        }
    }

    pub fn default_topic(&self) -> &str {
        &self.default_topic
    }

    /// Send an event without waiting for the broker
    ///
    /// The outcome is logged once known and is also available by awaiting
    /// the returned handle.
    pub fn send_library_event(&self, event: &LibraryEvent) -> PublishResult<PendingSend> {
        let record = Self::record(event, &self.default_topic)?
            .with_header(EVENT_SOURCE_HEADER, EVENT_SOURCE);
        Ok(Self::log_completion(send(&self.publisher, record), event))
    }

    /// Send an event to the default topic and wait for the broker
    pub async fn send_library_event_sync(&self, event: &LibraryEvent) -> PublishResult<SendReceipt> {
        let record = Self::record(event, &self.default_topic)?;
        let result = send(&self.publisher, record).await;
        Self::log_result(&result, event);
        result
    }

    /// Send an event to `topic` and wait for the broker
    pub async fn send_library_event_to(
        &self,
        event: &LibraryEvent,
        topic: &str,
    ) -> PublishResult<SendReceipt> {
        let record = Self::record(event, topic)?.with_header(EVENT_SOURCE_HEADER, EVENT_SOURCE);
        Self::log_completion(send(&self.publisher, record), event).await
    }

    fn record(event: &LibraryEvent, topic: &str) -> PublishResult<OutboundRecord> {
        let value = encode_event(event).map_err(|e| PublishError::Encode(e.to_string()))?;
        let key = event.id.map(|id| encode_key(id).to_vec());

        Ok(OutboundRecord::new(topic, key, value))
    }

    fn log_completion(pending: PendingSend, event: &LibraryEvent) -> PendingSend {
        let event = event.clone();
        pending.on_complete(move |result| Self::log_result(result, &event))
    }

    fn log_result(result: &PublishResult<SendReceipt>, event: &LibraryEvent) {
        match result {
            Ok(receipt) => info!(
                key = ?event.id,
                book_id = event.book.book_id,
                partition = receipt.partition,
                offset = receipt.offset,
                "Message sent successfully"
            ),
            Err(e) => error!(key = ?event.id, error = %e, "Error sending the message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::decode_event;
    use crate::models::Book;
    use crate::test_utils::MockPublisher;

    fn source_header() -> Vec<(String, Vec<u8>)> {
        vec![(EVENT_SOURCE_HEADER.to_string(), b"scanner".to_vec())]
    }

    fn producer(mock: &Arc<MockPublisher>) -> LibraryEventProducer {
        LibraryEventProducer::new(mock.clone(), "library-events")
    }

    #[tokio::test]
    async fn test_async_send_is_awaitable() {
        let mock = Arc::new(MockPublisher::new());
        let event = LibraryEvent::new_event(Book::new(456, "Kafka Using Rust", "Dilip"));

        let receipt = producer(&mock).send_library_event(&event).unwrap().await.unwrap();

        assert_eq!(receipt.partition, 0);
        let sent = mock.sent_records();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "library-events");
        assert_eq!(sent[0].key, None);
        assert_eq!(decode_event(&sent[0].value).unwrap(), event);
        assert_eq!(sent[0].headers, source_header());
    }

    #[tokio::test]
    async fn test_sync_send_uses_integer_key() {
        let mock = Arc::new(MockPublisher::new());
        let event = LibraryEvent::update_event(123, Book::new(456, "Kafka Using Rust", "Dilip"));

        producer(&mock).send_library_event_sync(&event).await.unwrap();

        let sent = mock.sent_records();
        assert_eq!(sent[0].key, Some(vec![0, 0, 0, 123]));
        assert!(sent[0].headers.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_explicit_topic() {
        let mock = Arc::new(MockPublisher::new());
        let event = LibraryEvent::new_event(Book::new(1, "a", "b"));

        producer(&mock)
            .send_library_event_to(&event, "library-events-replay")
            .await
            .unwrap();

        let sent = mock.sent_records();
        assert_eq!(sent[0].topic, "library-events-replay");
        assert_eq!(sent[0].headers, source_header());
    }

    #[tokio::test]
    async fn test_send_failure_is_returned_unmodified() {
        let mock = Arc::new(MockPublisher::new());
        mock.fail_next_send("Exception calling Kafka");
        let event = LibraryEvent::new_event(Book::new(1, "a", "b"));

        let err = producer(&mock).send_library_event_sync(&event).await.unwrap_err();

        assert_eq!(
            err,
            PublishError::PublishFailure {
                topic: "library-events".to_string(),
                reason: "Exception calling Kafka".to_string(),
            }
        );
    }
}
