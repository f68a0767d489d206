//! Kafka integration module for library events
//!
//! This module provides:
//! - Event codec for record keys and payloads
//! - Event processor that validates and persists library events
//! - Retry policy with a static retryable/non-retryable classification
//! - Per-record dispatcher with bounded retry and recovery republish
//! - Publisher abstraction with awaitable and callback completion
//! - Partitioned worker pool consuming the events topic

mod codec;
mod config;
mod consumer;
mod dispatcher;
mod processor;
mod producer;
mod publisher;
mod recovery;
mod retry;

pub use codec::{decode_event, decode_key, encode_event, encode_key, CodecError};
pub use config::KafkaConfig;
pub use consumer::{EventConsumer, ShutdownHandle};
pub use dispatcher::{DispatchOutcome, Dispatcher, FatalRecordError};
pub use processor::{LibraryEventProcessor, FAULT_PROBE_ID};
pub use producer::{LibraryEventProducer, EVENT_SOURCE_HEADER};
pub use publisher::{
    send, KafkaPublisher, OutboundRecord, PendingSend, PublishError, PublishResult, Publisher,
    SendReceipt,
};
pub use recovery::RecoveryHandler;
pub use retry::{is_retryable, RetryDecision, RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};

use rdkafka::message::Message;
use thiserror::Error;

/// Error kinds raised while processing a library event
///
/// The tag is what the retry policy classifies; see [`retry::is_retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedPayload,
    MissingEventId,
    EventNotFound,
    DuplicateBook,
    TransientUpstream,
    Storage,
}

/// Failure of a single processing attempt
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Malformed library event payload: {0}")]
    MalformedPayload(#[from] CodecError),

    #[error("Library event id is missing")]
    MissingEventId,

    #[error("Library event {0} not found")]
    EventNotFound(i32),

    #[error("Book referred to by id {0} exists already")]
    DuplicateBook(i32),

    #[error("Transient upstream failure: {0}")]
    TransientUpstream(String),

    #[error("Event store failure: {0}")]
    Storage(String),
}

impl ProcessingError {
    /// Tag used for retry classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            ProcessingError::MissingEventId => ErrorKind::MissingEventId,
            ProcessingError::EventNotFound(_) => ErrorKind::EventNotFound,
            ProcessingError::DuplicateBook(_) => ErrorKind::DuplicateBook,
            ProcessingError::TransientUpstream(_) => ErrorKind::TransientUpstream,
            ProcessingError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// A record pulled from the events topic
///
/// Key and value are kept as raw bytes so a recovery republish can send them
/// back unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

impl ConsumerRecord {
    /// Create a record from its parts
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        key: Option<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key,
            value: value.into(),
        }
    }

    /// Copy a Kafka message into an owned record
    ///
    /// A missing payload becomes an empty value, which fails to decode.
    pub fn from_message<M: Message>(message: &M) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| k.to_vec()),
            value: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
        }
    }

    /// Decode the record key as an integer, if it is one
    pub fn key_as_int(&self) -> Option<i32> {
        self.key.as_deref().and_then(|k| decode_key(k).ok())
    }

    /// Payload as text for logging
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// Convert publish errors to application errors
impl From<PublishError> for crate::error::Error {
    fn from(err: PublishError) -> Self {
        crate::error::Error::kafka(err.to_string())
    }
}
