//! Test utilities for the library events service
//!
//! This module provides mock implementations and utilities for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::db::repository::{Repository, RepositoryError, RepositoryResult, UpsertRepository};
use crate::db::LibraryEventRepository;
use crate::kafka::{
    encode_event, encode_key, ConsumerRecord, OutboundRecord, PublishError, PublishResult,
    Publisher, SendReceipt,
};
use crate::models::LibraryEvent;

/// Default topic used by record helpers
pub const TEST_TOPIC: &str = "library-events";

#[derive(Debug, Clone, Copy)]
enum Failure {
    Query,
    Transient,
}

#[derive(Debug, Default)]
struct RepositoryState {
    events: Vec<LibraryEvent>,
    next_id: i32,
    fail_next: Option<Failure>,
    transient_failures: usize,
    upserts: usize,
    calls: Vec<Instant>,
}

/// In-memory event store for testing
///
/// Assigns ids on insert and enforces book id uniqueness like the
/// PostgreSQL table does.
#[derive(Debug, Clone, Default)]
pub struct MockLibraryEventRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl MockLibraryEventRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next operation with a non-transient query error
    pub fn fail_next_operation(&self) {
        self.state.lock().unwrap().fail_next = Some(Failure::Query);
    }

    /// Fail the next operation with a connection error
    pub fn fail_next_transient(&self) {
        self.state.lock().unwrap().fail_next = Some(Failure::Transient);
    }

    /// Fail the next `times` operations with a connection error
    pub fn fail_transient_times(&self, times: usize) {
        self.state.lock().unwrap().transient_failures = times;
    }

    /// When each store operation was called, failed ones included
    pub fn call_instants(&self) -> Vec<Instant> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Get all stored events ordered by id
    pub fn get_all_events(&self) -> Vec<LibraryEvent> {
        let mut events = self.state.lock().unwrap().events.clone();
        events.sort_by_key(|e| e.id);
        events
    }

    /// Number of successful upserts
    pub fn upsert_count(&self) -> usize {
        self.state.lock().unwrap().upserts
    }

    /// Add an event directly, bypassing upsert accounting
    pub fn add_event(&self, event: LibraryEvent) {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = event.id {
            state.next_id = state.next_id.max(id);
        }
        state.events.push(event);
    }

    fn check_failure(state: &mut RepositoryState) -> RepositoryResult<()> {
        state.calls.push(Instant::now());

        let failure = state.fail_next.take().or_else(|| {
            (state.transient_failures > 0).then(|| {
                state.transient_failures -= 1;
                Failure::Transient
            })
        });

        match failure {
            Some(Failure::Query) => Err(RepositoryError::QueryExecution("Mock failure".to_string())),
            Some(Failure::Transient) => {
                Err(RepositoryError::Connection("connection reset by peer".to_string()))
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Repository for MockLibraryEventRepository {
    type Entity = LibraryEvent;
    type Id = i32;

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<LibraryEvent>> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        Ok(state.events.iter().find(|e| e.id == Some(id)).cloned())
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        Ok(state.events.len() as i64)
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)
    }
}

#[async_trait]
impl UpsertRepository for MockLibraryEventRepository {
    async fn upsert(&self, entity: &LibraryEvent) -> RepositoryResult<LibraryEvent> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;

        let book_taken = state
            .events
            .iter()
            .any(|e| e.book.book_id == entity.book.book_id && e.id != entity.id);
        if book_taken {
            return Err(RepositoryError::Conflict(format!(
                "book {} is already owned by another event",
                entity.book.book_id
            )));
        }

        let stored = match entity.id {
            Some(id) => {
                let stored = entity.clone();
                match state.events.iter().position(|e| e.id == Some(id)) {
                    Some(pos) => state.events[pos] = stored.clone(),
                    None => {
                        state.next_id = state.next_id.max(id);
                        state.events.push(stored.clone());
                    },
                }
                stored
            },
            None => {
                state.next_id += 1;
                let stored = entity.clone().with_id(state.next_id);
                state.events.push(stored.clone());
                stored
            },
        };

        state.upserts += 1;
        Ok(stored)
    }
}

#[async_trait]
impl LibraryEventRepository for MockLibraryEventRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<LibraryEvent>> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        drop(state);
        Ok(self.get_all_events())
    }
}

#[derive(Debug, Default)]
struct PublisherState {
    sent: Vec<OutboundRecord>,
    drained: usize,
    fail_next: Option<String>,
}

/// In-memory publisher for testing
///
/// Every send lands on partition 0 with the next offset.
#[derive(Debug, Clone, Default)]
pub struct MockPublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl MockPublisher {
    /// Create a new mock publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next send with `reason`
    pub fn fail_next_send(&self, reason: &str) {
        self.state.lock().unwrap().fail_next = Some(reason.to_string());
    }

    /// Every record passed to `publish`, failed ones included
    pub fn sent_records(&self) -> Vec<OutboundRecord> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Number of `publish` calls
    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    /// Records sent to `topic` since the last drain, as a consumer sees them
    pub fn drain_topic(&self, topic: &str) -> Vec<ConsumerRecord> {
        let mut state = self.state.lock().unwrap();
        let start = state.drained;
        state.drained = state.sent.len();

        state.sent[start..]
            .iter()
            .enumerate()
            .filter(|(_, r)| r.topic == topic)
            .map(|(i, r)| {
                ConsumerRecord::new(&r.topic, 0, (start + i) as i64, r.key.clone(), r.value.clone())
            })
            .collect()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, record: OutboundRecord) -> PublishResult<SendReceipt> {
        let mut state = self.state.lock().unwrap();
        let offset = state.sent.len() as i64;
        let failure = state.fail_next.take();
        let topic = record.topic.clone();
        state.sent.push(record);

        match failure {
            Some(reason) => Err(PublishError::PublishFailure { topic, reason }),
            None => Ok(SendReceipt {
                partition: 0,
                offset,
            }),
        }
    }
}

/// Build a consumer record the way the producer would publish `event`
pub fn event_record(event: &LibraryEvent) -> ConsumerRecord {
    let value = encode_event(event).unwrap();
    let key = event.id.map(|id| encode_key(id).to_vec());
    ConsumerRecord::new(TEST_TOPIC, 0, 0, key, value)
}

/// Build a consumer record from a raw JSON payload
pub fn json_record(key: Option<i32>, payload: &str) -> ConsumerRecord {
    let key = key.map(|id| encode_key(id).to_vec());
    ConsumerRecord::new(TEST_TOPIC, 0, 0, key, payload.as_bytes().to_vec())
}
