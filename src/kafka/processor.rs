//! Library event processing logic
//!
//! Routes NEW events to insert and UPDATE events to merge-into-existing.
//! Every failure comes back as a typed [`ProcessingError`]; retrying is the
//! dispatcher's job, never the processor's.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{decode_event, ConsumerRecord, ProcessingError};
use crate::db::{LibraryEventRepository, RepositoryError};
use crate::models::{LibraryEvent, LibraryEventType};

/// Event id the fault probe turns into a transient failure
pub const FAULT_PROBE_ID: i32 = 0;

/// Processor that validates library events and persists them
#[derive(Clone)]
pub struct LibraryEventProcessor {
    /// Event store
    repository: Arc<dyn LibraryEventRepository>,

    /// Inbound id that fails with a transient error, when enabled
    fault_probe: Option<i32>,
}

impl LibraryEventProcessor {
    /// Create a new processor
    pub fn new(repository: Arc<dyn LibraryEventRepository>) -> Self {
        Self {
            repository,
            fault_probe: None,
        }
    }

    /// Fail every event carrying `id` with a transient upstream error
    ///
    /// Used to exercise the retry and recovery path end to end.
    pub fn with_fault_probe(mut self, id: i32) -> Self {
        self.fault_probe = Some(id);
        self
    }

    /// Process a single record
    pub async fn process(&self, record: &ConsumerRecord) -> Result<(), ProcessingError> {
        let event = decode_event(&record.value)?;

        debug!(
            library_event_id = ?event.id,
            event_type = %event.event_type,
            book_id = event.book.book_id,
            "Decoded library event"
        );

        if self.fault_probe.is_some() && event.id == self.fault_probe {
            return Err(ProcessingError::TransientUpstream(
                "Temporary network issue".to_string(),
            ));
        }

        match event.event_type {
            LibraryEventType::New => self.save(&event).await,
            LibraryEventType::Update => {
                let existing = self.validate(&event).await?;
                self.save(&existing.merged_with(&event)).await
            },
            LibraryEventType::Unknown => {
                info!(payload = %record.value_lossy(), "Invalid library event type, skipping");
                Ok(())
            },
        }
    }

    /// Check that an UPDATE refers to a stored event and return it
    async fn validate(&self, event: &LibraryEvent) -> Result<LibraryEvent, ProcessingError> {
        let id = event.id.ok_or(ProcessingError::MissingEventId)?;

        let existing = self
            .repository
            .find_by_id(id)
            .await
            .map_err(|e| Self::store_error(e, event.book.book_id))?
            .ok_or(ProcessingError::EventNotFound(id))?;

        info!(library_event_id = id, "Validation is successful for the library event");
        Ok(existing)
    }

    async fn save(&self, event: &LibraryEvent) -> Result<(), ProcessingError> {
        let stored = self
            .repository
            .upsert(event)
            .await
            .map_err(|e| Self::store_error(e, event.book.book_id))?;

        info!(
            library_event_id = ?stored.id,
            event_type = %stored.event_type,
            book_id = stored.book.book_id,
            "Successfully persisted the library event"
        );
        Ok(())
    }

    fn store_error(err: RepositoryError, book_id: i32) -> ProcessingError {
        if err.is_conflict() {
            ProcessingError::DuplicateBook(book_id)
        } else if err.is_transient() {
            warn!(error = %err, "Transient event store failure");
            ProcessingError::TransientUpstream(err.to_string())
        } else {
            ProcessingError::Storage(err.to_string())
        }
    }
}
