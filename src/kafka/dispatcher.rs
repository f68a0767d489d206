//! Per-record dispatch under the retry policy
//!
//! A record is processed, retried after the policy delay while the policy
//! allows it, and then either recovered (retryable failure) or reported as
//! fatal (non-retryable failure).

use thiserror::Error;
use tracing::{debug, warn, Instrument};

use super::{
    ConsumerRecord, LibraryEventProcessor, PendingSend, ProcessingError, RecoveryHandler,
    RetryDecision, RetryPolicy,
};

/// How a record was closed
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The processor accepted the record
    Succeeded { attempts: u32 },

    /// Retries ran out on a retryable error and the record was handed to
    /// recovery
    RecoveryDispatched {
        attempts: u32,
        last_error: ProcessingError,
        recovery: PendingSend,
    },
}

impl DispatchOutcome {
    /// Number of processing attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchOutcome::Succeeded { attempts }
            | DispatchOutcome::RecoveryDispatched { attempts, .. } => *attempts,
        }
    }
}

/// Non-retryable failure of a record
#[derive(Debug, Error)]
#[error("Record {topic}/{partition}@{offset} failed after {attempts} attempt(s): {source}")]
pub struct FatalRecordError {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub attempts: u32,
    #[source]
    pub source: ProcessingError,
}

/// Drives one record through processing, retry and recovery
#[derive(Clone)]
pub struct Dispatcher {
    processor: LibraryEventProcessor,
    policy: RetryPolicy,
    recovery: RecoveryHandler,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        processor: LibraryEventProcessor,
        policy: RetryPolicy,
        recovery: RecoveryHandler,
    ) -> Self {
        Self {
            processor,
            policy,
            recovery,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Process `record` until it succeeds, is recovered, or fails fatally
    pub async fn dispatch(
        &self,
        record: &ConsumerRecord,
    ) -> Result<DispatchOutcome, FatalRecordError> {
        let span = crate::record_span!(record.topic, record.partition, record.offset);
        self.dispatch_attempts(record).instrument(span).await
    }

    async fn dispatch_attempts(
        &self,
        record: &ConsumerRecord,
    ) -> Result<DispatchOutcome, FatalRecordError> {
        let mut attempt = 1;

        loop {
            let error = match self.processor.process(record).await {
                Ok(()) => {
                    debug!(attempts = attempt, "Record processed");
                    return Ok(DispatchOutcome::Succeeded { attempts: attempt });
                },
                Err(e) => e,
            };

            match self.policy.should_retry(&error, attempt) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Processing failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                RetryDecision::GiveUp if self.policy.is_retryable(&error) => {
                    warn!(
                        attempts = attempt,
                        error = %error,
                        "Retries exhausted, dispatching recovery"
                    );
                    let recovery = self.recovery.recover(record);
                    return Ok(DispatchOutcome::RecoveryDispatched {
                        attempts: attempt,
                        last_error: error,
                        recovery,
                    });
                },
                RetryDecision::GiveUp => {
                    return Err(FatalRecordError {
                        topic: record.topic.clone(),
                        partition: record.partition,
                        offset: record.offset,
                        attempts: attempt,
                        source: error,
                    });
                },
            }
        }
    }
}
