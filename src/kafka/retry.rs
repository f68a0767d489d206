//! Retry policy for failed processing attempts

use std::time::Duration;

use super::{ErrorKind, ProcessingError};

/// Attempts per record, the first one included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between two attempts of the same record
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

/// Error kinds and whether a later attempt may succeed
///
/// Kinds missing from the table are not retried.
static RETRYABLE_KINDS: &[(ErrorKind, bool)] = &[
    (ErrorKind::TransientUpstream, true),
    (ErrorKind::MalformedPayload, false),
    (ErrorKind::DuplicateBook, false),
    (ErrorKind::MissingEventId, false),
    (ErrorKind::EventNotFound, false),
];

/// Check whether an error kind is worth retrying
pub fn is_retryable(kind: ErrorKind) -> bool {
    RETRYABLE_KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, retryable)| *retryable)
        .unwrap_or(false)
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then run the same record again
    Retry(Duration),
    /// Stop attempting this record
    GiveUp,
}

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF)
    }
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// `max_attempts` counts the first attempt.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Check whether an error is worth retrying
    pub fn is_retryable(&self, error: &ProcessingError) -> bool {
        is_retryable(error.kind())
    }

    /// Decide what follows failed attempt number `attempt` (1-based)
    pub fn should_retry(&self, error: &ProcessingError, attempt: u32) -> RetryDecision {
        if !self.is_retryable(error) || attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.backoff)
        }
    }
}
