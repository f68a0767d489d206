//! Kafka worker pool with manual offset management
//!
//! Every worker owns a `StreamConsumer` in the shared consumer group, so the
//! broker hands each one a disjoint set of partitions. A worker closes one
//! record at a time (retries included) and commits its offset afterwards.

use anyhow::Context;
use futures::stream::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{ConsumerRecord, DispatchOutcome, Dispatcher, FatalRecordError, KafkaConfig};
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};

/// Idle wait before re-checking the shutdown flag
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shared stop flag for the worker pool
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop workers from pulling new records
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Event consumer that runs the worker pool
pub struct EventConsumer {
    /// Configuration
    config: KafkaConfig,

    /// Per-record processing under the retry policy
    dispatcher: Dispatcher,

    /// Number of workers in the consumer group
    concurrency: usize,

    /// Stop the worker that meets a non-retryable failure
    stop_on_fatal: bool,

    /// Shutdown signal
    shutdown: ShutdownHandle,
}

impl EventConsumer {
    /// Create a new event consumer
    pub fn new(
        config: KafkaConfig,
        dispatcher: Dispatcher,
        processing: &ProcessingConfig,
    ) -> Result<Self> {
        if processing.worker_concurrency == 0 {
            return Err(Error::config("Worker concurrency must be at least 1"));
        }
        if config.events_topic.is_empty() {
            return Err(Error::config("Kafka events topic cannot be empty"));
        }

        Ok(Self {
            config,
            dispatcher,
            concurrency: processing.worker_concurrency,
            stop_on_fatal: processing.stop_on_fatal,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Handle that stops the pool once triggered
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Start the workers and wait until all of them exit
    pub async fn run(self) -> Result<()> {
        info!(
            topic = %self.config.events_topic,
            group = %self.config.consumer_group,
            workers = self.concurrency,
            "Starting Kafka consumer"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let consumer = Self::subscribe(&self.config)?;
            let dispatcher = self.dispatcher.clone();
            let shutdown = self.shutdown.clone();
            let stop_on_fatal = self.stop_on_fatal;

            workers.spawn(async move {
                Self::consume_loop(worker_id, consumer, dispatcher, shutdown, stop_on_fatal).await
            });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    error!(error = %e, "Consumer worker stopped with error");
                    first_error.get_or_insert(e);
                },
                Err(e) => {
                    error!(error = %e, "Consumer worker panicked");
                    first_error.get_or_insert(Error::internal("Consumer worker panicked"));
                },
            }
        }

        info!("Kafka consumer stopped");
        first_error.map_or(Ok(()), Err)
    }

    fn subscribe(config: &KafkaConfig) -> anyhow::Result<StreamConsumer> {
        let consumer: StreamConsumer = config
            .build_consumer_config()
            .create()
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&config.events_topic])
            .with_context(|| format!("Failed to subscribe to topic '{}'", config.events_topic))?;

        Ok(consumer)
    }

    /// Internal consumption loop of one worker
    async fn consume_loop(
        worker_id: usize,
        consumer: StreamConsumer,
        dispatcher: Dispatcher,
        shutdown: ShutdownHandle,
        stop_on_fatal: bool,
    ) -> Result<()> {
        let stream = consumer.stream();
        tokio::pin!(stream);

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let message = tokio::select! {
                msg = stream.next() => msg,
                _ = sleep(POLL_INTERVAL) => continue,
            };

            let message = match message {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    error!(worker = worker_id, error = %e, "Kafka consumer error");
                    continue;
                },
                None => continue,
            };

            let record = ConsumerRecord::from_message(&message);
            let outcome = dispatcher.dispatch(&record).await;
            close_record(outcome, stop_on_fatal)?;

            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                warn!(
                    worker = worker_id,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Failed to commit offset"
                );
            }
        }

        info!(worker = worker_id, "Consumer worker stopped");
        Ok(())
    }
}

/// Decide whether the worker moves past a dispatched record
///
/// Returns an error when the worker must stop without committing.
fn close_record(
    outcome: std::result::Result<DispatchOutcome, FatalRecordError>,
    stop_on_fatal: bool,
) -> Result<()> {
    match outcome {
        Ok(DispatchOutcome::Succeeded { attempts }) => {
            debug!(attempts = attempts, "Record closed");
            Ok(())
        },
        Ok(DispatchOutcome::RecoveryDispatched {
            attempts,
            last_error,
            ..
        }) => {
            info!(attempts = attempts, error = %last_error, "Record handed to recovery");
            Ok(())
        },
        Err(fatal) => {
            error!(
                topic = %fatal.topic,
                partition = fatal.partition,
                offset = fatal.offset,
                error = %fatal.source,
                "Non-retryable failure processing record"
            );
            if stop_on_fatal {
                Err(Error::internal(fatal.to_string()))
            } else {
                Ok(())
            }
        },
    }
}
