//! Library events service
//!
//! Consumes library events from Kafka, validates them and stores them in
//! PostgreSQL, and serves the HTTP ingress that produces them.

use std::sync::Arc;

use library_events::{
    api::{self, AppState, HealthState, HealthStatus},
    config::Config,
    db::{self, LibraryEventRepository, PgLibraryEventRepository},
    error::{Error, Result},
    kafka::{
        Dispatcher, EventConsumer, KafkaPublisher, LibraryEventProcessor, LibraryEventProducer,
        Publisher, RecoveryHandler, FAULT_PROBE_ID,
    },
    logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Arc::new(Config::from_env()?);

    config.validate()?;

    logging::init_tracing(&config.server.log_level, &config.server.environment)?;

    config.log_config();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting library events service");

    // Event store
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;
    let repository: Arc<dyn LibraryEventRepository> =
        Arc::new(PgLibraryEventRepository::new(pool));

    // Kafka pipeline
    let kafka_publisher = Arc::new(KafkaPublisher::new(&config.kafka)?);
    let publisher: Arc<dyn Publisher> = kafka_publisher.clone();

    let mut processor = LibraryEventProcessor::new(Arc::clone(&repository));
    if config.processing.fault_probe_enabled {
        tracing::warn!(probe_id = FAULT_PROBE_ID, "Fault probe enabled");
        processor = processor.with_fault_probe(FAULT_PROBE_ID);
    }
    let recovery = RecoveryHandler::new(Arc::clone(&publisher), &config.kafka.recovery_topic);
    let dispatcher = Dispatcher::new(processor, config.processing.retry_policy(), recovery);

    let consumer = EventConsumer::new(config.kafka.clone(), dispatcher, &config.processing)?;
    let shutdown = consumer.shutdown_handle();

    let health = Arc::new(HealthState::new());
    let consumer_health = Arc::clone(&health);
    let mut consumer_task = tokio::spawn(async move {
        let result = consumer.run().await;
        if let Err(e) = &result {
            consumer_health
                .update_component("consumer", HealthStatus::Unhealthy, Some(e.to_string()))
                .await;
        }
        result
    });

    let monitor_task = tokio::spawn(api::health_monitor(Arc::clone(&health), repository));

    // HTTP ingress, runs until a shutdown signal
    let producer = Arc::new(LibraryEventProducer::new(
        publisher,
        &config.kafka.events_topic,
    ));
    let server_result = api::create_server(Arc::clone(&config), AppState::new(producer, health)).await;

    // Stop the consumer workers and wait for the in-flight records
    shutdown.trigger();
    match tokio::time::timeout(config.server.shutdown_timeout(), &mut consumer_task).await {
        Ok(Ok(Ok(()))) => tracing::info!("Consumer stopped"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Consumer stopped with error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Consumer task panicked"),
        Err(_) => {
            tracing::warn!("Timeout waiting for consumer workers, aborting");
            consumer_task.abort();
        },
    }
    monitor_task.abort();

    kafka_publisher.flush();

    server_result?;
    tracing::info!("Library events service shutdown complete");
    Ok(())
}
