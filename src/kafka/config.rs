//! Kafka configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_brokers")]
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    /// Consumer group shared by every worker
    #[serde(default = "default_consumer_group")]
    #[envconfig(from = "KAFKA_CONSUMER_GROUP", default = "library-events-listener-group")]
    pub consumer_group: String,

    /// Topic library events are produced to and consumed from
    #[serde(default = "default_events_topic")]
    #[envconfig(from = "KAFKA_EVENTS_TOPIC", default = "library-events")]
    pub events_topic: String,

    /// Topic records are republished to once retries are exhausted
    #[serde(default = "default_recovery_topic")]
    #[envconfig(from = "KAFKA_RECOVERY_TOPIC", default = "library-events")]
    pub recovery_topic: String,

    /// Enable auto-commit (should be false for manual offset management)
    #[serde(default = "default_auto_commit")]
    #[envconfig(from = "KAFKA_AUTO_COMMIT", default = "false")]
    pub auto_commit: bool,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    /// Maximum poll interval in milliseconds
    #[serde(default = "default_max_poll_interval")]
    #[envconfig(from = "KAFKA_MAX_POLL_INTERVAL_MS", default = "300000")]
    pub max_poll_interval_ms: u32,

    /// Enable idempotent producer
    #[serde(default = "default_idempotent_producer")]
    #[envconfig(from = "KAFKA_IDEMPOTENT_PRODUCER", default = "true")]
    pub idempotent_producer: bool,

    /// Compression type for the producer
    #[serde(default = "default_compression_type")]
    #[envconfig(from = "KAFKA_COMPRESSION_TYPE", default = "snappy")]
    pub compression_type: String,

    /// Producer send timeout in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    #[envconfig(from = "KAFKA_SEND_TIMEOUT_MS", default = "5000")]
    pub send_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            consumer_group: default_consumer_group(),
            events_topic: default_events_topic(),
            recovery_topic: default_recovery_topic(),
            auto_commit: default_auto_commit(),
            session_timeout_ms: default_session_timeout(),
            max_poll_interval_ms: default_max_poll_interval(),
            idempotent_producer: default_idempotent_producer(),
            compression_type: default_compression_type(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl KafkaConfig {
    /// Create a new KafkaConfig from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        <Self as envconfig::Envconfig>::init_from_env()
    }

    /// Get session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms as u64)
    }

    /// Get max poll interval as Duration
    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms as u64)
    }

    /// Get producer send timeout as Duration
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Build rdkafka consumer configuration
    pub fn build_consumer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", self.auto_commit.to_string())
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set(
                "max.poll.interval.ms",
                self.max_poll_interval_ms.to_string(),
            )
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "latest");

        config
    }

    /// Build rdkafka producer configuration
    pub fn build_producer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", "30000")
            .set("compression.type", &self.compression_type);

        if self.idempotent_producer {
            config
                .set("enable.idempotence", "true")
                .set("acks", "all")
                .set("retries", "10")
                .set("max.in.flight.requests.per.connection", "5");
        } else {
            config.set("acks", "1");
        }

        config
    }
}

// Default value functions
fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_consumer_group() -> String {
    "library-events-listener-group".to_string()
}

fn default_events_topic() -> String {
    "library-events".to_string()
}

fn default_recovery_topic() -> String {
    "library-events".to_string()
}

fn default_auto_commit() -> bool {
    false
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}

fn default_max_poll_interval() -> u32 {
    300000 // 5 minutes
}

fn default_idempotent_producer() -> bool {
    true
}

fn default_compression_type() -> String {
    "snappy".to_string()
}

fn default_send_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KafkaConfig::default();
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.consumer_group, "library-events-listener-group");
        assert_eq!(config.events_topic, "library-events");
        assert_eq!(config.recovery_topic, config.events_topic);
        assert!(!config.auto_commit);
    }

    #[test]
    fn test_duration_conversions() {
        let config = KafkaConfig::default();
        assert_eq!(config.session_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_poll_interval(), Duration::from_secs(300));
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_client_configs() {
        let config = KafkaConfig::default();

        let consumer = config.build_consumer_config();
        assert_eq!(consumer.get("group.id"), Some("library-events-listener-group"));
        assert_eq!(consumer.get("enable.auto.commit"), Some("false"));

        let producer = config.build_producer_config();
        assert_eq!(producer.get("enable.idempotence"), Some("true"));
        assert_eq!(producer.get("acks"), Some("all"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: KafkaConfig =
            serde_json::from_str(r#"{"recovery_topic":"library-events.DLT"}"#).unwrap();
        assert_eq!(config.events_topic, "library-events");
        assert_eq!(config.recovery_topic, "library-events.DLT");
    }
}
