//! Library events service
//!
//! Consumes library events from Kafka, persists them to PostgreSQL with
//! bounded retry, and republishes records whose retries ran out. Also exposes
//! an HTTP ingress that produces library events.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod models;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{Error, Result};

// Re-export model types
pub use models::{Book, LibraryEvent, LibraryEventType};

// Re-export API server functions
pub use api::server::{create_router, create_server, shutdown_signal, AppState};

// Re-export health check types
pub use api::{BuildInfo, ComponentHealth, HealthResponse, HealthState, HealthStatus, ReadyResponse};
