//! Health check endpoints for the library events service
//!
//! This module implements health and readiness checks for Kubernetes
//! and other orchestration platforms.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ComponentHealth, HealthResponse, HealthStatus, ReadyResponse, BUILD_INFO};
use crate::db::LibraryEventRepository;

/// Interval between two background health probes
const MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Application state for health checks
#[derive(Clone)]
pub struct HealthState {
    /// Shared state for component health tracking
    pub components: Arc<tokio::sync::RwLock<HashMap<String, ComponentHealth>>>,
}

impl HealthState {
    /// Create a new health state
    pub fn new() -> Self {
        Self {
            components: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
        }
    }

    /// Update component health status
    pub async fn update_component(
        &self,
        name: impl Into<String>,
        status: HealthStatus,
        message: Option<String>,
    ) {
        let mut components = self.components.write().await;
        components.insert(
            name.into(),
            ComponentHealth {
                status,
                message,
                last_check: Utc::now(),
            },
        );
    }

    /// Get overall health status
    pub async fn get_status(&self) -> HealthStatus {
        let components = self.components.read().await;

        if components.values().any(|c| c.status == HealthStatus::Unhealthy) {
            return HealthStatus::Unhealthy;
        }

        if components.values().any(|c| c.status == HealthStatus::Degraded) {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Basic liveness check endpoint
///
/// Returns 200 OK if the service is alive.
/// This endpoint should be lightweight and not check external dependencies.
pub async fn health_check() -> Response {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Service is running".to_string()),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Readiness check endpoint
///
/// Reports the last known state of every tracked component.
pub async fn ready_check(State(state): State<Arc<HealthState>>) -> Response {
    let components = state.components.read().await.clone();
    let overall_status = state.get_status().await;

    let response = ReadyResponse {
        status: overall_status,
        checks: components,
        timestamp: Utc::now(),
    };

    (overall_status.to_status_code(), Json(response)).into_response()
}

/// Build information endpoint
pub async fn build_info() -> Response {
    (StatusCode::OK, Json(&BUILD_INFO)).into_response()
}

/// Probe the event store
pub async fn check_store_health(repository: &dyn LibraryEventRepository) -> ComponentHealth {
    let (status, message) = match repository.health_check().await {
        Ok(()) => (HealthStatus::Healthy, "Event store is reachable".to_string()),
        Err(e) => (HealthStatus::Unhealthy, e.to_string()),
    };

    ComponentHealth {
        status,
        message: Some(message),
        last_check: Utc::now(),
    }
}

/// Background task to periodically update component health
pub async fn health_monitor(state: Arc<HealthState>, repository: Arc<dyn LibraryEventRepository>) {
    let mut interval = tokio::time::interval(MONITOR_INTERVAL);

    loop {
        interval.tick().await;

        let health = check_store_health(repository.as_ref()).await;
        if !health.status.is_healthy() {
            tracing::warn!(message = ?health.message, "Event store health check failed");
        }
        state.update_component("event_store", health.status, health.message).await;

        tracing::debug!("Health check completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLibraryEventRepository;

    #[tokio::test]
    async fn test_health_state() {
        let state = HealthState::new();

        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        state.update_component("test", HealthStatus::Healthy, None).await;
        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        state
            .update_component(
                "failing",
                HealthStatus::Unhealthy,
                Some("Connection failed".to_string()),
            )
            .await;
        assert_eq!(state.get_status().await, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let response = health_check().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_check_reports_unhealthy_component() {
        let state = Arc::new(HealthState::new());
        state
            .update_component("event_store", HealthStatus::Unhealthy, None)
            .await;

        let response = ready_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_store_health() {
        let repository = MockLibraryEventRepository::new();
        let health = check_store_health(&repository).await;
        assert_eq!(health.status, HealthStatus::Healthy);

        repository.fail_next_operation();
        let health = check_store_health(&repository).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }
}
