//! HTTP server implementation for the library events service
//!
//! This module sets up the Axum web server with all routes, middleware,
//! and graceful shutdown handling.

use axum::{
    extract::{FromRef, MatchedPath},
    http::{header, Method, Request},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderName;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use uuid::Uuid;

use crate::{
    api::health::{build_info, health_check, ready_check, HealthState},
    api::library_events::{post_library_event, put_library_event},
    api::API_VERSION,
    config::Config,
    error::Result,
    kafka::LibraryEventProducer,
};

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub producer: Arc<LibraryEventProducer>,
    pub health: Arc<HealthState>,
}

impl AppState {
    pub fn new(producer: Arc<LibraryEventProducer>, health: Arc<HealthState>) -> Self {
        Self { producer, health }
    }
}

impl FromRef<AppState> for Arc<LibraryEventProducer> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.producer)
    }
}

impl FromRef<AppState> for Arc<HealthState> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.health)
    }
}

/// Request ID generator
#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Create the main application router
pub fn create_router(config: &Config, state: AppState) -> Router {
    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(ready_check))
        .route("/build", get(build_info))
        .route(
            &format!("/api/{}/libraryevent", API_VERSION),
            post(post_library_event).put(put_library_event),
        )
        .with_state(state);

    app.layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path =
                        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str);
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        method = ?request.method(),
                        matched_path,
                        request_id,
                        latency = tracing::field::Empty,
                        status = tracing::field::Empty,
                    )
                })
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(tracing::Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}

/// Create and start the HTTP server
///
/// Returns once a shutdown signal arrives and in-flight requests finish.
pub async fn create_server(config: Arc<Config>, state: AppState) -> Result<()> {
    let app = create_router(&config, state);
    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .map_err(|e| crate::error::Error::config(format!("Invalid server address: {}", e)))?;

    tracing::info!(
        address = %addr,
        environment = %config.server.environment,
        "Starting HTTP server"
    );

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| crate::error::Error::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| crate::error::Error::internal(format!("Server error: {}", e)))
}

/// Shutdown signal handler
///
/// Waits for CTRL+C or SIGTERM signals to gracefully shutdown the server.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ProcessingConfig, ServerConfig};
    use crate::kafka::KafkaConfig;
    use crate::test_utils::MockPublisher;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn router() -> Router {
        let config = Config {
            server: ServerConfig {
                environment: "test".to_string(),
                ..ServerConfig::default()
            },
            kafka: KafkaConfig::default(),
            database: DatabaseConfig::with_url("postgresql://test@localhost/test"),
            processing: ProcessingConfig::default(),
        };
        let producer = LibraryEventProducer::new(Arc::new(MockPublisher::new()), "library-events");
        let state = AppState::new(Arc::new(producer), Arc::new(HealthState::new()));

        create_router(&config, state)
    }

    async fn get_status(uri: &str) -> StatusCode {
        router()
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(get_status("/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        assert_eq!(get_status("/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_build_endpoint() {
        assert_eq!(get_status("/build").await, StatusCode::OK);
    }
}
