// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use carebridge_agent::ClinicalAgent;
use carebridge_config::model::GatewayConfig;
use carebridge_core::{CarebridgeError, PluginAdapter};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::feedback::FeedbackStore;
use crate::handlers;

/// State behind `GET /health`.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Collaborators probed on every health request.
    pub collaborators: Vec<Arc<dyn PluginAdapter>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub agent: Arc<ClinicalAgent>,
    pub health: HealthState,
    pub feedback: Arc<FeedbackStore>,
}

impl GatewayState {
    pub fn new(agent: Arc<ClinicalAgent>, collaborators: Vec<Arc<dyn PluginAdapter>>) -> Self {
        Self {
            agent,
            health: HealthState {
                start_time: std::time::Instant::now(),
                collaborators,
            },
            feedback: Arc::new(FeedbackStore::new()),
        }
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from any origin.
    pub cors_permissive: bool,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Builds the application router.
///
/// - POST /chat
/// - POST /approve
/// - GET /pending
/// - GET /health
/// - POST /feedback
pub fn router(state: GatewayState, cors_permissive: bool) -> Router {
    let cors = if cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/chat", post(handlers::post_chat))
        .route("/approve", post(handlers::post_approve))
        .route("/pending", get(handlers::get_pending))
        .route("/health", get(handlers::get_health))
        .route("/feedback", post(handlers::post_feedback))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Binds and serves the gateway until `shutdown` is cancelled.
///
/// In-flight requests are allowed to finish after cancellation.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CarebridgeError> {
    let app = router(state, config.cors_permissive);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CarebridgeError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CarebridgeError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
