//! # Repo-Relay HTTP Service
//!
//! HTTP surface of the relay:
//! - Webhook endpoint that hands each delivery to the [`Dispatcher`]
//! - Static health check endpoint
//!
//! The router is built by [`create_router`] from an explicit [`AppState`], so
//! tests can build isolated routers with their own doubles.

pub mod alerts;
pub mod config;
pub mod errors;

pub use alerts::OperatorAlerts;
pub use config::{
    ChatConfig, LoggingConfig, RelayConfig, ServerConfig, ServiceConfig, StaticSubscription,
    SubscriptionsConfig, WebhookConfig, WebhookSecretConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use repo_relay_core::{events::EVENT_TYPE_HEADERS, DispatchError, Dispatcher, EventError};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

/// Body of the health check response
pub const HEALTH_CHECK_BODY: &str = "beep boop! :)";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Routing pipeline for webhook deliveries
    pub dispatcher: Arc<Dispatcher>,

    /// Operator conversation for dropped webhooks, if configured
    pub alerts: Option<OperatorAlerts>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        dispatcher: Arc<Dispatcher>,
        alerts: Option<OperatorAlerts>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
            alerts,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route(&state.config.webhooks.endpoint_path, post(handle_webhook))
        .route(&state.config.webhooks.health_path, get(handle_health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server and run until SIGINT or SIGTERM
///
/// In-flight requests are allowed to complete after the signal; new
/// connections are refused immediately.
pub async fn start_server(
    config: ServiceConfig,
    dispatcher: Arc<Dispatcher>,
    alerts: Option<OperatorAlerts>,
) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(
        address = %address,
        webhook_path = %config.webhooks.endpoint_path,
        health_path = %config.webhooks.health_path,
        "Starting HTTP server"
    );

    let app = create_router(AppState::new(config, dispatcher, alerts));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle a webhook delivery
///
/// Runs the whole routing pipeline before responding. Unsupported event kinds
/// are acknowledged with `200 OK` so the sender does not flag the hook as
/// broken.
#[instrument(skip(state, headers, body), fields(event_type))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookHandlerError> {
    let Some(event_type) = event_type_header(&headers) else {
        warn!("Webhook request without an event type header");
        return Err(WebhookHandlerError::MissingEventHeader);
    };
    tracing::Span::current().record("event_type", event_type);

    match state.dispatcher.handle(event_type, &body).await {
        Ok(report) => {
            debug!(report = ?report, "Webhook processed");
            Ok(StatusCode::OK)
        }
        Err(DispatchError::Event(EventError::UnrecognizedEventKind { event_type })) => {
            info!(event_type = %event_type, "Ignoring unsupported event kind");
            Ok(StatusCode::OK)
        }
        Err(e) => {
            error!(error = %e, "Webhook dropped");
            if let Some(alerts) = &state.alerts {
                alerts.report(&format!("repo-relay dropped a webhook: {e}")).await;
            }
            Err(WebhookHandlerError::from(e))
        }
    }
}

/// First event type header present, in Gitea, Gogs, GitHub order
pub fn event_type_header(headers: &HeaderMap) -> Option<&str> {
    EVENT_TYPE_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Static health check
async fn handle_health_check() -> &'static str {
    HEALTH_CHECK_BODY
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
