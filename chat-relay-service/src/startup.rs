//! Application startup and lifecycle management.

use crate::config::RelayConfig;
use crate::handlers::{
    chat_with_bot, db_view, get_execute_requests, handle_panic, health_check, index,
    metrics_endpoint, readiness_check, test_action,
};
use crate::services::{ChatLog, PgChatLog, RelayService, SenderResolver, SessionConnector};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub relay: Arc<RelayService>,
    pub sender_resolver: SenderResolver,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/dbview", get(db_view))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/chat", post(chat_with_bot))
        .route("/api/test-action", post(test_action))
        .route("/api/get_execute_requests", get(get_execute_requests))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let chat_log = PgChatLog::connect_lazy(&config.database);
        if config.database.run_migrations {
            // The store may be down or the password missing; chat keeps working.
            if let Err(e) = chat_log.run_migrations().await {
                tracing::warn!(error = %e, "Skipping migrations, chat log writes will fail until the store is reachable");
            }
        }

        if config.bot.is_configured() {
            tracing::info!(bot_service_url = %config.bot.service_url, "Bot connector configured");
        } else {
            tracing::warn!("BOT_DIRECT_LINE_SECRET is not set. Bot functionality will be limited.");
        }

        let connector = Arc::new(SessionConnector::new(config.bot.clone()));
        let chat_log: Arc<dyn ChatLog> = Arc::new(chat_log);

        let state = AppState {
            service_name: config.service_name.clone(),
            relay: Arc::new(RelayService::new(connector, chat_log, &config.bot)),
            sender_resolver: SenderResolver::new(config.geo.lookup_url.clone()),
        };

        Self::with_state(config.common.port, state).await
    }

    /// Bind a listener for prepared state (port 0 = random port for testing).
    pub async fn with_state(port: u16, state: AppState) -> Result<Self, AppError> {
        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Chat relay listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "chat-relay-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(
            self.http_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
