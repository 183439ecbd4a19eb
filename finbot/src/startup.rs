//! Application startup and lifecycle management.

use crate::config::{FinbotConfig, SessionConfig, MAX_SESSION_TTL_HOURS};
use crate::handlers::{api, chat, health, metrics};
use crate::services::advisor::resolve_provider;
use crate::services::providers::GenerationParams;
use crate::services::{Advisor, PromptBuilder};
use crate::AppState;
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::Future;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Build the advisor described by `config`, checking the credential once.
pub async fn build_advisor(config: &FinbotConfig) -> Advisor {
    let provider = resolve_provider(&config.provider).await;

    Advisor::new(
        provider,
        PromptBuilder::new(
            crate::services::prompt::FINANCE_PERSONA,
            config.chat.history_window,
        ),
    )
    .with_params(GenerationParams {
        temperature: config.chat.temperature,
        max_tokens: config.chat.max_output_tokens,
    })
    .with_follow_ups(config.chat.follow_ups)
}

pub fn build_router(state: AppState, session_config: &SessionConfig) -> Router {
    // Transcripts live only in memory for the lifetime of the session.
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            session_config.ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS),
        )));

    Router::new()
        .route("/", get(chat::index))
        .route("/chat", post(chat::send_message))
        .route("/preferences", post(chat::update_preferences))
        .route("/reset", post(chat::reset))
        .route("/api/chat", post(api::chat))
        .route(
            "/api/transcript",
            get(api::get_transcript).delete(api::reset_transcript),
        )
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(metrics::metrics))
        // Route layer so the matched path template is visible to the middleware.
        .route_layer(from_fn(metrics_middleware))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
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
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// A missing or rejected API key does not fail the build; the service
    /// starts halted and says so on every page.
    pub async fn build(config: FinbotConfig) -> Result<Self, AppError> {
        let advisor = build_advisor(&config).await;
        if let Some(reason) = advisor.halted_reason() {
            tracing::warn!(reason = %reason, "Starting with chat disabled");
        }

        let router = build_router(AppState::new(advisor), &config.session);

        // Port 0 = random port for testing
        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            model = %config.provider.model,
            history_window = config.chat.history_window,
            "FinBot listening"
        );

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
