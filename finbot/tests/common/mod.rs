//! Shared setup for FinBot integration tests.
//!
//! Everything runs against the in-process router with the mock provider, so
//! no API key or network access is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use finbot::config::{
    ChatConfig, FinbotConfig, ObservabilityConfig, ProviderConfig, ProviderKind, SessionConfig,
};
use finbot::services::providers::mock::MockTextProvider;
use finbot::services::{Advisor, PromptBuilder, ProviderState};
use finbot::startup::build_router;
use finbot::AppState;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub provider: Arc<MockTextProvider>,
}

impl TestApp {
    /// Router backed by `provider` with the default prompt settings.
    pub fn new(provider: MockTextProvider) -> Self {
        Self::with_window(provider, finbot::services::prompt::DEFAULT_HISTORY_WINDOW)
    }

    pub fn with_window(provider: MockTextProvider, window: usize) -> Self {
        Self::build(provider, window, false)
    }

    /// Router that also asks the provider for follow-up suggestions.
    pub fn with_follow_ups(provider: MockTextProvider) -> Self {
        Self::build(
            provider,
            finbot::services::prompt::DEFAULT_HISTORY_WINDOW,
            true,
        )
    }

    fn build(provider: MockTextProvider, window: usize, follow_ups: bool) -> Self {
        let provider = Arc::new(provider);
        let advisor = Advisor::new(
            ProviderState::Ready(provider.clone()),
            PromptBuilder::new(finbot::services::prompt::FINANCE_PERSONA, window),
        )
        .with_follow_ups(follow_ups);
        Self {
            router: router_for(advisor),
            provider,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }
}

/// Router for a service that never got a usable credential.
pub fn halted_router(reason: &str) -> Router {
    router_for(Advisor::new(
        ProviderState::halted(reason),
        PromptBuilder::default(),
    ))
}

pub fn router_for(advisor: Advisor) -> Router {
    build_router(AppState::new(advisor), &SessionConfig { ttl_hours: 24 })
}

/// Config that binds a random local port.
pub fn test_config(kind: ProviderKind, api_key: Option<&str>) -> FinbotConfig {
    FinbotConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        provider: ProviderConfig {
            kind,
            api_key: api_key.map(|key| secrecy::Secret::new(key.to_string())),
            model: "gemini-3-flash-preview".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            verify_credentials: false,
        },
        chat: ChatConfig {
            history_window: 5,
            follow_ups: false,
            temperature: None,
            max_output_tokens: None,
        },
        session: SessionConfig { ttl_hours: 24 },
        observability: ObservabilityConfig {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        },
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::empty())
        .expect("Failed to build request")
}

/// The `name=value` pair of the session cookie set by a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("Failed to parse JSON")
}
