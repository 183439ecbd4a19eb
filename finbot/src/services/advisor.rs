//! The chat loop: compose prompt, call the provider, record turns.

use crate::config::{ProviderConfig, ProviderKind};
use crate::models::{Preferences, Transcript, Turn};
use crate::services::metrics;
use crate::services::prompt::{follow_up_prompt, parse_follow_ups, PromptBuilder};
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const MISSING_KEY_MESSAGE: &str =
    "FinBot is not configured: no Google API key was provided. Set GOOGLE_API_KEY and restart the service.";

pub const INVALID_KEY_MESSAGE: &str =
    "FinBot is not configured: the Google API key was rejected. Update GOOGLE_API_KEY and restart the service.";

/// Shown for every provider failure, whatever the cause.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Sorry, FinBot could not get a response right now. Please try again.";

/// Whether the advisor can reach a provider at all.
#[derive(Clone)]
pub enum ProviderState {
    Ready(Arc<dyn TextProvider>),
    /// Credential missing or rejected. No provider calls are ever made.
    Halted { reason: String },
}

impl ProviderState {
    pub fn halted(reason: impl Into<String>) -> Self {
        ProviderState::Halted {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ProviderState::Ready(_))
    }
}

impl std::fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderState::Ready(provider) => write!(f, "Ready({})", provider.name()),
            ProviderState::Halted { reason } => write!(f, "Halted({})", reason),
        }
    }
}

/// Build the provider described by `config` and check its credential.
pub async fn resolve_provider(config: &ProviderConfig) -> ProviderState {
    let provider: Arc<dyn TextProvider> = match config.kind {
        ProviderKind::Mock => {
            tracing::warn!("Using mock text provider; replies are canned");
            Arc::new(MockTextProvider::new())
        }
        ProviderKind::Gemini => {
            let Some(api_key) = config.api_key.clone() else {
                tracing::error!("GOOGLE_API_KEY is not set; chat is disabled");
                return ProviderState::halted(MISSING_KEY_MESSAGE);
            };

            let gemini_config = GeminiConfig {
                api_key,
                model: config.model.clone(),
                base_url: config.base_url.clone(),
            };
            match GeminiTextProvider::new(gemini_config) {
                Ok(provider) => {
                    tracing::info!(model = %config.model, "Initialized Gemini text provider");
                    Arc::new(provider)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to initialize Gemini text provider");
                    return ProviderState::halted(MISSING_KEY_MESSAGE);
                }
            }
        }
    };

    if config.verify_credentials {
        verify_provider(provider).await
    } else {
        ProviderState::Ready(provider)
    }
}

/// Run the provider's health check once.
///
/// Only a definite credential failure halts the service; a network failure
/// leaves it ready since the key was not shown to be bad.
pub async fn verify_provider(provider: Arc<dyn TextProvider>) -> ProviderState {
    match provider.health_check().await {
        Ok(()) => {
            tracing::info!(provider = provider.name(), "Provider credential verified");
            ProviderState::Ready(provider)
        }
        Err(e) if e.is_credential_error() => {
            tracing::error!(provider = provider.name(), error = %e, "Provider rejected credential; chat is disabled");
            ProviderState::halted(INVALID_KEY_MESSAGE)
        }
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "Could not verify provider credential at startup");
            ProviderState::Ready(provider)
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Halted(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),
}

impl ChatError {
    /// Text shown to the user.
    pub fn user_message(&self) -> &str {
        match self {
            ChatError::Halted(reason) => reason,
            ChatError::EmptyMessage => "Please enter a question.",
            ChatError::Provider(_) => GENERIC_ERROR_MESSAGE,
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Halted(reason) => AppError::ServiceUnavailable(reason),
            ChatError::EmptyMessage => {
                AppError::BadRequest(anyhow::anyhow!("Please enter a question."))
            }
            ChatError::Provider(_) => AppError::BadGateway(GENERIC_ERROR_MESSAGE.to_string()),
        }
    }
}

/// Outcome of a successful interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub follow_ups: Vec<String>,
}

pub struct Advisor {
    provider: ProviderState,
    prompt: PromptBuilder,
    params: GenerationParams,
    follow_ups: bool,
}

impl Advisor {
    pub fn new(provider: ProviderState, prompt: PromptBuilder) -> Self {
        Self {
            provider,
            prompt,
            params: GenerationParams::default(),
            follow_ups: false,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_follow_ups(mut self, enabled: bool) -> Self {
        self.follow_ups = enabled;
        self
    }

    pub fn provider_state(&self) -> &ProviderState {
        &self.provider
    }

    /// The fatal message to show when chat is disabled.
    pub fn halted_reason(&self) -> Option<&str> {
        match &self.provider {
            ProviderState::Halted { reason } => Some(reason),
            ProviderState::Ready(_) => None,
        }
    }

    /// Handle one user message.
    ///
    /// On success the transcript gains the user turn and exactly one
    /// assistant turn. On provider failure it gains only the user turn. When
    /// halted or given a blank message it is left untouched.
    #[tracing::instrument(skip_all, fields(history_len = transcript.len()))]
    pub async fn respond(
        &self,
        transcript: &mut Transcript,
        preferences: &Preferences,
        input: &str,
    ) -> Result<Reply, ChatError> {
        let provider = match &self.provider {
            ProviderState::Ready(provider) => provider,
            ProviderState::Halted { reason } => {
                metrics::record_chat("halted");
                return Err(ChatError::Halted(reason.clone()));
            }
        };

        let input = input.trim();
        if input.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let prompt = self.prompt.build(transcript, preferences, input);
        transcript.push(Turn::user(input));

        let start = Instant::now();
        let result = provider.generate(&prompt, &self.params).await;
        let elapsed = start.elapsed();

        let response = match result {
            Ok(response) => {
                metrics::record_provider_call(provider.name(), "success", elapsed);
                response
            }
            Err(e) => {
                metrics::record_provider_call(provider.name(), e.kind(), elapsed);
                metrics::record_chat("failed");
                tracing::error!(
                    provider = provider.name(),
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Provider call failed"
                );
                return Err(ChatError::Provider(e));
            }
        };

        metrics::record_tokens(
            provider.name(),
            response.input_tokens,
            response.output_tokens,
        );
        tracing::info!(
            provider = provider.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            finish_reason = response.finish_reason.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Advisor reply generated"
        );

        transcript.push(Turn::assistant(response.text.clone()));
        metrics::record_chat("success");

        let follow_ups = if self.follow_ups {
            self.suggest_follow_ups(provider.as_ref(), input, &response.text)
                .await
        } else {
            Vec::new()
        };

        Ok(Reply {
            text: response.text,
            follow_ups,
        })
    }

    /// Empty the transcript.
    pub fn reset(&self, transcript: &mut Transcript) {
        tracing::info!(cleared_turns = transcript.len(), "Transcript reset");
        transcript.clear();
    }

    async fn suggest_follow_ups(
        &self,
        provider: &dyn TextProvider,
        question: &str,
        answer: &str,
    ) -> Vec<String> {
        let prompt = follow_up_prompt(question, answer);
        match provider.generate(&prompt, &self.params).await {
            Ok(response) => parse_follow_ups(&response.text),
            Err(e) => {
                tracing::warn!(error = %e, "Follow-up suggestion call failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskTolerance, Role};
    use crate::services::prompt::FINANCE_PERSONA;

    fn advisor_with(provider: Arc<MockTextProvider>) -> Advisor {
        Advisor::new(ProviderState::Ready(provider), PromptBuilder::default())
    }

    #[tokio::test]
    async fn success_appends_user_and_one_assistant_turn() {
        let provider = Arc::new(MockTextProvider::with_replies([Ok(
            "Pay yourself first.".to_string()
        )]));
        let advisor = advisor_with(provider.clone());
        let mut transcript = Transcript::new();

        let reply = advisor
            .respond(&mut transcript, &Preferences::default(), "  Budget tips?  ")
            .await
            .unwrap();

        assert_eq!(reply.text, "Pay yourself first.");
        assert!(reply.follow_ups.is_empty());
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.turns()[0].role, Role::User);
        assert_eq!(transcript.turns()[0].content, "Budget tips?");
        assert_eq!(transcript.turns()[1].role, Role::Assistant);
        assert_eq!(transcript.turns()[1].content, "Pay yourself first.");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn failure_appends_no_assistant_turn() {
        let provider = Arc::new(MockTextProvider::failing(ProviderError::NetworkError(
            "connection reset".into(),
        )));
        let advisor = advisor_with(provider.clone());
        let mut transcript: Transcript = [Turn::user("hi"), Turn::assistant("hello")]
            .into_iter()
            .collect();

        let err = advisor
            .respond(&mut transcript, &Preferences::default(), "Stocks?")
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Provider(_)));
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        let assistant_turns = transcript
            .turns()
            .iter()
            .filter(|t| t.role == Role::Assistant)
            .count();
        assert_eq!(assistant_turns, 1);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.turns()[2].content, "Stocks?");
    }

    #[tokio::test]
    async fn all_provider_errors_share_one_message() {
        for error in [
            ProviderError::RateLimited,
            ProviderError::ContentFiltered,
            ProviderError::ApiError("500".into()),
        ] {
            let advisor = advisor_with(Arc::new(MockTextProvider::failing(error)));
            let err = advisor
                .respond(&mut Transcript::new(), &Preferences::default(), "q")
                .await
                .unwrap_err();
            assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        }
    }

    #[tokio::test]
    async fn halted_advisor_never_calls_provider() {
        let provider = Arc::new(
            MockTextProvider::new().with_health_error(ProviderError::Unauthorized("bad".into())),
        );
        let halted = verify_provider(provider.clone()).await;
        assert!(!halted.is_ready());

        let advisor = Advisor::new(halted, PromptBuilder::default());
        let mut transcript = Transcript::new();
        let err = advisor
            .respond(&mut transcript, &Preferences::default(), "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Halted(_)));
        assert_eq!(err.user_message(), INVALID_KEY_MESSAGE);
        assert!(transcript.is_empty());
        assert_eq!(provider.calls(), 0);
        assert_eq!(advisor.halted_reason(), Some(INVALID_KEY_MESSAGE));
    }

    #[tokio::test]
    async fn network_failure_during_verification_stays_ready() {
        let state = verify_provider(Arc::new(
            MockTextProvider::new().with_health_error(ProviderError::NetworkError("dns".into())),
        ))
        .await;
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn missing_key_halts_without_network() {
        let config = ProviderConfig {
            kind: ProviderKind::Gemini,
            api_key: None,
            model: "gemini-test".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            verify_credentials: true,
        };
        let state = resolve_provider(&config).await;
        match state {
            ProviderState::Halted { reason } => assert_eq!(reason, MISSING_KEY_MESSAGE),
            other => panic!("expected halted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_call() {
        let provider = Arc::new(MockTextProvider::new());
        let advisor = advisor_with(provider.clone());
        let mut transcript = Transcript::new();

        let err = advisor
            .respond(&mut transcript, &Preferences::default(), "   ")
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(transcript.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn prompt_carries_persona_preferences_and_window() {
        let provider = Arc::new(MockTextProvider::new());
        let advisor = Advisor::new(
            ProviderState::Ready(provider.clone()),
            PromptBuilder::new(FINANCE_PERSONA, 2),
        );
        let prefs = Preferences {
            risk_tolerance: Some(RiskTolerance::Conservative),
            expertise_level: None,
        };
        let mut transcript = Transcript::new();

        for question in ["one", "two", "three"] {
            advisor
                .respond(&mut transcript, &prefs, question)
                .await
                .unwrap();
        }

        let last = provider.prompts().pop().unwrap();
        assert!(last.starts_with(FINANCE_PERSONA));
        assert!(last.contains("- Risk tolerance: Conservative"));
        assert!(last.contains("Recent conversation:\nuser: two\nassistant: Mock response #2"));
        assert!(!last.contains("user: one"));
        assert!(last.ends_with("User: three"));
        assert_eq!(last.matches("three").count(), 1);
    }

    #[tokio::test]
    async fn follow_ups_are_parsed_from_second_call() {
        let provider = Arc::new(MockTextProvider::with_replies([
            Ok("Diversify.".to_string()),
            Ok("1. What is an index fund?\n2. How often should I rebalance?".to_string()),
        ]));
        let advisor = advisor_with(provider.clone()).with_follow_ups(true);
        let mut transcript = Transcript::new();

        let reply = advisor
            .respond(&mut transcript, &Preferences::default(), "How to invest?")
            .await
            .unwrap();

        assert_eq!(
            reply.follow_ups,
            vec!["What is an index fund?", "How often should I rebalance?"]
        );
        assert_eq!(transcript.len(), 2);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn failed_follow_ups_do_not_fail_the_reply() {
        let provider = Arc::new(MockTextProvider::with_replies([
            Ok("Diversify.".to_string()),
            Err(ProviderError::RateLimited),
        ]));
        let advisor = advisor_with(provider).with_follow_ups(true);
        let mut transcript = Transcript::new();

        let reply = advisor
            .respond(&mut transcript, &Preferences::default(), "How to invest?")
            .await
            .unwrap();

        assert_eq!(reply.text, "Diversify.");
        assert!(reply.follow_ups.is_empty());
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn reset_empties_transcript() {
        let advisor = advisor_with(Arc::new(MockTextProvider::new()));
        let mut transcript: Transcript = [Turn::user("a"), Turn::assistant("b")]
            .into_iter()
            .collect();
        advisor.reset(&mut transcript);
        assert!(transcript.is_empty());
    }
}
