//! Mock provider implementation for tests and offline demos.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::services::prompt::FOLLOW_UP_INSTRUCTION;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock text provider.
///
/// Replies are taken from a scripted queue first; once the queue is drained
/// it answers with a numbered canned reply. Every prompt is recorded so tests
/// can inspect what would have gone over the wire.
#[derive(Default)]
pub struct MockTextProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback_error: Option<ProviderError>,
    health: Option<ProviderError>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockTextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies (or failures) returned in order.
    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ProviderError>>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A provider whose every call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            fallback_error: Some(error),
            ..Self::default()
        }
    }

    /// Make `health_check` fail with `error`.
    pub fn with_health_error(mut self, error: ProviderError) -> Self {
        self.health = Some(error);
        self
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self, prompt: &str, call: usize) -> Result<String, ProviderError> {
        if let Some(scripted) = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            return scripted;
        }

        if let Some(err) = &self.fallback_error {
            return Err(err.clone());
        }

        if prompt.starts_with(FOLLOW_UP_INSTRUCTION) {
            return Ok("How much should I keep in an emergency fund?\n\
                       What is the difference between an index fund and an ETF?\n\
                       How do taxes affect my investment returns?"
                .to_string());
        }

        Ok(format!(
            "Mock response #{}. This is not professional financial advice.",
            call
        ))
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let text = self.next_reply(prompt, call)?;

        Ok(ProviderResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match &self.health {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
