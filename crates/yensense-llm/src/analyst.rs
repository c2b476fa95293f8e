//! The completion collaborator used by pipeline stages
//!
//! Stages never see provider errors. [`Analyst`] turns every failure (no
//! provider configured, HTTP or quota errors, timeouts, empty replies) into
//! [`FALLBACK_ANALYSIS`], so a stage always receives some text to parse.

use crate::{CompletionRequest, LLMError, LLMProvider, Message, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Returned whenever a completion cannot be produced
pub const FALLBACK_ANALYSIS: &str = "Market conditions remain in focus as investors monitor central bank policy divergence between the Fed and BOJ. Current data suggests cautious positioning with attention to inflation trends and policy communications.";

/// Used when a caller passes an empty system prompt
pub const STRATEGIST_SYSTEM_PROMPT: &str = "You are a senior Japan macro and FX strategist at a global investment bank. \
You write concise, data-driven commentary on USD/JPY, JGB yields, BOJ policy and Japanese money markets. \
Ground every statement in the figures you are given, flag uncertainty explicitly and avoid sensational language.";

/// Text-completion collaborator
///
/// Implementations must not fail: on any problem they return a fixed
/// fallback sentence instead.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, system_prompt: &str, max_tokens: usize) -> String;
}

/// Model settings for [`Analyst`]
#[derive(Debug, Clone)]
pub struct AnalystConfig {
    pub model: String,
    pub temperature: f32,
    /// Upper bound on a single completion, on top of the provider's own timeout
    pub timeout: Duration,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

impl AnalystConfig {
    /// Override the model from `OPENAI_MODEL` when set
    pub fn with_env_model(mut self) -> Self {
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        self
    }
}

/// [`CompletionService`] backed by an optional [`LLMProvider`]
///
/// Without a provider (offline mode) every call returns the fallback text.
pub struct Analyst {
    provider: Option<Arc<dyn LLMProvider>>,
    config: AnalystConfig,
}

impl Analyst {
    pub fn new(provider: Arc<dyn LLMProvider>, config: AnalystConfig) -> Self {
        Self {
            provider: Some(provider),
            config,
        }
    }

    /// An analyst that never calls out
    pub fn offline() -> Self {
        Self {
            provider: None,
            config: AnalystConfig::default(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.provider.is_some()
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    async fn try_complete(
        &self,
        provider: &dyn LLMProvider,
        prompt: &str,
        system_prompt: &str,
        max_tokens: usize,
    ) -> Result<String> {
        let system = if system_prompt.trim().is_empty() {
            STRATEGIST_SYSTEM_PROMPT
        } else {
            system_prompt
        };

        let request = CompletionRequest::builder(&self.config.model)
            .system(system)
            .add_message(Message::user(prompt))
            .max_tokens(max_tokens)
            .temperature(self.config.temperature)
            .build();

        let response = tokio::time::timeout(self.config.timeout, provider.complete(request))
            .await
            .map_err(|_| LLMError::Timeout(self.config.timeout.as_secs()))??;

        let text = response.message.text().trim();
        if text.is_empty() {
            return Err(LLMError::UnexpectedResponse("empty completion".to_string()));
        }
        debug!(output_tokens = response.usage.output_tokens, "Completion received");
        Ok(text.to_string())
    }
}

#[async_trait]
impl CompletionService for Analyst {
    #[instrument(skip(self, prompt, system_prompt), fields(model = %self.config.model))]
    async fn complete(&self, prompt: &str, system_prompt: &str, max_tokens: usize) -> String {
        let Some(provider) = self.provider.as_deref() else {
            debug!("No provider configured, using fallback analysis");
            return FALLBACK_ANALYSIS.to_string();
        };

        match self
            .try_complete(provider, prompt, system_prompt, max_tokens)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Completion failed, using fallback analysis: {}", e);
                FALLBACK_ANALYSIS.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockLLMProvider;
    use crate::{CompletionResponse, StopReason, TokenUsage};

    fn reply(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    #[tokio::test]
    async fn test_returns_provider_text() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_complete()
            .withf(|req| {
                req.max_tokens == 800
                    && req.system.as_deref() == Some("Be factual.")
                    && req.messages[0].text() == "Summarize"
            })
            .times(1)
            .returning(|_| Ok(reply("  USD/JPY closed at 147.25.  ")));

        let analyst = Analyst::new(Arc::new(provider), AnalystConfig::default());
        let text = analyst.complete("Summarize", "Be factual.", 800).await;
        assert_eq!(text, "USD/JPY closed at 147.25.");
    }

    #[tokio::test]
    async fn test_empty_system_prompt_uses_strategist() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_complete()
            .withf(|req| req.system.as_deref() == Some(STRATEGIST_SYSTEM_PROMPT))
            .times(1)
            .returning(|_| Ok(reply("ok")));

        let analyst = Analyst::new(Arc::new(provider), AnalystConfig::default());
        assert_eq!(analyst.complete("prompt", "", 50).await, "ok");
    }

    #[tokio::test]
    async fn test_provider_error_returns_fallback() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(LLMError::RateLimitExceeded("quota".to_string())));

        let analyst = Analyst::new(Arc::new(provider), AnalystConfig::default());
        assert_eq!(analyst.complete("prompt", "", 50).await, FALLBACK_ANALYSIS);
    }

    #[tokio::test]
    async fn test_empty_reply_returns_fallback() {
        let mut provider = MockLLMProvider::new();
        provider.expect_complete().returning(|_| Ok(reply("   ")));

        let analyst = Analyst::new(Arc::new(provider), AnalystConfig::default());
        assert_eq!(analyst.complete("prompt", "", 50).await, FALLBACK_ANALYSIS);
    }

    #[tokio::test]
    async fn test_offline_returns_fallback() {
        let analyst = Analyst::offline();
        assert!(!analyst.is_online());
        assert_eq!(analyst.complete("prompt", "", 50).await, FALLBACK_ANALYSIS);
    }
}
