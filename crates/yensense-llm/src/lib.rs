//! Text-completion layer for YenSense
//!
//! This crate provides:
//!
//! - Message and completion request/response types
//! - The [`LLMProvider`] trait and an OpenAI-compatible provider (feature `openai`)
//! - The [`CompletionService`] collaborator consumed by pipeline stages, and
//!   [`Analyst`], its implementation that never fails

pub mod analyst;
pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use analyst::{Analyst, AnalystConfig, CompletionService, FALLBACK_ANALYSIS, STRATEGIST_SYSTEM_PROMPT};
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
