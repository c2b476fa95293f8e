//! Error types for yensense-core

use thiserror::Error;

/// Result type alias for yensense-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
///
/// The first five variants are the recoverable/abort taxonomy the orchestrator
/// reasons about. Their `Display` output is what lands in the context error log.
#[derive(Error, Debug)]
pub enum Error {
    /// A collaborator fetch failed and a fallback was substituted
    #[error("Fetch failed for {category}: {reason}")]
    Fetch { category: String, reason: String },

    /// Language-model text did not have the expected shape
    #[error("Could not parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// No usable market data after data collection
    #[error("Critical data missing: {0}")]
    CriticalDataMissing(String),

    /// The error log grew past the configured ceiling
    #[error("Error count {count} exceeds ceiling {ceiling}")]
    ExcessiveErrorCount { count: usize, ceiling: usize },

    /// Validation confidence is low; surfaced, never fatal
    #[error("Analysis quality degraded: confidence {confidence} below {threshold}")]
    QualityDegraded { confidence: u8, threshold: u8 },

    /// A stage failed in a way it did not model
    #[error("Pipeline error in {stage}: {message}")]
    StageFailed { stage: String, message: String },

    /// Stage name did not match any known stage
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt construction failed
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error message
    #[error("{0}")]
    Generic(String),
}
