//! Core abstractions for the YenSense analysis pipeline
//!
//! This crate defines the shared [`PipelineContext`], the [`Stage`] contract every
//! pipeline step implements, and the typed records the stages exchange.

pub mod context;
pub mod data;
pub mod error;
pub mod outcome;
pub mod stage;

pub use context::PipelineContext;
pub use data::{
    AnalysisRecord, BasicMetrics, CalculationResult, Calculations, EnhancedData,
    FALLBACK_EUR_JPY, FALLBACK_JGB_10Y, FALLBACK_USD_JPY, FxRates, MacroData, NEUTRAL_SENTIMENT,
    NewsItem, NewsSource, RawCategory, RawData, RepoRates, ReportSection, ReportSections,
    Sentiment, SupplementalRecord, ValidationResults, YieldCurves,
};
pub use error::{Error, Result};
pub use outcome::ParseOutcome;
pub use stage::{Stage, StageId};
