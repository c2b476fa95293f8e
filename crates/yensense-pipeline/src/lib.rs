//! Staged market-narrative pipeline
//!
//! Eight stages turn raw market data into a finished report, each reading
//! what earlier stages left in the shared [`PipelineContext`] and writing its
//! own fields. [`AnalysisPipeline`] runs them in order and applies the abort
//! policy:
//!
//! - data collection leaving `raw_data` empty aborts the run
//! - more errors than the configured ceiling aborts the run
//! - low validation confidence is logged and the run continues
//! - an unmodeled failure aborts only in the two foundational stages
//!
//! ```no_run
//! use std::sync::Arc;
//! use yensense_llm::Analyst;
//! use yensense_market::{MarketConfig, MarketDataFetcher};
//! use yensense_pipeline::{AnalysisPipeline, PipelineConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(MarketDataFetcher::new(&MarketConfig::default().with_env_api_keys())?);
//! let analyst = Arc::new(Analyst::offline());
//! let pipeline = AnalysisPipeline::standard(source, analyst, PipelineConfig::default())?;
//!
//! let run = pipeline.run(true).await;
//! println!("{}: {}", run.state, run.context.title);
//! # Ok(())
//! # }
//! ```
//!
//! [`PipelineContext`]: yensense_core::PipelineContext

pub mod config;
pub mod orchestrator;
pub mod persistence;
pub mod stages;

mod text;

#[cfg(test)]
mod testing;

pub use config::{PipelineConfig, PipelineConfigBuilder, ReportKind};
pub use orchestrator::{
    AbortReason, AnalysisPipeline, AnalysisPipelineBuilder, PipelineRun, RunState,
};
pub use persistence::{JsonFileSink, PersistError, SnapshotSink};
