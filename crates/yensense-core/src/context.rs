//! Shared pipeline context
//!
//! A [`PipelineContext`] is created empty at the start of a run and threaded
//! through every stage by mutable reference. Each stage owns the fields it
//! writes; the error log is append-only.

use crate::data::{
    AnalysisRecord, Calculations, EnhancedData, RawData, ReportSections, ValidationResults,
};
use crate::Result;
use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Mutable record accumulating every stage's output
///
/// # Example
///
/// ```
/// use yensense_core::PipelineContext;
///
/// let mut ctx = PipelineContext::new();
/// ctx.add_stage_output("data_collection", serde_json::json!({"sources_fetched": 8}));
/// ctx.add_error("FX feed timed out");
///
/// assert_eq!(ctx.errors().len(), 1);
/// assert!(ctx.errors()[0].ends_with("] FX feed timed out"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    /// Written by data collection
    pub raw_data: RawData,
    /// Written by the initial summary stage
    pub summary: String,
    /// Written by evidence gathering
    pub enhanced_data: EnhancedData,
    /// Written by gap identification
    pub questions: Vec<String>,
    /// Written by reasoning
    pub analysis_plan: Vec<AnalysisRecord>,
    /// Written by calculation
    pub calculations: Option<Calculations>,
    /// Written by validation
    pub validation_results: Option<ValidationResults>,
    /// Written by report generation
    pub report_sections: ReportSections,
    pub final_report: String,
    pub title: String,

    stage_outputs: BTreeMap<String, serde_json::Value>,
    errors: Vec<String>,

    #[serde(skip)]
    started_at: DateTime<Local>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            raw_data: RawData::default(),
            summary: String::new(),
            enhanced_data: EnhancedData::new(),
            questions: Vec::new(),
            analysis_plan: Vec::new(),
            calculations: None,
            validation_results: None,
            report_sections: ReportSections::new(),
            final_report: String::new(),
            title: String::new(),
            stage_outputs: BTreeMap::new(),
            errors: Vec::new(),
            started_at: Local::now(),
        }
    }
}

impl PipelineContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// When this context was created
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Record a stage's summary, replacing any earlier entry under the same name
    pub fn add_stage_output(&mut self, name: impl Into<String>, output: serde_json::Value) {
        self.stage_outputs.insert(name.into(), output);
    }

    pub fn get_stage_output(&self, name: &str) -> Option<&serde_json::Value> {
        self.stage_outputs.get(name)
    }

    pub fn stage_outputs(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.stage_outputs
    }

    /// Append a timestamped entry to the error log
    pub fn add_error(&mut self, message: impl Display) {
        let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
        tracing::debug!(error = %message, "Recording pipeline error");
        self.errors.push(format!("[{timestamp}] {message}"));
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Flat snapshot of every field, for debugging and audit only
    pub fn to_serializable(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
