//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use yensense_core::{Error, Result};

/// Questions kept by gap identification before padding stops
pub const MIN_QUESTIONS: usize = 3;

/// Which document the report stage produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    #[default]
    #[serde(alias = "weekly")]
    WeeklyReport,
    #[serde(alias = "daily")]
    DailyBrief,
}

impl ReportKind {
    /// Top-level heading of the compiled report
    pub fn heading(self) -> &'static str {
        match self {
            Self::WeeklyReport => "YenSense AI Weekly Strategist Report",
            Self::DailyBrief => "YenSense AI Daily Market Brief",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeeklyReport => f.write_str("weekly"),
            Self::DailyBrief => f.write_str("daily"),
        }
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "weekly_report" => Ok(Self::WeeklyReport),
            "daily" | "daily_brief" => Ok(Self::DailyBrief),
            other => Err(Error::Config(format!("unknown report kind '{other}'"))),
        }
    }
}

/// Limits and thresholds applied by the orchestrator and its stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// A run aborts once more errors than this have been recorded
    pub error_ceiling: usize,

    /// Validation confidence below this is logged as degraded quality
    pub low_confidence_threshold: u8,

    /// Evidence topics taken from the model's list
    pub max_evidence_topics: usize,

    /// Questions kept by gap identification
    pub max_questions: usize,

    /// Plan entries that get a narrative calculation
    pub max_calculations: usize,

    /// When every reasoning block falls back, keep only this many records
    pub reasoning_fallback_cap: Option<usize>,

    pub report_kind: ReportKind,

    /// Where the JSON sink writes context snapshots
    pub snapshot_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            error_ceiling: 10,
            low_confidence_threshold: 30,
            max_evidence_topics: 5,
            max_questions: 7,
            max_calculations: 5,
            reasoning_fallback_cap: None,
            report_kind: ReportKind::WeeklyReport,
            snapshot_dir: PathBuf::from("logs/pipeline_contexts"),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_questions < MIN_QUESTIONS {
            return Err(Error::Config(format!(
                "max_questions must be at least {MIN_QUESTIONS}, got {}",
                self.max_questions
            )));
        }

        if self.low_confidence_threshold > 100 {
            return Err(Error::Config(
                "low_confidence_threshold must be within 0-100".to_string(),
            ));
        }

        if self.max_evidence_topics == 0 {
            return Err(Error::Config(
                "max_evidence_topics must be greater than 0".to_string(),
            ));
        }

        if self.reasoning_fallback_cap == Some(0) {
            return Err(Error::Config(
                "reasoning_fallback_cap must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn error_ceiling(mut self, ceiling: usize) -> Self {
        self.config.error_ceiling = ceiling;
        self
    }

    pub fn low_confidence_threshold(mut self, threshold: u8) -> Self {
        self.config.low_confidence_threshold = threshold;
        self
    }

    pub fn max_evidence_topics(mut self, max: usize) -> Self {
        self.config.max_evidence_topics = max;
        self
    }

    pub fn max_questions(mut self, max: usize) -> Self {
        self.config.max_questions = max;
        self
    }

    pub fn max_calculations(mut self, max: usize) -> Self {
        self.config.max_calculations = max;
        self
    }

    pub fn reasoning_fallback_cap(mut self, cap: usize) -> Self {
        self.config.reasoning_fallback_cap = Some(cap);
        self
    }

    pub fn report_kind(mut self, kind: ReportKind) -> Self {
        self.config.report_kind = kind;
        self
    }

    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.snapshot_dir = dir.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.error_ceiling, 10);
        assert_eq!(config.low_confidence_threshold, 30);
        assert_eq!(config.max_questions, 7);
        assert_eq!(config.reasoning_fallback_cap, None);
        assert_eq!(config.snapshot_dir, PathBuf::from("logs/pipeline_contexts"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validates() {
        let config = PipelineConfig::builder()
            .report_kind(ReportKind::DailyBrief)
            .reasoning_fallback_cap(3)
            .build()
            .unwrap();
        assert_eq!(config.report_kind, ReportKind::DailyBrief);
        assert_eq!(config.reasoning_fallback_cap, Some(3));

        assert!(matches!(
            PipelineConfig::builder().max_questions(2).build(),
            Err(Error::Config(_))
        ));
        assert!(PipelineConfig::builder().low_confidence_threshold(101).build().is_err());
        assert!(PipelineConfig::builder().reasoning_fallback_cap(0).build().is_err());
    }

    #[test]
    fn test_report_kind_parsing() {
        assert_eq!("weekly".parse::<ReportKind>().unwrap(), ReportKind::WeeklyReport);
        assert_eq!("Daily".parse::<ReportKind>().unwrap(), ReportKind::DailyBrief);
        assert!("monthly".parse::<ReportKind>().is_err());
        assert_eq!(ReportKind::DailyBrief.heading(), "YenSense AI Daily Market Brief");
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "error_ceiling": 4,
            "report_kind": "daily"
        }))
        .unwrap();
        assert_eq!(config.error_ceiling, 4);
        assert_eq!(config.report_kind, ReportKind::DailyBrief);
        assert_eq!(config.max_calculations, 5);
    }
}
