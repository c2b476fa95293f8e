//! Stage abstraction
//!
//! A stage is one unit of work in the pipeline. It reads the context fields
//! produced by earlier stages and writes the fields it owns. Recoverable
//! failures are handled inside the stage: it records them with
//! [`PipelineContext::add_error`] and leaves its fields at a deterministic
//! fallback. An `Err` returned from [`Stage::execute`] signals a failure the
//! stage did not model.

use crate::{Error, PipelineContext, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Identity of each pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    DataCollection,
    InitialSummary,
    EvidenceGathering,
    GapIdentification,
    Reasoning,
    Calculation,
    Validation,
    ReportGeneration,
}

impl StageId {
    /// All stages in pipeline order
    pub const ALL: [StageId; 8] = [
        StageId::DataCollection,
        StageId::InitialSummary,
        StageId::EvidenceGathering,
        StageId::GapIdentification,
        StageId::Reasoning,
        StageId::Calculation,
        StageId::Validation,
        StageId::ReportGeneration,
    ];

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Self::DataCollection => "DataCollection",
            Self::InitialSummary => "InitialSummary",
            Self::EvidenceGathering => "EvidenceGathering",
            Self::GapIdentification => "GapIdentification",
            Self::Reasoning => "Reasoning",
            Self::Calculation => "Calculation",
            Self::Validation => "Validation",
            Self::ReportGeneration => "ReportGeneration",
        }
    }

    /// Key used in `stage_outputs`
    pub fn key(self) -> &'static str {
        match self {
            Self::DataCollection => "data_collection",
            Self::InitialSummary => "initial_summary",
            Self::EvidenceGathering => "evidence_gathering",
            Self::GapIdentification => "gap_identification",
            Self::Reasoning => "reasoning",
            Self::Calculation => "calculation",
            Self::Validation => "validation",
            Self::ReportGeneration => "report_generation",
        }
    }

    /// 1-based position in the pipeline
    pub fn position(self) -> usize {
        self as usize + 1
    }

    /// Stages whose unmodeled failure aborts the run
    pub fn is_foundational(self) -> bool {
        matches!(self, Self::DataCollection | Self::InitialSummary)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageId {
    type Err = Error;

    /// Accepts `DataCollection`, `DataCollectionStage` or `data_collection`,
    /// ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        let normalized = normalized.strip_suffix("stage").unwrap_or(&normalized);

        Self::ALL
            .into_iter()
            .find(|id| id.name().to_lowercase() == normalized)
            .ok_or_else(|| Error::UnknownStage(s.to_string()))
    }
}

/// One unit of work in the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which stage this is
    fn id(&self) -> StageId;

    /// Transform the context in place
    async fn execute(&self, context: &mut PipelineContext) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TitleStage;

    #[async_trait]
    impl Stage for TitleStage {
        fn id(&self) -> StageId {
            StageId::ReportGeneration
        }

        async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
            context.title = "Weekly yen outlook".to_string();
            Ok(())
        }
    }

    #[test]
    fn test_positions_follow_order() {
        for (i, id) in StageId::ALL.iter().enumerate() {
            assert_eq!(id.position(), i + 1);
        }
        assert!(StageId::DataCollection.is_foundational());
        assert!(StageId::InitialSummary.is_foundational());
        assert!(!StageId::EvidenceGathering.is_foundational());
    }

    #[test]
    fn test_parse_stage_names() {
        assert_eq!("DataCollection".parse::<StageId>().unwrap(), StageId::DataCollection);
        assert_eq!("ValidationStage".parse::<StageId>().unwrap(), StageId::Validation);
        assert_eq!("report_generation".parse::<StageId>().unwrap(), StageId::ReportGeneration);
        assert_eq!(" gapidentification ".parse::<StageId>().unwrap(), StageId::GapIdentification);
        assert!(matches!("Forecasting".parse::<StageId>(), Err(Error::UnknownStage(_))));
    }

    #[tokio::test]
    async fn test_stage_mutates_context() {
        let mut ctx = PipelineContext::new();
        TitleStage.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.title, "Weekly yen outlook");
        assert_eq!(TitleStage.id().key(), "report_generation");
    }
}
