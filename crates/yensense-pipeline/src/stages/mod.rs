//! The eight pipeline stages
//!
//! Every stage receives its collaborators through its constructor and
//! touches nothing but the [`PipelineContext`] it is handed.
//!
//! [`PipelineContext`]: yensense_core::PipelineContext

pub mod calculation;
pub mod data_collection;
pub mod evidence_gathering;
pub mod gap_identification;
pub mod initial_summary;
pub mod reasoning;
pub mod report_generation;
pub mod validation;

pub use calculation::CalculationStage;
pub use data_collection::DataCollectionStage;
pub use evidence_gathering::EvidenceGatheringStage;
pub use gap_identification::GapIdentificationStage;
pub use initial_summary::InitialSummaryStage;
pub use reasoning::ReasoningStage;
pub use report_generation::ReportGenerationStage;
pub use validation::ValidationStage;
