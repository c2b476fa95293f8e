//! Sequential stage runner and abort policy

use crate::config::PipelineConfig;
use crate::persistence::{JsonFileSink, SnapshotSink};
use crate::stages::{
    CalculationStage, DataCollectionStage, EvidenceGatheringStage, GapIdentificationStage,
    InitialSummaryStage, ReasoningStage, ReportGenerationStage, ValidationStage,
};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use yensense_core::{Error, PipelineContext, Result, Stage, StageId};
use yensense_llm::CompletionService;
use yensense_market::MarketDataSource;

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Data collection produced no market data
    CriticalDataMissing,
    /// More errors were recorded than the configured ceiling allows
    ExcessiveErrorCount { count: usize, ceiling: usize },
    /// Data collection or the initial summary failed unexpectedly
    FoundationalStageFailed { stage: StageId, message: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CriticalDataMissing => f.write_str("critical data missing"),
            Self::ExcessiveErrorCount { count, ceiling } => {
                write!(f, "{count} errors exceed ceiling of {ceiling}")
            }
            Self::FoundationalStageFailed { stage, message } => {
                write!(f, "foundational stage {stage} failed: {message}")
            }
        }
    }
}

/// Run lifecycle; transitions only move forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(StageId),
    Aborted(AbortReason),
    Completed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Running(stage) => write!(f, "running {stage}"),
            Self::Aborted(reason) => write!(f, "aborted ({reason})"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct PipelineRun {
    pub run_id: String,
    pub state: RunState,
    pub context: PipelineContext,
    /// Stages that were entered, in order
    pub stages_run: Vec<StageId>,
}

impl PipelineRun {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn into_context(self) -> PipelineContext {
        self.context
    }
}

/// Runs stages in pipeline order over a fresh context
///
/// After every stage the abort policy decides whether the run continues.
/// A stage returning `Err` or panicking is recorded as an error; the run
/// stops only when that stage is foundational.
pub struct AnalysisPipeline {
    stages: Vec<Arc<dyn Stage>>,
    config: PipelineConfig,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl AnalysisPipeline {
    pub fn builder() -> AnalysisPipelineBuilder {
        AnalysisPipelineBuilder::default()
    }

    /// The eight standard stages sharing one data source and one analyst,
    /// with snapshots written to `config.snapshot_dir`
    pub fn standard(
        source: Arc<dyn MarketDataSource>,
        analyst: Arc<dyn CompletionService>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let sink = JsonFileSink::new(config.snapshot_dir.clone());
        Self::builder()
            .stage(Arc::new(DataCollectionStage::new(source)))
            .stage(Arc::new(InitialSummaryStage::new(Arc::clone(&analyst))?))
            .stage(Arc::new(EvidenceGatheringStage::new(
                Arc::clone(&analyst),
                config.max_evidence_topics,
            )))
            .stage(Arc::new(GapIdentificationStage::new(
                Arc::clone(&analyst),
                config.max_questions,
            )?))
            .stage(Arc::new(ReasoningStage::new(
                Arc::clone(&analyst),
                config.reasoning_fallback_cap,
            )?))
            .stage(Arc::new(CalculationStage::new(
                Arc::clone(&analyst),
                config.max_calculations,
            )))
            .stage(Arc::new(ValidationStage::new(Arc::clone(&analyst))?))
            .stage(Arc::new(ReportGenerationStage::new(
                analyst,
                config.report_kind,
            )?))
            .sink(Arc::new(sink))
            .config(config)
            .build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registered stages in execution order
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|stage| stage.id()).collect()
    }

    /// Run every stage, saving a snapshot at the end when `persist` is set
    pub async fn run(&self, persist: bool) -> PipelineRun {
        let stages: Vec<&Arc<dyn Stage>> = self.stages.iter().collect();
        self.execute(&stages, persist).await
    }

    /// Run only the named stages, in pipeline order, without persisting
    ///
    /// Names match a stage's display name or key, ignoring case, `_`, `-`
    /// and a trailing `Stage`. Unknown names are logged and skipped.
    pub async fn run_partial<S: AsRef<str>>(&self, stage_names: &[S]) -> PipelineRun {
        let mut wanted = BTreeSet::new();
        for name in stage_names {
            match name.as_ref().parse::<StageId>() {
                Ok(id) => {
                    wanted.insert(id);
                }
                Err(e) => warn!("Skipping stage name: {}", e),
            }
        }

        let stages: Vec<&Arc<dyn Stage>> = self
            .stages
            .iter()
            .filter(|stage| wanted.contains(&stage.id()))
            .collect();
        for id in &wanted {
            if !stages.iter().any(|stage| stage.id() == *id) {
                warn!(stage = %id, "Requested stage is not registered");
            }
        }
        self.execute(&stages, false).await
    }

    async fn execute(&self, stages: &[&Arc<dyn Stage>], persist: bool) -> PipelineRun {
        let mut context = PipelineContext::new();
        let run_id = context.started_at().format("%Y%m%d_%H%M%S").to_string();
        let mut state = RunState::NotStarted;
        let mut stages_run = Vec::with_capacity(stages.len());

        info!(run_id = %run_id, stages = stages.len(), "Starting pipeline run");

        for stage in stages {
            let id = stage.id();
            state = RunState::Running(id);
            stages_run.push(id);

            let span = info_span!("stage", stage = %id, position = id.position());
            let outcome = AssertUnwindSafe(stage.execute(&mut context))
                .catch_unwind()
                .instrument(span)
                .await;

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };

            if let Some(message) = failure {
                error!(stage = %id, "Stage failed: {}", message);
                context.add_error(Error::StageFailed {
                    stage: id.name().to_string(),
                    message: message.clone(),
                });
                if id.is_foundational() {
                    state = RunState::Aborted(AbortReason::FoundationalStageFailed {
                        stage: id,
                        message,
                    });
                    break;
                }
            } else {
                debug!(stage = %id, "Stage complete");
            }

            if let Some(reason) = self.abort_reason(id, &context) {
                error!(stage = %id, "Aborting pipeline: {}", reason);
                state = RunState::Aborted(reason);
                break;
            }
        }

        if matches!(state, RunState::NotStarted | RunState::Running(_)) {
            state = RunState::Completed;
        }

        if persist {
            self.persist(&context, &run_id).await;
        }

        let confidence = context
            .validation_results
            .as_ref()
            .map(|v| v.confidence_score);
        info!(
            run_id = %run_id,
            state = %state,
            stages_run = stages_run.len(),
            errors = context.errors().len(),
            confidence = ?confidence,
            report_length = context.final_report.len(),
            "Pipeline run finished"
        );

        PipelineRun {
            run_id,
            state,
            context,
            stages_run,
        }
    }

    /// Abort policy applied after each stage
    fn abort_reason(&self, id: StageId, context: &PipelineContext) -> Option<AbortReason> {
        if id == StageId::DataCollection && context.raw_data.is_empty() {
            return Some(AbortReason::CriticalDataMissing);
        }

        if id == StageId::Validation {
            if let Some(results) = &context.validation_results {
                if results.confidence_score < self.config.low_confidence_threshold {
                    warn!(
                        "{}",
                        Error::QualityDegraded {
                            confidence: results.confidence_score,
                            threshold: self.config.low_confidence_threshold,
                        }
                    );
                }
            }
        }

        let count = context.errors().len();
        (count > self.config.error_ceiling).then_some(AbortReason::ExcessiveErrorCount {
            count,
            ceiling: self.config.error_ceiling,
        })
    }

    async fn persist(&self, context: &PipelineContext, run_id: &str) {
        let Some(sink) = &self.sink else {
            debug!("No snapshot sink configured, skipping persistence");
            return;
        };
        match context.to_serializable() {
            Ok(snapshot) => {
                if let Err(e) = sink.save(&snapshot, run_id).await {
                    warn!("Failed to persist pipeline context: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize pipeline context: {}", e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("panicked: {detail}")
}

/// Builder for AnalysisPipeline
#[derive(Default)]
pub struct AnalysisPipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    config: Option<PipelineConfig>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl AnalysisPipelineBuilder {
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration, order the stages and reject duplicates
    pub fn build(mut self) -> Result<AnalysisPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        self.stages.sort_by_key(|stage| stage.id());
        if let Some(pair) = self.stages.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(Error::Config(format!(
                "stage {} registered more than once",
                pair[0].id()
            )));
        }

        Ok(AnalysisPipeline {
            stages: self.stages,
            config,
            sink: self.sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PersistError;
    use crate::testing::{Behavior, CountingStage, MockSource, canned_analyst};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use yensense_core::RawData;

    fn source_returning(data: RawData) -> Arc<MockSource> {
        let mut source = MockSource::new();
        source.expect_fetch_all().return_const(data);
        Arc::new(source)
    }

    /// Stub stages for every position, all with the same behavior
    fn stubs(behavior: Behavior) -> Vec<(StageId, Arc<AtomicUsize>, Arc<dyn Stage>)> {
        StageId::ALL
            .into_iter()
            .map(|id| {
                let stage = CountingStage::new(id, behavior);
                let calls = stage.calls();
                (id, calls, Arc::new(stage) as Arc<dyn Stage>)
            })
            .collect()
    }

    fn pipeline_from(stages: &[(StageId, Arc<AtomicUsize>, Arc<dyn Stage>)]) -> AnalysisPipeline {
        stages
            .iter()
            .fold(AnalysisPipeline::builder(), |builder, (_, _, stage)| {
                builder.stage(Arc::clone(stage))
            })
            .build()
            .unwrap()
    }

    struct FailingSink;

    #[async_trait]
    impl SnapshotSink for FailingSink {
        async fn save(&self, _: &serde_json::Value, _: &str) -> std::result::Result<(), PersistError> {
            Err(PersistError::Io {
                path: "/nowhere".into(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .snapshot_dir(dir.path())
            .build()
            .unwrap();
        let pipeline = AnalysisPipeline::standard(
            source_returning(RawData::fallback()),
            Arc::new(canned_analyst("Canned analysis text.")),
            config,
        )
        .unwrap();

        let run = pipeline.run(true).await;

        assert_eq!(run.state, RunState::Completed);
        assert_eq!(run.stages_run, StageId::ALL.to_vec());
        let ctx = &run.context;
        assert!(ctx.errors().is_empty(), "{:?}", ctx.errors());
        assert!(!ctx.final_report.is_empty());
        assert_eq!(ctx.questions.len(), 3);
        assert_eq!(ctx.analysis_plan.len(), ctx.questions.len());
        assert_eq!(ctx.report_sections.len(), 5);
        assert!(ctx.title.chars().count() >= 10);
        assert_eq!(ctx.stage_outputs().len(), 8);

        let snapshot = dir
            .path()
            .join(format!("pipeline_context_{}.json", run.run_id));
        assert!(snapshot.exists());
    }

    #[tokio::test]
    async fn test_empty_fetch_aborts_after_first_stage() {
        let mut stages = stubs(Behavior::Succeed);
        stages[0].2 = Arc::new(DataCollectionStage::new(source_returning(RawData::default())));
        let pipeline = pipeline_from(&stages);

        let run = pipeline.run(false).await;

        assert_eq!(run.state, RunState::Aborted(AbortReason::CriticalDataMissing));
        assert_eq!(run.stages_run, vec![StageId::DataCollection]);
        assert!(!run.context.errors().is_empty());
        assert!(run.context.final_report.is_empty());
        for (id, calls, _) in &stages[1..] {
            assert_eq!(calls.load(Ordering::SeqCst), 0, "{id} should not run");
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_on_shared_context() {
        let stages = stubs(Behavior::Succeed);
        let run = pipeline_from(&stages).run(false).await;

        assert!(run.is_completed());
        for (position, id) in StageId::ALL.iter().enumerate() {
            let output = run.context.get_stage_output(id.key()).unwrap();
            assert_eq!(output["outputs_seen"], position);
        }
        assert!(stages.iter().all(|(_, calls, _)| calls.load(Ordering::SeqCst) == 1));
    }

    #[tokio::test]
    async fn test_foundational_failure_aborts() {
        for behavior in [Behavior::Fail, Behavior::Panic] {
            let mut stages = stubs(Behavior::Succeed);
            let failing = CountingStage::new(StageId::InitialSummary, behavior);
            stages[1].2 = Arc::new(failing);

            let run = pipeline_from(&stages).run(false).await;

            assert!(matches!(
                run.state,
                RunState::Aborted(AbortReason::FoundationalStageFailed {
                    stage: StageId::InitialSummary,
                    ..
                })
            ));
            assert_eq!(run.context.errors().len(), 1);
            assert!(run.context.errors()[0].contains("Pipeline error in InitialSummary"));
            assert_eq!(stages[2].1.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_later_failure_continues() {
        let mut stages = stubs(Behavior::Succeed);
        stages[4].2 = Arc::new(CountingStage::new(StageId::Reasoning, Behavior::Panic));
        stages[5].2 = Arc::new(CountingStage::new(StageId::Calculation, Behavior::Fail));

        let run = pipeline_from(&stages).run(false).await;

        assert_eq!(run.state, RunState::Completed);
        assert_eq!(run.stages_run.len(), 8);
        assert_eq!(run.context.errors().len(), 2);
        assert!(run.context.errors()[0].contains("panicked: Reasoning panicked"));
        assert!(run.context.errors()[1].contains("Calculation failed"));
        assert_eq!(stages[7].1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_ceiling_aborts() {
        let mut stages = stubs(Behavior::Succeed);
        stages[2].2 = Arc::new(CountingStage::new(
            StageId::EvidenceGathering,
            Behavior::AddErrors(11),
        ));

        let run = pipeline_from(&stages).run(false).await;

        assert_eq!(
            run.state,
            RunState::Aborted(AbortReason::ExcessiveErrorCount {
                count: 11,
                ceiling: 10
            })
        );
        assert_eq!(stages[3].1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_pushing_past_ceiling_aborts() {
        let mut stages = stubs(Behavior::Succeed);
        stages[2].2 = Arc::new(CountingStage::new(
            StageId::EvidenceGathering,
            Behavior::AddErrors(10),
        ));
        stages[4].2 = Arc::new(CountingStage::new(StageId::Reasoning, Behavior::Fail));

        let run = pipeline_from(&stages).run(false).await;

        assert_eq!(
            run.state,
            RunState::Aborted(AbortReason::ExcessiveErrorCount {
                count: 11,
                ceiling: 10
            })
        );
        assert_eq!(run.stages_run.len(), 5);
        assert!(run.context.errors()[10].contains("Reasoning failed"));
        assert_eq!(stages[5].1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_at_ceiling_do_not_abort() {
        let mut stages = stubs(Behavior::Succeed);
        stages[2].2 = Arc::new(CountingStage::new(
            StageId::EvidenceGathering,
            Behavior::AddErrors(10),
        ));
        let run = pipeline_from(&stages).run(false).await;
        assert!(run.is_completed());
    }

    #[tokio::test]
    async fn test_low_confidence_does_not_abort() {
        let mut source = MockSource::new();
        source.expect_fetch_all().return_const(RawData::fallback());
        let mut analyst = crate::testing::MockAnalyst::new();
        analyst
            .expect_complete()
            .returning(|prompt, _, _| {
                if prompt.contains("Confidence (0-100)") {
                    "Major issues:\n- Conclusions unsupported\nConfidence: 12".to_string()
                } else {
                    "Some analysis text.".to_string()
                }
            });

        let pipeline = AnalysisPipeline::standard(
            Arc::new(source),
            Arc::new(analyst),
            PipelineConfig::default(),
        )
        .unwrap();
        let run = pipeline.run(false).await;

        assert!(run.is_completed());
        let results = run.context.validation_results.as_ref().unwrap();
        assert_eq!(results.confidence_score, 12);
        assert!(!results.overall_valid);
        assert!(!run.context.final_report.is_empty());
    }

    #[tokio::test]
    async fn test_run_partial_selects_stages_in_order() {
        let stages = stubs(Behavior::Succeed);
        let pipeline = pipeline_from(&stages);

        let run = pipeline
            .run_partial(&["validation", "DataCollectionStage", "bogus", "gap-identification"])
            .await;

        assert!(run.is_completed());
        assert_eq!(
            run.stages_run,
            vec![
                StageId::DataCollection,
                StageId::GapIdentification,
                StageId::Validation
            ]
        );
        assert_eq!(stages[1].1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_run() {
        let stages = stubs(Behavior::Succeed);
        let pipeline = stages
            .iter()
            .fold(AnalysisPipeline::builder(), |b, (_, _, stage)| {
                b.stage(Arc::clone(stage))
            })
            .sink(Arc::new(FailingSink))
            .build()
            .unwrap();

        let run = pipeline.run(true).await;
        assert!(run.is_completed());
        assert!(run.context.errors().is_empty());
    }

    #[test]
    fn test_builder_rejects_duplicates_and_sorts() {
        let result = AnalysisPipeline::builder()
            .stage(Arc::new(CountingStage::new(StageId::Reasoning, Behavior::Succeed)))
            .stage(Arc::new(CountingStage::new(StageId::Reasoning, Behavior::Succeed)))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));

        let pipeline = AnalysisPipeline::builder()
            .stage(Arc::new(CountingStage::new(StageId::Validation, Behavior::Succeed)))
            .stage(Arc::new(CountingStage::new(StageId::DataCollection, Behavior::Succeed)))
            .build()
            .unwrap();
        assert_eq!(
            pipeline.stage_ids(),
            vec![StageId::DataCollection, StageId::Validation]
        );
    }
}
