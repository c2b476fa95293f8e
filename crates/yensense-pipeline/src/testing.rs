//! Test doubles shared by the stage and orchestrator tests

use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use yensense_core::{PipelineContext, RawData, Result, Stage, StageId};
use yensense_llm::CompletionService;
use yensense_market::MarketDataSource;

mock! {
    pub Analyst {}

    #[async_trait]
    impl CompletionService for Analyst {
        async fn complete(&self, prompt: &str, system_prompt: &str, max_tokens: usize) -> String;
    }
}

mock! {
    pub Source {}

    #[async_trait]
    impl MarketDataSource for Source {
        async fn fetch_all(&self) -> RawData;
    }
}

/// Analyst answering every prompt with the same text
pub fn canned_analyst(reply: &'static str) -> MockAnalyst {
    let mut analyst = MockAnalyst::new();
    analyst
        .expect_complete()
        .returning(move |_, _, _| reply.to_string());
    analyst
}

/// What a [`CountingStage`] does when executed
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    AddErrors(usize),
    Fail,
    Panic,
}

/// Stub stage counting its invocations
///
/// A data-collection stub fills `raw_data` with fallback values so the run
/// can continue past the first stage.
pub struct CountingStage {
    id: StageId,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl CountingStage {
    pub fn new(id: StageId, behavior: Behavior) -> Self {
        Self {
            id,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Stage for CountingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.id == StageId::DataCollection {
            context.raw_data = RawData::fallback();
        }
        // Each stub sees exactly the outputs of the stubs before it
        let seen = context.stage_outputs().len();
        context.add_stage_output(self.id.key(), serde_json::json!({ "outputs_seen": seen }));

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::AddErrors(n) => {
                for i in 0..n {
                    context.add_error(format!("{} error {i}", self.id));
                }
                Ok(())
            }
            Behavior::Fail => Err(yensense_core::Error::Generic(format!("{} failed", self.id))),
            Behavior::Panic => panic!("{} panicked", self.id),
        }
    }
}
