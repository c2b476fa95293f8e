//! Stage 4: analytical questions the report should answer

use crate::config::MIN_QUESTIONS;
use crate::text::ListMarkers;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use yensense_core::{ParseOutcome, PipelineContext, Result, Stage, StageId};
use yensense_llm::CompletionService;
use yensense_prompt::PromptBuilder;

const SYSTEM_PROMPT: &str = "You are a senior FX strategist reviewing a junior analyst's notes. \
Ask the questions a portfolio manager would ask.";

const MAX_TOKENS: usize = 600;

/// Appended when the model produces fewer than three questions
pub const FALLBACK_QUESTIONS: [&str; 3] = [
    "What is driving the current USD/JPY level relative to rate differentials?",
    "How does current market positioning compare to historical norms?",
    "What are the key risks to the current market consensus?",
];

/// Question categories, checked in order
const CATEGORIES: [(&str, &[&str]); 5] = [
    (
        "policy",
        &["boj", "fed", "policy", "central bank", "intervention", "rate hike"],
    ),
    (
        "technical",
        &["technical", "support", "resistance", "trend", "moving average", "momentum"],
    ),
    (
        "fundamental",
        &["inflation", "cpi", "gdp", "growth", "differential", "yield", "trade balance"],
    ),
    (
        "positioning",
        &["positioning", "flows", "carry", "speculative", "cftc"],
    ),
    ("risk", &["risk", "volatility", "scenario", "shock", "tail"]),
];

fn categorize(question: &str) -> &'static str {
    let lower = question.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or("other", |(name, _)| name)
}

/// Count per category, every category present
fn category_counts(questions: &[String]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = CATEGORIES
        .iter()
        .map(|(name, _)| (*name, 0))
        .chain([("other", 0)])
        .collect();
    for question in questions {
        *counts.entry(categorize(question)).or_default() += 1;
    }
    counts
}

/// Turns the analyst's notes into a list of open questions
pub struct GapIdentificationStage {
    analyst: Arc<dyn CompletionService>,
    markers: ListMarkers,
    max_questions: usize,
}

impl GapIdentificationStage {
    pub fn new(analyst: Arc<dyn CompletionService>, max_questions: usize) -> Result<Self> {
        Ok(Self {
            analyst,
            markers: ListMarkers::new()?,
            max_questions,
        })
    }

    /// Question lines of `response`, padded and truncated to the configured bounds
    pub(crate) fn parse_questions(&self, response: &str) -> ParseOutcome<Vec<String>> {
        let kept: Vec<String> = response
            .lines()
            .filter(|line| line.contains('?'))
            .map(|line| self.markers.strip_item(line))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let outcome = if kept.len() >= MIN_QUESTIONS {
            ParseOutcome::Parsed(kept)
        } else {
            let mut padded = kept;
            padded.extend(FALLBACK_QUESTIONS.iter().map(|q| (*q).to_string()));
            ParseOutcome::Fallback(padded)
        };

        outcome.map(|mut questions| {
            questions.truncate(self.max_questions);
            questions
        })
    }

    fn prompt(context: &PipelineContext) -> String {
        let evidence: Vec<&str> = context.enhanced_data.keys().map(String::as_str).collect();
        PromptBuilder::new()
            .text(
                "Review the market summary and supporting evidence below. Identify 5-7 \
                 analytical questions that must be answered to explain where USD/JPY and \
                 Japanese rates are heading.",
            )
            .newline()
            .text("Write each question on its own line, ending with a question mark.")
            .section("Summary")
            .text(context.summary.as_str())
            .newline()
            .section("Supporting evidence")
            .when(evidence.is_empty(), "- none\n")
            .bullets(evidence)
            .build()
    }
}

#[async_trait]
impl Stage for GapIdentificationStage {
    fn id(&self) -> StageId {
        StageId::GapIdentification
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let response = self
            .analyst
            .complete(&Self::prompt(context), SYSTEM_PROMPT, MAX_TOKENS)
            .await;

        let questions = self.parse_questions(&response);
        if questions.is_fallback() {
            warn!("Fewer than {MIN_QUESTIONS} questions in response, adding standard questions");
        }

        let fallback = questions.is_fallback();
        context.questions = questions.into_inner();
        let categories = category_counts(&context.questions);
        info!(
            questions_identified = context.questions.len(),
            "Analytical gaps identified"
        );

        context.add_stage_output(
            StageId::GapIdentification.key(),
            json!({
                "questions_identified": context.questions.len(),
                "categories": categories,
                "fallback": fallback,
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAnalyst, canned_analyst};

    fn stage(max_questions: usize) -> GapIdentificationStage {
        GapIdentificationStage::new(Arc::new(MockAnalyst::new()), max_questions).unwrap()
    }

    #[test]
    fn test_keeps_question_lines_only() {
        let response = "Here are the key questions:\n\
                        1. Is the BOJ likely to hike in October?\n\
                        2. How wide is the 10Y rate differential?\n\
                        Some commentary without a question.\n\
                        - Are speculative shorts crowded?\n";
        let questions = stage(7).parse_questions(response);

        assert!(!questions.is_fallback());
        assert_eq!(
            questions.into_inner(),
            vec![
                "Is the BOJ likely to hike in October?",
                "How wide is the 10Y rate differential?",
                "Are speculative shorts crowded?",
            ]
        );
    }

    #[test]
    fn test_pads_with_fallback_questions() {
        let questions = stage(7).parse_questions("Will the Fed cut?\nNo more.");
        assert!(questions.is_fallback());
        let questions = questions.into_inner();
        assert_eq!(questions.len(), 4);
        assert_eq!(questions[0], "Will the Fed cut?");
        assert_eq!(questions[1..], FALLBACK_QUESTIONS);
    }

    #[test]
    fn test_truncates_to_max() {
        let response = (1..=10)
            .map(|i| format!("{i}. Question number {i}?"))
            .collect::<Vec<_>>()
            .join("\n");
        let questions = stage(7).parse_questions(&response).into_inner();
        assert_eq!(questions.len(), 7);
        assert_eq!(questions[6], "Question number 7?");

        let padded = stage(4).parse_questions("").into_inner();
        assert_eq!(padded.len(), 3);
    }

    #[test]
    fn test_categories() {
        assert_eq!(categorize("Will the BOJ intervene?"), "policy");
        assert_eq!(categorize("Is 150 acting as resistance?"), "technical");
        assert_eq!(categorize("Does CPI justify higher yields?"), "fundamental");
        assert_eq!(categorize("Is the carry trade crowded?"), "positioning");
        assert_eq!(categorize("What is the main tail scenario?"), "risk");
        assert_eq!(categorize("Who benefits?"), "other");

        let counts = category_counts(&["Who benefits?".to_string()]);
        assert_eq!(counts.len(), 6);
        assert_eq!(counts["other"], 1);
        assert_eq!(counts["policy"], 0);
    }

    #[tokio::test]
    async fn test_unparseable_response_yields_three_questions() {
        let analyst = canned_analyst("The market is quiet.");
        let stage = GapIdentificationStage::new(Arc::new(analyst), 7).unwrap();
        let mut ctx = PipelineContext::new();
        stage.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.questions.len(), 3);
        assert!(ctx.errors().is_empty());
        let output = ctx.get_stage_output("gap_identification").unwrap();
        assert_eq!(output["fallback"], true);
        assert_eq!(output["categories"]["fundamental"], 1);
    }
}
