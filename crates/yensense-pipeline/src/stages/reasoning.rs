//! Stage 5: an analysis plan with one record per question

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use yensense_core::{AnalysisRecord, Error, ParseOutcome, PipelineContext, Result, Stage, StageId};
use yensense_llm::CompletionService;
use yensense_prompt::PromptBuilder;

const SYSTEM_PROMPT: &str = "You are a quantitative FX analyst. For every question, state how \
you would answer it with data, precisely and briefly.";

const MAX_TOKENS: usize = 1200;

/// `Question 1`, `Question 2:` and so on; a bare "Questions" heading does not start a block
const BLOCK_MARKER: &str = r"\bQuestion\s*\d+";

const TEMPLATE_ANALYSIS: &str = "Compare current levels to historical averages";
const TEMPLATE_DATA_NEEDED: &str = "Current and historical data points";
const TEMPLATE_INSIGHT: &str = "Understand if current levels are unusual";

/// The record used when a question's block cannot be read
pub fn template_record(question: &str) -> AnalysisRecord {
    AnalysisRecord {
        question: question.to_string(),
        analysis: TEMPLATE_ANALYSIS.to_string(),
        data_needed: TEMPLATE_DATA_NEEDED.to_string(),
        insight: TEMPLATE_INSIGHT.to_string(),
    }
}

#[derive(Debug, Default)]
struct BlockFields {
    analysis: Option<String>,
    data_needed: Option<String>,
    insight: Option<String>,
}

/// Text following `marker` on a line, markers matched without regard to case
fn value_after<'a>(line: &'a str, lower: &str, markers: &[&str]) -> Option<&'a str> {
    markers.iter().find_map(|marker| {
        lower.find(marker).map(|pos| {
            line[pos + marker.len()..]
                .trim()
                .trim_start_matches('*')
                .trim()
        })
    })
}

fn parse_block(block: &str) -> BlockFields {
    let mut fields = BlockFields::default();
    for line in block.lines() {
        let lower = line.to_ascii_lowercase();
        let slot_and_value = if let Some(value) = value_after(line, &lower, &["analysis:"]) {
            Some((&mut fields.analysis, value))
        } else if let Some(value) = value_after(line, &lower, &["data needed:", "data:"]) {
            Some((&mut fields.data_needed, value))
        } else {
            value_after(line, &lower, &["insight:", "tells us:"])
                .map(|value| (&mut fields.insight, value))
        };

        if let Some((slot, value)) = slot_and_value {
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.to_string());
            }
        }
    }
    fields
}

fn block_marker() -> Result<Regex> {
    Regex::new(BLOCK_MARKER).map_err(|e| Error::Generic(format!("invalid question marker: {e}")))
}

/// One outcome per question, in question order
pub(crate) fn parse_plan(
    response: &str,
    questions: &[String],
    marker: &Regex,
) -> Vec<ParseOutcome<AnalysisRecord>> {
    let blocks: Vec<&str> = marker.split(response).skip(1).collect();

    questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let parsed = blocks.get(i).map(|block| parse_block(block)).and_then(|fields| {
                let analysis = fields.analysis?;
                Some(AnalysisRecord {
                    question: question.clone(),
                    analysis,
                    data_needed: fields
                        .data_needed
                        .unwrap_or_else(|| TEMPLATE_DATA_NEEDED.to_string()),
                    insight: fields.insight.unwrap_or_else(|| TEMPLATE_INSIGHT.to_string()),
                })
            });
            ParseOutcome::parse_or(parsed, || template_record(question))
        })
        .collect()
}

fn analysis_category(analysis: &str) -> &'static str {
    let lower = analysis.to_lowercase();
    if ["compar", "versus", "relative to"].iter().any(|k| lower.contains(k)) {
        "comparison"
    } else if ["correlat", "relationship"].iter().any(|k| lower.contains(k)) {
        "correlation"
    } else if ["trend", "momentum", "over time"].iter().any(|k| lower.contains(k)) {
        "trend"
    } else if ["calculat", "ratio", "spread", "differential"]
        .iter()
        .any(|k| lower.contains(k))
    {
        "calculation"
    } else {
        "other"
    }
}

/// Plans how each open question will be answered
pub struct ReasoningStage {
    analyst: Arc<dyn CompletionService>,
    fallback_cap: Option<usize>,
    marker: Regex,
}

impl ReasoningStage {
    pub fn new(analyst: Arc<dyn CompletionService>, fallback_cap: Option<usize>) -> Result<Self> {
        Ok(Self {
            analyst,
            fallback_cap,
            marker: block_marker()?,
        })
    }

    fn prompt(questions: &[String]) -> String {
        PromptBuilder::new()
            .text("For each question below, describe the analysis that would answer it.")
            .blank_line()
            .numbered_list(questions.iter().map(String::as_str))
            .newline()
            .text("Use exactly this format for every question:")
            .blank_line()
            .text("Question 1: <the question>\n")
            .field("Analysis", "<the comparison or calculation to run>")
            .field("Data needed", "<the series required>")
            .field("Insight", "<what the result tells us>")
            .build()
    }
}

#[async_trait]
impl Stage for ReasoningStage {
    fn id(&self) -> StageId {
        StageId::Reasoning
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let response = self
            .analyst
            .complete(&Self::prompt(&context.questions), SYSTEM_PROMPT, MAX_TOKENS)
            .await;

        let outcomes = parse_plan(&response, &context.questions, &self.marker);
        let fallback_records = outcomes.iter().filter(|o| o.is_fallback()).count();
        let all_fallback = !outcomes.is_empty() && fallback_records == outcomes.len();
        if fallback_records > 0 {
            warn!(
                fallback_records,
                "Reasoning blocks could not be read, using template records"
            );
        }

        let mut plan: Vec<AnalysisRecord> =
            outcomes.into_iter().map(ParseOutcome::into_inner).collect();
        if let (true, Some(cap)) = (all_fallback, self.fallback_cap) {
            debug!(cap, "Capping template-only analysis plan");
            plan.truncate(cap);
        }

        let mut categories: BTreeMap<&'static str, usize> = BTreeMap::new();
        for record in &plan {
            *categories.entry(analysis_category(&record.analysis)).or_default() += 1;
        }
        info!(analyses_planned = plan.len(), "Analysis plan created");

        context.add_stage_output(
            StageId::Reasoning.key(),
            json!({
                "analyses_planned": plan.len(),
                "fallback_records": fallback_records,
                "categories": categories,
            }),
        );
        context.analysis_plan = plan;
        Ok(())
    }
}
