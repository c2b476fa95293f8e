//! Stage 7: critique of the analysis so far
//!
//! The analyst's critique is read line by line. Headers such as "Major
//! issues" or "Strengths" switch the current section and the bullets under
//! them are filed into `issues`, `strengths` or `caveats`.

use crate::text::{ListMarkers, truncate_chars};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use yensense_core::{ParseOutcome, PipelineContext, Result, Stage, StageId, ValidationResults};
use yensense_llm::CompletionService;
use yensense_prompt::PromptBuilder;

const SYSTEM_PROMPT: &str = "You are a skeptical risk manager reviewing an FX research note. \
Check that conclusions follow from the data and call out anything unsupported.";

const MAX_TOKENS: usize = 800;

/// Used when the critique carries no readable confidence figure
pub const DEFAULT_CONFIDENCE: u8 = 70;
/// Below this the analysis is never considered valid
pub const VALIDITY_THRESHOLD: u8 = 50;

const DEFAULT_STRENGTH: &str = "Analysis appears logically consistent";
const DEFAULT_CAVEAT: &str = "Limited data available for comprehensive validation";

const SUMMARY_EXCERPT_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    MajorIssues,
    MinorIssues,
    Strengths,
    Caveats,
}

impl Section {
    fn from_header(line: &str) -> Option<Self> {
        let lower = line.to_lowercase();
        if lower.contains("major issue") || lower.contains("serious problem") {
            Some(Self::MajorIssues)
        } else if lower.contains("minor issue") || lower.contains("small concern") {
            Some(Self::MinorIssues)
        } else if lower.contains("strength") || lower.contains("well-supported") {
            Some(Self::Strengths)
        } else if lower.contains("caveat") || lower.contains("note") {
            Some(Self::Caveats)
        } else {
            None
        }
    }
}

/// Bullets that only say there is nothing to report
fn is_empty_entry(text: &str) -> bool {
    let normalized = text.trim_end_matches('.').trim().to_lowercase();
    matches!(
        normalized.as_str(),
        "" | "none" | "n/a" | "none identified" | "no issues" | "no major issues" | "no minor issues"
    )
}

/// First digit run after a "confidence" marker on a non-bullet line,
/// ignoring a "0-100" scale hint and clamped to 100
pub(crate) fn parse_confidence(response: &str, markers: &ListMarkers) -> ParseOutcome<u8> {
    let parsed = response
        .lines()
        .filter(|line| markers.bullet_text(line).is_none())
        .find_map(|line| {
            let lower = line.to_lowercase();
            let start = lower.find("confidence")? + "confidence".len();
            let rest = lower[start..].replace("0-100", "").replace("0 - 100", "");
            let digits: String = rest
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(char::is_ascii_digit)
                .collect();
            digits
                .parse::<u64>()
                .ok()
                .map(|value| u8::try_from(value.min(100)).unwrap_or(100))
        });
    ParseOutcome::parse_or(parsed, || DEFAULT_CONFIDENCE)
}

/// Build `ValidationResults` from the critique text
pub(crate) fn parse_validation(response: &str, markers: &ListMarkers) -> (ValidationResults, bool) {
    let confidence = parse_confidence(response, markers);
    let mut issues = Vec::new();
    let mut strengths = Vec::new();
    let mut caveats = Vec::new();

    let mut section = None;
    for line in response.lines() {
        match markers.bullet_text(line) {
            Some(text) => {
                if is_empty_entry(text) {
                    continue;
                }
                match section {
                    Some(Section::MajorIssues) => issues.push(format!("MAJOR: {text}")),
                    Some(Section::MinorIssues) => issues.push(format!("MINOR: {text}")),
                    Some(Section::Strengths) => strengths.push(text.to_string()),
                    Some(Section::Caveats) => caveats.push(text.to_string()),
                    None => {}
                }
            }
            None => {
                if let Some(header) = Section::from_header(line) {
                    section = Some(header);
                }
            }
        }
    }

    if issues.is_empty() && strengths.is_empty() {
        strengths.push(DEFAULT_STRENGTH.to_string());
        caveats.push(DEFAULT_CAVEAT.to_string());
    }

    let confidence_fallback = confidence.is_fallback();
    let confidence_score = confidence.into_inner();
    let mut results = ValidationResults {
        overall_valid: false,
        confidence_score,
        issues,
        strengths,
        caveats,
    };
    results.overall_valid = confidence_score >= VALIDITY_THRESHOLD && !results.has_major_issue();
    (results, confidence_fallback)
}

/// Asks the analyst to critique everything produced so far
pub struct ValidationStage {
    analyst: Arc<dyn CompletionService>,
    markers: ListMarkers,
}

impl ValidationStage {
    pub fn new(analyst: Arc<dyn CompletionService>) -> Result<Self> {
        Ok(Self {
            analyst,
            markers: ListMarkers::new()?,
        })
    }

    fn prompt(context: &PipelineContext) -> String {
        let mut builder = PromptBuilder::new()
            .text("Review the analysis below for logical consistency and data support.")
            .section("Market summary")
            .text(truncate_chars(&context.summary, SUMMARY_EXCERPT_CHARS))
            .newline()
            .section("Questions and planned analysis");

        for record in &context.analysis_plan {
            builder = builder
                .bullet(record.question.as_str())
                .field("  Analysis", record.analysis.as_str())
                .field("  Insight", record.insight.as_str());
        }

        if let Some(calculations) = &context.calculations {
            let metrics = &calculations.basic_metrics;
            builder = builder
                .section("Key metrics")
                .field(
                    "Sentiment",
                    format!(
                        "{} ({}/100)",
                        metrics.sentiment_interpretation, metrics.sentiment_score
                    ),
                )
                .when(
                    metrics.rate_differential_10y.is_some(),
                    format!(
                        "US-Japan 10Y differential: {}\n",
                        metrics.rate_differential_10y.unwrap_or_default()
                    ),
                );
            for (key, result) in &calculations.analyses {
                builder = builder.field(key.as_str(), truncate_chars(&result.calculation, 300));
            }
        }

        builder
            .section("Your review")
            .text(
                "Respond with these headers, each followed by bullet points (or \"- None\"):\n\
                 Major issues:\nMinor issues:\nStrengths:\nCaveats:\n\n\
                 Finish with a line \"Confidence (0-100): <score>\".",
            )
            .build()
    }
}

#[async_trait]
impl Stage for ValidationStage {
    fn id(&self) -> StageId {
        StageId::Validation
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let response = self
            .analyst
            .complete(&Self::prompt(context), SYSTEM_PROMPT, MAX_TOKENS)
            .await;

        let (results, confidence_fallback) = parse_validation(&response, &self.markers);
        if confidence_fallback {
            warn!(
                confidence = DEFAULT_CONFIDENCE,
                "No confidence score in critique, using default"
            );
        }
        info!(
            confidence = results.confidence_score,
            overall_valid = results.overall_valid,
            issues = results.issues.len(),
            "Validation complete"
        );

        context.add_stage_output(
            StageId::Validation.key(),
            json!({
                "confidence_score": results.confidence_score,
                "overall_valid": results.overall_valid,
                "issues_found": results.issues.len(),
                "fallback": confidence_fallback,
            }),
        );
        context.validation_results = Some(results);
        Ok(())
    }
}
