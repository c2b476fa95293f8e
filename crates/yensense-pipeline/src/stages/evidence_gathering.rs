//! Stage 3: attach supplemental data the summary calls for
//!
//! The analyst names the evidence it would like to see; each topic is then
//! checked against [`EVIDENCE_RULES`] in order and the first matching rule
//! contributes its record to `enhanced_data`.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use yensense_core::{
    EnhancedData, ParseOutcome, PipelineContext, Result, Stage, StageId, SupplementalRecord,
};
use yensense_llm::CompletionService;
use yensense_prompt::PromptBuilder;

const SYSTEM_PROMPT: &str = "You are a research assistant for an FX strategist. \
Name concrete data series, not opinions.";

const MAX_TOKENS: usize = 400;

/// Key of the record inserted when no topic matches a rule
pub const PLACEHOLDER_KEY: &str = "market_context";

/// A keyword predicate and the record it attaches
pub struct EvidenceRule {
    pub key: &'static str,
    matches: fn(&str) -> bool,
    record: fn() -> SupplementalRecord,
}

impl EvidenceRule {
    /// Whether the rule fires for a topic; matching ignores case
    pub fn matches(&self, topic: &str) -> bool {
        (self.matches)(&topic.to_lowercase())
    }

    pub fn record(&self) -> SupplementalRecord {
        (self.record)()
    }
}

/// Evaluated in order, first match wins
pub const EVIDENCE_RULES: &[EvidenceRule] = &[
    EvidenceRule {
        key: "historical_usdjpy",
        matches: mentions_historical_usdjpy,
        record: historical_usdjpy,
    },
    EvidenceRule {
        key: "us_yields",
        matches: mentions_us_yields,
        record: us_yields,
    },
    EvidenceRule {
        key: "oil_prices",
        matches: mentions_oil,
        record: oil_prices,
    },
    EvidenceRule {
        key: "vix",
        matches: mentions_volatility,
        record: vix,
    },
    EvidenceRule {
        key: "boj_policy",
        matches: mentions_boj_policy,
        record: boj_policy,
    },
];

fn mentions_historical_usdjpy(topic: &str) -> bool {
    topic.contains("historical")
        && ["usd/jpy", "usdjpy", "usd jpy"]
            .iter()
            .any(|pair| topic.contains(pair))
}

fn mentions_us_yields(topic: &str) -> bool {
    topic.contains("treasury") || topic.contains("yields")
}

fn mentions_oil(topic: &str) -> bool {
    topic.contains("oil") || topic.contains("energy")
}

fn mentions_volatility(topic: &str) -> bool {
    topic.contains("vix") || topic.contains("volatility")
}

fn mentions_boj_policy(topic: &str) -> bool {
    topic.contains("boj") && (topic.contains("policy") || topic.contains("statement"))
}

fn record<const N: usize>(fields: [(&str, Value); N]) -> SupplementalRecord {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn historical_usdjpy() -> SupplementalRecord {
    record([
        ("1_month_ago", json!(145.50)),
        ("3_months_ago", json!(142.25)),
        ("1_year_ago", json!(135.00)),
    ])
}

fn us_yields() -> SupplementalRecord {
    record([
        ("2Y", json!(4.75)),
        ("10Y", json!(4.25)),
        ("spread_2s10s", json!(-0.50)),
    ])
}

fn oil_prices() -> SupplementalRecord {
    record([
        ("WTI", json!(75.50)),
        ("Brent", json!(79.25)),
        ("change_1d", json!(1.2)),
    ])
}

fn vix() -> SupplementalRecord {
    record([
        ("level", json!(15.5)),
        ("change_1d", json!(-0.5)),
        ("20d_avg", json!(16.2)),
    ])
}

fn boj_policy() -> SupplementalRecord {
    record([
        ("rate", json!(-0.1)),
        ("ycc_target", json!(0.0)),
        ("last_meeting", json!("2025-09-01")),
        ("stance", json!("Accommodative")),
    ])
}

fn placeholder() -> EnhancedData {
    EnhancedData::from([(
        PLACEHOLDER_KEY.to_string(),
        record([
            ("note", json!("Limited additional data available")),
            (
                "suggestion",
                json!("Analysis will proceed with available information"),
            ),
        ]),
    )])
}

/// Trimmed, non-empty, non-heading lines, at most `max`
pub(crate) fn parse_topics(response: &str, max: usize) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Records for every topic that matches a rule
pub(crate) fn gather(topics: &[String]) -> ParseOutcome<EnhancedData> {
    let mut gathered = EnhancedData::new();
    for topic in topics {
        match EVIDENCE_RULES.iter().find(|rule| rule.matches(topic)) {
            Some(rule) => {
                debug!(topic = %topic, evidence = rule.key, "Evidence rule matched");
                gathered.insert(rule.key.to_string(), rule.record());
            }
            None => debug!(topic = %topic, "No evidence rule matched, dropping topic"),
        }
    }
    ParseOutcome::parse_or((!gathered.is_empty()).then_some(gathered), placeholder)
}

/// Asks the analyst for evidence topics and attaches matching records
pub struct EvidenceGatheringStage {
    analyst: Arc<dyn CompletionService>,
    max_topics: usize,
}

impl EvidenceGatheringStage {
    pub fn new(analyst: Arc<dyn CompletionService>, max_topics: usize) -> Self {
        Self {
            analyst,
            max_topics,
        }
    }

    fn prompt(&self, summary: &str) -> String {
        PromptBuilder::new()
            .text(format!(
                "Based on this market summary, list up to {} additional data points that would \
                 strengthen a USD/JPY analysis (for example historical USD/JPY levels, Treasury \
                 yields, oil prices, volatility or BOJ policy statements).",
                self.max_topics
            ))
            .newline()
            .text("Write one item per line with no numbering or commentary.")
            .section("Summary")
            .text(summary)
            .build()
    }
}

#[async_trait]
impl Stage for EvidenceGatheringStage {
    fn id(&self) -> StageId {
        StageId::EvidenceGathering
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let response = self
            .analyst
            .complete(&self.prompt(&context.summary), SYSTEM_PROMPT, MAX_TOKENS)
            .await;

        let topics = parse_topics(&response, self.max_topics);
        let evidence = gather(&topics);
        if evidence.is_fallback() {
            warn!(
                topics = topics.len(),
                "No evidence topic matched a known series, using placeholder"
            );
        }

        let fallback = evidence.is_fallback();
        context.enhanced_data = evidence.into_inner();
        let gathered: Vec<&String> = context.enhanced_data.keys().collect();
        info!(
            evidence_requested = topics.len(),
            evidence_gathered = gathered.len(),
            "Evidence gathered"
        );

        let output = json!({
            "evidence_requested": topics.len(),
            "evidence_gathered": gathered,
            "fallback": fallback,
        });
        context.add_stage_output(StageId::EvidenceGathering.key(), output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAnalyst;

    #[test]
    fn test_parse_topics() {
        let response = "# Evidence\n\n  Historical USD/JPY levels  \nUS Treasury yields\nVIX\nOil\nBOJ policy statement\nCFTC positioning\n";
        let topics = parse_topics(response, 5);
        assert_eq!(
            topics,
            vec![
                "Historical USD/JPY levels",
                "US Treasury yields",
                "VIX",
                "Oil",
                "BOJ policy statement"
            ]
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // mentions both yields and volatility, the earlier rule takes it
        let topics = vec!["Treasury yield volatility".to_string()];
        let evidence = gather(&topics).into_inner();
        assert_eq!(evidence.keys().collect::<Vec<_>>(), vec!["us_yields"]);
        assert_eq!(evidence["us_yields"]["spread_2s10s"], json!(-0.50));
    }

    #[test]
    fn test_rules_match_case_insensitively() {
        let topics = vec![
            "HISTORICAL usdjpy range".to_string(),
            "Energy prices".to_string(),
            "BoJ Statement tone".to_string(),
            "Equity flows".to_string(),
        ];
        let evidence = gather(&topics);
        assert!(!evidence.is_fallback());
        let keys: Vec<_> = evidence.value().keys().cloned().collect();
        assert_eq!(keys, vec!["boj_policy", "historical_usdjpy", "oil_prices"]);
        assert_eq!(evidence.value()["boj_policy"]["stance"], "Accommodative");
    }

    #[test]
    fn test_boj_without_policy_does_not_match() {
        assert!(!EVIDENCE_RULES[4].matches("BOJ governor travel schedule"));
        assert!(EVIDENCE_RULES[4].matches("Latest BOJ policy decision"));
    }

    #[test]
    fn test_unmatched_topics_give_placeholder() {
        let evidence = gather(&["Equity flows".to_string()]);
        assert!(evidence.is_fallback());
        let data = evidence.into_inner();
        assert_eq!(data.len(), 1);
        assert_eq!(data[PLACEHOLDER_KEY]["note"], "Limited additional data available");
    }

    #[tokio::test]
    async fn test_execute_writes_enhanced_data() {
        let mut analyst = MockAnalyst::new();
        analyst
            .expect_complete()
            .withf(|prompt, _, max_tokens| {
                prompt.contains("USD/JPY ended at 147.25") && *max_tokens == 400
            })
            .times(1)
            .returning(|_, _, _| "Historical USD/JPY\nTreasury yields\nPMI data".to_string());

        let stage = EvidenceGatheringStage::new(Arc::new(analyst), 5);
        let mut ctx = PipelineContext::new();
        ctx.summary = "USD/JPY ended at 147.25".to_string();
        stage.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.enhanced_data.len(), 2);
        assert_eq!(ctx.enhanced_data["historical_usdjpy"]["1_month_ago"], json!(145.50));
        let output = ctx.get_stage_output("evidence_gathering").unwrap();
        assert_eq!(output["evidence_requested"], 3);
        assert_eq!(output["evidence_gathered"], json!(["historical_usdjpy", "us_yields"]));
        assert_eq!(output["fallback"], false);
        assert!(ctx.errors().is_empty());
    }
}
