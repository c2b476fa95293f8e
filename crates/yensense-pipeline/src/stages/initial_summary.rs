//! Stage 2: factual narrative of the raw data

use crate::text::or_na;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use yensense_core::{
    FALLBACK_USD_JPY, NewsSource, ParseOutcome, PipelineContext, RawData, Result, Stage, StageId,
};
use yensense_llm::CompletionService;
use yensense_prompt::JinjaTemplate;

const SYSTEM_PROMPT: &str = "You are a market data reporter. Describe the numbers you are given \
accurately and neutrally. Do not interpret, forecast or recommend.";

const MAX_TOKENS: usize = 800;
const HEADLINES_PER_SOURCE: usize = 3;

const TEMPLATE: &str = r"Summarize the following Japan FX and rates market data in three or four short paragraphs.
Report the facts only: no interpretation, forecasts or recommendations.

FX rates:
- USD/JPY: {{ usd_jpy }}
- EUR/JPY: {{ eur_jpy }}
- EUR/USD: {{ eur_usd }}
- Broad dollar index: {{ dollar_index }}

Macro indicators:
- Japan CPI: {{ japan_cpi }}
- Japan real GDP: {{ japan_gdp }}
- US GDP: {{ us_gdp }}

Yields:
- US 2Y Treasury: {{ ust_2y }}
- US 10Y Treasury: {{ ust_10y }}
- 10Y JGB: {{ jgb_10y }}

Money markets:
- GC repo overnight: {{ gc_on }}
- TONA: {{ tona }}

Sentiment score: {{ sentiment }}/100
{% if headlines %}
Recent headlines:
{% for h in headlines %}- [{{ h.source }}] {{ h.title }}
{% endfor %}{% endif %}";

/// Asks the analyst for a plain description of `raw_data`
pub struct InitialSummaryStage {
    analyst: Arc<dyn CompletionService>,
    template: JinjaTemplate,
}

impl InitialSummaryStage {
    pub fn new(analyst: Arc<dyn CompletionService>) -> Result<Self> {
        Ok(Self {
            analyst,
            template: JinjaTemplate::new("initial_summary", TEMPLATE)?,
        })
    }

    fn render_prompt(&self, raw_data: &RawData) -> Result<String> {
        Ok(self.template.render(&prompt_vars(raw_data))?)
    }
}

fn prompt_vars(raw_data: &RawData) -> serde_json::Value {
    let fx = raw_data.fx_rates.clone().unwrap_or_default();
    let macro_data = raw_data.macro_data.clone().unwrap_or_default();
    let curves = raw_data.yield_curves.clone().unwrap_or_default();
    let repo = raw_data.repo_rates.clone().unwrap_or_default();

    let headlines: Vec<_> = NewsSource::ALL
        .iter()
        .flat_map(|source| {
            raw_data
                .news(*source)
                .iter()
                .take(HEADLINES_PER_SOURCE)
                .map(|item| json!({ "source": source.label(), "title": item.title }))
        })
        .collect();

    json!({
        "usd_jpy": or_na(fx.usd_jpy),
        "eur_jpy": or_na(fx.eur_jpy),
        "eur_usd": or_na(fx.eur_usd),
        "dollar_index": or_na(fx.dollar_index),
        "japan_cpi": or_na(macro_data.japan_cpi),
        "japan_gdp": or_na(macro_data.japan_gdp),
        "us_gdp": or_na(macro_data.us_gdp),
        "ust_2y": or_na(curves.ust.get("2y").copied()),
        "ust_10y": or_na(curves.ust_10y()),
        "jgb_10y": or_na(curves.jgb_10y()),
        "gc_on": or_na(repo.gc_on),
        "tona": or_na(repo.tona),
        "sentiment": raw_data
            .sentiment_score
            .map_or_else(|| "N/A".to_string(), |s| s.to_string()),
        "headlines": headlines,
    })
}

/// Headline metrics that made it into the prompt
fn key_metrics_covered(raw_data: &RawData) -> usize {
    let curves = raw_data.yield_curves.as_ref();
    [
        raw_data.usd_jpy(),
        raw_data.eur_jpy(),
        raw_data.macro_data.as_ref().and_then(|m| m.japan_cpi),
        curves.and_then(yensense_core::YieldCurves::ust_10y),
        curves.and_then(yensense_core::YieldCurves::jgb_10y),
        raw_data.repo_rates.as_ref().and_then(|r| r.tona),
        raw_data.sentiment_score.map(f64::from),
    ]
    .iter()
    .flatten()
    .count()
}

fn fallback_summary(raw_data: &RawData) -> String {
    format!(
        "USD/JPY is trading at {:.2}. US 10Y Treasury yield {} and 10Y JGB yield {}.",
        raw_data.usd_jpy().unwrap_or(FALLBACK_USD_JPY),
        or_na(raw_data.yield_curves.as_ref().and_then(|c| c.ust_10y())),
        or_na(raw_data.yield_curves.as_ref().and_then(|c| c.jgb_10y())),
    )
}

#[async_trait]
impl Stage for InitialSummaryStage {
    fn id(&self) -> StageId {
        StageId::InitialSummary
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let prompt = self.render_prompt(&context.raw_data)?;
        let response = self
            .analyst
            .complete(&prompt, SYSTEM_PROMPT, MAX_TOKENS)
            .await;

        let trimmed = response.trim();
        let summary = ParseOutcome::parse_or(
            (!trimmed.is_empty()).then(|| trimmed.to_string()),
            || fallback_summary(&context.raw_data),
        );
        if summary.is_fallback() {
            warn!("Empty summary from analyst, using data-only summary");
        }

        let covered = key_metrics_covered(&context.raw_data);
        let fallback = summary.is_fallback();
        context.summary = summary.into_inner();
        info!(
            summary_length = context.summary.len(),
            key_metrics_covered = covered,
            "Initial summary generated"
        );

        context.add_stage_output(
            StageId::InitialSummary.key(),
            json!({
                "summary_length": context.summary.len(),
                "key_metrics_covered": covered,
                "fallback": fallback,
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAnalyst;
    use yensense_core::NewsItem;

    #[test]
    fn test_prompt_includes_values_and_headlines() {
        let stage = InitialSummaryStage::new(Arc::new(MockAnalyst::new())).unwrap();
        let mut raw_data = RawData::fallback();
        raw_data.reuters_news = Some(vec![NewsItem {
            title: "Yen slides as BOJ holds".to_string(),
            link: "https://example.com/yen".to_string(),
            source: "Reuters".to_string(),
            published: None,
        }]);

        let prompt = stage.render_prompt(&raw_data).unwrap();
        assert!(prompt.contains("- USD/JPY: 147.25"));
        assert!(prompt.contains("- EUR/USD: N/A"));
        assert!(prompt.contains("- 10Y JGB: 0.25"));
        assert!(prompt.contains("Sentiment score: 50/100"));
        assert!(prompt.contains("- [Reuters] Yen slides as BOJ holds"));
        assert!(prompt.contains("- [BOJ] Bank of Japan Announcements"));
    }

    #[test]
    fn test_prompt_for_empty_data() {
        let stage = InitialSummaryStage::new(Arc::new(MockAnalyst::new())).unwrap();
        let prompt = stage.render_prompt(&RawData::default()).unwrap();
        assert!(prompt.contains("- USD/JPY: N/A"));
        assert!(!prompt.contains("Recent headlines"));
        assert_eq!(key_metrics_covered(&RawData::default()), 0);
    }

    #[tokio::test]
    async fn test_writes_summary() {
        let mut analyst = MockAnalyst::new();
        analyst
            .expect_complete()
            .withf(|prompt, system, max_tokens| {
                prompt.contains("USD/JPY: 147.25") && system == SYSTEM_PROMPT && *max_tokens == 800
            })
            .times(1)
            .returning(|_, _, _| "  USD/JPY ended the week at 147.25.  ".to_string());

        let stage = InitialSummaryStage::new(Arc::new(analyst)).unwrap();
        let mut ctx = PipelineContext::new();
        ctx.raw_data = RawData::fallback();
        stage.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.summary, "USD/JPY ended the week at 147.25.");
        let output = ctx.get_stage_output("initial_summary").unwrap();
        assert_eq!(output["key_metrics_covered"], 7);
        assert_eq!(output["fallback"], false);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_data_summary() {
        let mut analyst = MockAnalyst::new();
        analyst.expect_complete().returning(|_, _, _| String::new());

        let stage = InitialSummaryStage::new(Arc::new(analyst)).unwrap();
        let mut ctx = PipelineContext::new();
        ctx.raw_data = RawData::fallback();
        stage.execute(&mut ctx).await.unwrap();

        assert!(ctx.summary.starts_with("USD/JPY is trading at 147.25."));
        assert!(ctx.errors().is_empty());
    }
}
