//! Stage 6: deterministic metrics plus a narrative calculation per plan entry

use crate::text::{or_na, round_dp};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use yensense_core::{
    AnalysisRecord, BasicMetrics, CalculationResult, Calculations, EnhancedData,
    FALLBACK_EUR_JPY, FALLBACK_JGB_10Y, FALLBACK_USD_JPY, NEUTRAL_SENTIMENT, PipelineContext,
    RawData, Result, Sentiment, Stage, StageId,
};
use yensense_llm::CompletionService;
use yensense_prompt::PromptBuilder;

const SYSTEM_PROMPT: &str = "You are a quantitative FX analyst. Show the arithmetic, state the \
result and say in one sentence what it implies.";

const MAX_TOKENS: usize = 400;

fn supplemental(enhanced: &EnhancedData, key: &str, field: &str) -> Option<f64> {
    enhanced
        .get(key)
        .and_then(|record| record.get(field))
        .and_then(serde_json::Value::as_f64)
}

/// Metrics that need no model call
pub fn basic_metrics(raw_data: &RawData, enhanced: &EnhancedData) -> BasicMetrics {
    let usd_jpy = raw_data.usd_jpy().unwrap_or(FALLBACK_USD_JPY);
    let eur_jpy = raw_data.eur_jpy().unwrap_or(FALLBACK_EUR_JPY);
    let implied_eurusd = (usd_jpy > 0.0).then(|| round_dp(eur_jpy / usd_jpy, 4));

    let month_ago = supplemental(enhanced, "historical_usdjpy", "1_month_ago").filter(|v| *v > 0.0);
    let usdjpy_1m_change = month_ago.map(|prev| round_dp(usd_jpy - prev, 2));
    let usdjpy_1m_change_pct = month_ago.map(|prev| round_dp((usd_jpy - prev) / prev * 100.0, 2));

    let us_10y = supplemental(enhanced, "us_yields", "10Y").or_else(|| {
        raw_data
            .yield_curves
            .as_ref()
            .and_then(yensense_core::YieldCurves::ust_10y)
    });
    let jgb_10y = raw_data
        .yield_curves
        .as_ref()
        .and_then(yensense_core::YieldCurves::jgb_10y)
        .unwrap_or(FALLBACK_JGB_10Y);
    let rate_differential_10y = us_10y.map(|us| round_dp(us - jgb_10y, 2));

    let sentiment_score = raw_data.sentiment_score.unwrap_or(NEUTRAL_SENTIMENT);

    BasicMetrics {
        implied_eurusd,
        usdjpy_1m_change,
        usdjpy_1m_change_pct,
        rate_differential_10y,
        sentiment_score,
        sentiment_interpretation: Sentiment::from_score(sentiment_score),
    }
}

/// Runs the deterministic metrics and asks for up to `max_calculations`
/// narrative calculations
pub struct CalculationStage {
    analyst: Arc<dyn CompletionService>,
    max_calculations: usize,
}

impl CalculationStage {
    pub fn new(analyst: Arc<dyn CompletionService>, max_calculations: usize) -> Self {
        Self {
            analyst,
            max_calculations,
        }
    }

    fn prompt(record: &AnalysisRecord, raw_data: &RawData, metrics: &BasicMetrics) -> String {
        PromptBuilder::new()
            .field("Question", record.question.as_str())
            .field("Planned analysis", record.analysis.as_str())
            .field("Data needed", record.data_needed.as_str())
            .section("Available data")
            .field("USD/JPY", or_na(raw_data.usd_jpy()))
            .field("EUR/JPY", or_na(raw_data.eur_jpy()))
            .field("Implied EUR/USD", or_na(metrics.implied_eurusd))
            .field("USD/JPY 1M change (%)", or_na(metrics.usdjpy_1m_change_pct))
            .field("US-Japan 10Y differential", or_na(metrics.rate_differential_10y))
            .field(
                "Sentiment",
                format!(
                    "{} ({}/100)",
                    metrics.sentiment_interpretation, metrics.sentiment_score
                ),
            )
            .newline()
            .text("Perform the calculation with these figures in two or three sentences.")
            .build()
    }
}

#[async_trait]
impl Stage for CalculationStage {
    fn id(&self) -> StageId {
        StageId::Calculation
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let metrics = basic_metrics(&context.raw_data, &context.enhanced_data);
        debug!(?metrics, "Basic metrics computed");

        let mut analyses = BTreeMap::new();
        for (i, record) in context
            .analysis_plan
            .iter()
            .take(self.max_calculations)
            .enumerate()
        {
            let prompt = Self::prompt(record, &context.raw_data, &metrics);
            let calculation = self.analyst.complete(&prompt, SYSTEM_PROMPT, MAX_TOKENS).await;
            analyses.insert(
                format!("analysis_{}", i + 1),
                CalculationResult {
                    question: record.question.clone(),
                    calculation,
                },
            );
        }

        let metrics_calculated = [
            metrics.implied_eurusd,
            metrics.usdjpy_1m_change,
            metrics.usdjpy_1m_change_pct,
            metrics.rate_differential_10y,
        ]
        .iter()
        .flatten()
        .count()
            + 1;
        info!(
            metrics_calculated,
            analyses_completed = analyses.len(),
            "Calculations complete"
        );

        context.add_stage_output(
            StageId::Calculation.key(),
            json!({
                "metrics_calculated": metrics_calculated,
                "analyses_completed": analyses.len(),
            }),
        );
        context.calculations = Some(Calculations {
            basic_metrics: metrics,
            analyses,
        });
        Ok(())
    }
}
