//! Stage 1: fetch raw market data

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use yensense_core::{Error, PipelineContext, Result, Stage, StageId};
use yensense_market::MarketDataSource;

/// Pulls every category from the data source into `raw_data`
///
/// Categories the source leaves out are filled with their fallback values.
/// A completely empty fetch is left empty so the orchestrator can abort.
pub struct DataCollectionStage {
    source: Arc<dyn MarketDataSource>,
}

impl DataCollectionStage {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for DataCollectionStage {
    fn id(&self) -> StageId {
        StageId::DataCollection
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let mut raw_data = self.source.fetch_all().await;

        if raw_data.is_empty() {
            error!("Data source returned no market data");
            context.add_error(Error::CriticalDataMissing(
                "data source returned no categories".to_string(),
            ));
            context.raw_data = raw_data;
            context.add_stage_output(
                StageId::DataCollection.key(),
                json!({ "sources_fetched": 0, "data_points": 0, "fallbacks": [] }),
            );
            return Ok(());
        }

        let missing = raw_data.missing_categories();
        for category in &missing {
            warn!(%category, "Category missing from fetch, using fallback values");
            raw_data.fill_fallback(*category);
            context.add_error(Error::Fetch {
                category: category.key().to_string(),
                reason: "not returned by data source, fallback values substituted".to_string(),
            });
        }

        let data_points = count_data_points(&raw_data);
        let fetched = yensense_core::RawCategory::ALL.len() - missing.len();
        info!(
            sources_fetched = fetched,
            data_points,
            fallbacks = missing.len(),
            "Market data collected"
        );

        context.raw_data = raw_data;
        context.add_stage_output(
            StageId::DataCollection.key(),
            json!({
                "sources_fetched": fetched,
                "data_points": data_points,
                "fallbacks": missing.iter().map(|c| c.key()).collect::<Vec<_>>(),
            }),
        );
        Ok(())
    }
}

/// Individual values and headlines carried by `raw_data`
fn count_data_points(raw_data: &yensense_core::RawData) -> usize {
    let fx = raw_data.fx_rates.as_ref().map_or(0, |fx| {
        [fx.usd_jpy, fx.eur_jpy, fx.eur_usd, fx.dollar_index]
            .iter()
            .flatten()
            .count()
    });
    let macro_points = raw_data.macro_data.as_ref().map_or(0, |m| {
        [m.japan_cpi, m.japan_gdp, m.us_gdp].iter().flatten().count()
    });
    let curves = raw_data
        .yield_curves
        .as_ref()
        .map_or(0, |c| c.ust.len() + c.jgb.len());
    let repo = raw_data.repo_rates.as_ref().map_or(0, |r| {
        [r.gc_on, r.gc_1w, r.gc_1m, r.tona].iter().flatten().count()
    });
    let news: usize = yensense_core::NewsSource::ALL
        .iter()
        .map(|s| raw_data.news(*s).len())
        .sum();
    let sentiment = usize::from(raw_data.sentiment_score.is_some());

    fx + macro_points + curves + repo + news + sentiment
}
