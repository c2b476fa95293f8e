//! Typed records exchanged between pipeline stages
//!
//! [`RawData`] is the one canonical market-data contract: every category is
//! optional so that "nothing fetched" and "partially fetched" are both
//! representable, and each category has a documented fallback value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fallback USD/JPY spot used whenever no live rate is available
pub const FALLBACK_USD_JPY: f64 = 147.25;
/// Fallback EUR/JPY spot
pub const FALLBACK_EUR_JPY: f64 = 158.90;
/// Fallback 10Y JGB yield
pub const FALLBACK_JGB_10Y: f64 = 0.25;
/// Neutral sentiment score
pub const NEUTRAL_SENTIMENT: u8 = 50;

/// Spot FX rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FxRates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_jpy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eur_jpy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eur_usd: Option<f64>,
    /// Broad trade-weighted dollar index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dollar_index: Option<f64>,
}

impl FxRates {
    pub fn fallback() -> Self {
        Self {
            usd_jpy: Some(FALLBACK_USD_JPY),
            eur_jpy: Some(FALLBACK_EUR_JPY),
            eur_usd: None,
            dollar_index: None,
        }
    }
}

/// Macro indicators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub japan_cpi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub japan_gdp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub us_gdp: Option<f64>,
}

impl MacroData {
    pub fn fallback() -> Self {
        Self {
            japan_cpi: Some(106.5),
            japan_gdp: Some(4231.14),
            us_gdp: Some(27000.0),
        }
    }
}

/// Government yield curves keyed by tenor (`"1m"`, `"2y"`, `"10y"`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YieldCurves {
    #[serde(default)]
    pub ust: BTreeMap<String, f64>,
    #[serde(default)]
    pub jgb: BTreeMap<String, f64>,
}

impl YieldCurves {
    pub fn fallback() -> Self {
        let ust = [
            ("1m", 5.50),
            ("3m", 5.25),
            ("6m", 5.15),
            ("1y", 4.85),
            ("2y", 4.60),
            ("3y", 4.50),
            ("5y", 4.40),
            ("7y", 4.35),
            ("10y", 4.25),
            ("20y", 4.35),
            ("30y", 4.40),
        ]
        .into_iter()
        .map(|(tenor, value)| (tenor.to_string(), value))
        .collect();

        Self {
            ust,
            jgb: BTreeMap::from([("10y".to_string(), FALLBACK_JGB_10Y)]),
        }
    }

    pub fn ust_10y(&self) -> Option<f64> {
        self.ust.get("10y").copied()
    }

    pub fn jgb_10y(&self) -> Option<f64> {
        self.jgb.get("10y").copied()
    }
}

/// Japanese money-market repo rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoRates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_on: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_1w: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_1m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tona: Option<f64>,
}

impl RepoRates {
    pub fn fallback() -> Self {
        Self {
            gc_on: Some(0.45),
            gc_1w: Some(0.477),
            gc_1m: Some(0.525),
            tona: Some(0.477),
        }
    }
}

/// News outlets tracked by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsSource {
    Boj,
    Reuters,
    Nikkei,
}

impl NewsSource {
    pub const ALL: [NewsSource; 3] = [NewsSource::Boj, NewsSource::Reuters, NewsSource::Nikkei];

    pub fn label(self) -> &'static str {
        match self {
            Self::Boj => "BOJ",
            Self::Reuters => "Reuters",
            Self::Nikkei => "Nikkei",
        }
    }

    /// Landing page used by the placeholder item
    pub fn landing_page(self) -> &'static str {
        match self {
            Self::Boj => "https://www.boj.or.jp/en/announcements/index.htm",
            Self::Reuters => "https://www.reuters.com/markets/asia/",
            Self::Nikkei => "https://asia.nikkei.com/Economy",
        }
    }
}

/// A single headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

impl NewsItem {
    /// Placeholder pointing readers at the outlet itself
    pub fn placeholder(source: NewsSource) -> Self {
        let title = match source {
            NewsSource::Boj => "Bank of Japan Announcements - Visit boj.or.jp",
            NewsSource::Reuters => "Japan Markets Update - Visit Reuters",
            NewsSource::Nikkei => "Japan Economy Update - Visit Nikkei Asia",
        };
        Self {
            title: title.to_string(),
            link: source.landing_page().to_string(),
            source: source.label().to_string(),
            published: None,
        }
    }
}

/// Category of [`RawData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawCategory {
    FxRates,
    MacroData,
    YieldCurves,
    RepoRates,
    BojNews,
    ReutersNews,
    NikkeiNews,
    SentimentScore,
}

impl RawCategory {
    pub const ALL: [RawCategory; 8] = [
        RawCategory::FxRates,
        RawCategory::MacroData,
        RawCategory::YieldCurves,
        RawCategory::RepoRates,
        RawCategory::BojNews,
        RawCategory::ReutersNews,
        RawCategory::NikkeiNews,
        RawCategory::SentimentScore,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::FxRates => "fx_rates",
            Self::MacroData => "macro_data",
            Self::YieldCurves => "yield_curves",
            Self::RepoRates => "repo_rates",
            Self::BojNews => "boj_news",
            Self::ReutersNews => "reuters_news",
            Self::NikkeiNews => "nikkei_news",
            Self::SentimentScore => "sentiment_score",
        }
    }
}

impl fmt::Display for RawCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Category-keyed market data written by data collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx_rates: Option<FxRates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_data: Option<MacroData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_curves: Option<YieldCurves>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_rates: Option<RepoRates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boj_news: Option<Vec<NewsItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuters_news: Option<Vec<NewsItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nikkei_news: Option<Vec<NewsItem>>,
    /// 0-100, 50 is neutral
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<u8>,
}

impl RawData {
    /// Every category populated with its documented fallback
    pub fn fallback() -> Self {
        let mut data = Self::default();
        for category in RawCategory::ALL {
            data.fill_fallback(category);
        }
        data
    }

    /// True when no category is present
    pub fn is_empty(&self) -> bool {
        RawCategory::ALL.iter().all(|c| !self.has(*c))
    }

    pub fn has(&self, category: RawCategory) -> bool {
        match category {
            RawCategory::FxRates => self.fx_rates.is_some(),
            RawCategory::MacroData => self.macro_data.is_some(),
            RawCategory::YieldCurves => self.yield_curves.is_some(),
            RawCategory::RepoRates => self.repo_rates.is_some(),
            RawCategory::BojNews => self.boj_news.is_some(),
            RawCategory::ReutersNews => self.reuters_news.is_some(),
            RawCategory::NikkeiNews => self.nikkei_news.is_some(),
            RawCategory::SentimentScore => self.sentiment_score.is_some(),
        }
    }

    pub fn missing_categories(&self) -> Vec<RawCategory> {
        RawCategory::ALL
            .into_iter()
            .filter(|c| !self.has(*c))
            .collect()
    }

    /// Replace one category with its fallback value
    pub fn fill_fallback(&mut self, category: RawCategory) {
        match category {
            RawCategory::FxRates => self.fx_rates = Some(FxRates::fallback()),
            RawCategory::MacroData => self.macro_data = Some(MacroData::fallback()),
            RawCategory::YieldCurves => self.yield_curves = Some(YieldCurves::fallback()),
            RawCategory::RepoRates => self.repo_rates = Some(RepoRates::fallback()),
            RawCategory::BojNews => {
                self.boj_news = Some(vec![NewsItem::placeholder(NewsSource::Boj)]);
            }
            RawCategory::ReutersNews => {
                self.reuters_news = Some(vec![NewsItem::placeholder(NewsSource::Reuters)]);
            }
            RawCategory::NikkeiNews => {
                self.nikkei_news = Some(vec![NewsItem::placeholder(NewsSource::Nikkei)]);
            }
            RawCategory::SentimentScore => self.sentiment_score = Some(NEUTRAL_SENTIMENT),
        }
    }

    pub fn usd_jpy(&self) -> Option<f64> {
        self.fx_rates.as_ref().and_then(|fx| fx.usd_jpy)
    }

    pub fn eur_jpy(&self) -> Option<f64> {
        self.fx_rates.as_ref().and_then(|fx| fx.eur_jpy)
    }

    pub fn news(&self, source: NewsSource) -> &[NewsItem] {
        let list = match source {
            NewsSource::Boj => &self.boj_news,
            NewsSource::Reuters => &self.reuters_news,
            NewsSource::Nikkei => &self.nikkei_news,
        };
        list.as_deref().unwrap_or_default()
    }
}

/// Supplemental record attached by evidence gathering
pub type SupplementalRecord = BTreeMap<String, serde_json::Value>;

/// Supplemental topic -> record
pub type EnhancedData = BTreeMap<String, SupplementalRecord>;

/// One entry of the reasoning plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub question: String,
    pub analysis: String,
    pub data_needed: String,
    pub insight: String,
}

/// Sentiment bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Neutral,
    Bearish,
}

impl Sentiment {
    /// `>= 60` is bullish, `<= 40` bearish, anything between neutral
    pub fn from_score(score: u8) -> Self {
        if score >= 60 {
            Self::Bullish
        } else if score <= 40 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Bearish => "Bearish",
        };
        f.write_str(s)
    }
}

/// Deterministic arithmetic computed from the raw and enhanced data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_eurusd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usdjpy_1m_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usdjpy_1m_change_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_differential_10y: Option<f64>,
    pub sentiment_score: u8,
    pub sentiment_interpretation: Sentiment,
}

/// Narrative calculation for one plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub question: String,
    pub calculation: String,
}

/// Output of the calculation stage
///
/// Serializes flat: `basic_metrics` next to `analysis_1` .. `analysis_5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculations {
    pub basic_metrics: BasicMetrics,
    #[serde(flatten)]
    pub analyses: BTreeMap<String, CalculationResult>,
}

/// Output of the validation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResults {
    pub overall_valid: bool,
    pub confidence_score: u8,
    pub issues: Vec<String>,
    pub strengths: Vec<String>,
    pub caveats: Vec<String>,
}

impl ValidationResults {
    pub fn has_major_issue(&self) -> bool {
        self.issues.iter().any(|issue| issue.starts_with("MAJOR"))
    }
}

/// The five fixed report sections, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    ExecutiveSummary,
    MarketAnalysis,
    KeyFindings,
    RiskAssessment,
    Outlook,
}

impl ReportSection {
    pub const ALL: [ReportSection; 5] = [
        ReportSection::ExecutiveSummary,
        ReportSection::MarketAnalysis,
        ReportSection::KeyFindings,
        ReportSection::RiskAssessment,
        ReportSection::Outlook,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "executive_summary",
            Self::MarketAnalysis => "market_analysis",
            Self::KeyFindings => "key_findings",
            Self::RiskAssessment => "risk_assessment",
            Self::Outlook => "outlook",
        }
    }

    /// Markdown header used in the compiled report
    pub fn header(self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "## Executive Summary",
            Self::MarketAnalysis => "## Market Analysis",
            Self::KeyFindings => "## Key Findings",
            Self::RiskAssessment => "## Risk Assessment",
            Self::Outlook => "## Outlook",
        }
    }
}

/// Report section -> text
pub type ReportSections = BTreeMap<ReportSection, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_raw_data_is_empty() {
        let data = RawData::default();
        assert!(data.is_empty());
        assert_eq!(data.missing_categories().len(), RawCategory::ALL.len());
    }

    #[test]
    fn test_fallback_fills_every_category() {
        let data = RawData::fallback();
        assert!(!data.is_empty());
        assert!(data.missing_categories().is_empty());
        assert_eq!(data.usd_jpy(), Some(FALLBACK_USD_JPY));
        assert_eq!(data.sentiment_score, Some(NEUTRAL_SENTIMENT));
        assert_eq!(data.news(NewsSource::Nikkei)[0].link, "https://asia.nikkei.com/Economy");
    }

    #[test]
    fn test_single_category_is_not_empty() {
        let data = RawData {
            sentiment_score: Some(55),
            ..RawData::default()
        };
        assert!(!data.is_empty());
        assert_eq!(data.missing_categories().len(), 7);
    }

    #[test]
    fn test_empty_raw_data_serializes_to_empty_object() {
        let value = serde_json::to_value(RawData::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn test_sentiment_thresholds() {
        assert_eq!(Sentiment::from_score(60), Sentiment::Bullish);
        assert_eq!(Sentiment::from_score(59), Sentiment::Neutral);
        assert_eq!(Sentiment::from_score(41), Sentiment::Neutral);
        assert_eq!(Sentiment::from_score(40), Sentiment::Bearish);
        assert_eq!(Sentiment::from_score(0), Sentiment::Bearish);
        assert_eq!(Sentiment::from_score(100), Sentiment::Bullish);
    }

    #[test]
    fn test_report_sections_serialize_with_snake_case_keys() {
        let sections: ReportSections = ReportSection::ALL
            .into_iter()
            .map(|s| (s, s.key().to_string()))
            .collect();
        let value = serde_json::to_value(&sections).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 5);
        assert_eq!(object["risk_assessment"], "risk_assessment");
    }

    #[test]
    fn test_calculations_serialize_flat() {
        let calculations = Calculations {
            basic_metrics: BasicMetrics {
                implied_eurusd: Some(1.0791),
                usdjpy_1m_change: None,
                usdjpy_1m_change_pct: None,
                rate_differential_10y: None,
                sentiment_score: 50,
                sentiment_interpretation: Sentiment::Neutral,
            },
            analyses: BTreeMap::from([(
                "analysis_1".to_string(),
                CalculationResult {
                    question: "Why?".to_string(),
                    calculation: "Because.".to_string(),
                },
            )]),
        };
        let value = serde_json::to_value(&calculations).unwrap();
        assert_eq!(value["basic_metrics"]["sentiment_interpretation"], "Neutral");
        assert_eq!(value["analysis_1"]["question"], "Why?");
    }
}
