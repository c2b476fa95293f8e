//! Stage 8: sections, compiled report and title

use crate::config::ReportKind;
use crate::text::{or_na, truncate_chars};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use yensense_core::{
    FALLBACK_USD_JPY, ParseOutcome, PipelineContext, RawCategory, ReportSection, ReportSections,
    Result, Stage, StageId,
};
use yensense_llm::CompletionService;
use yensense_prompt::{JinjaTemplate, PromptBuilder};

const SYSTEM_PROMPT: &str = "You are a senior Japan macro and FX strategist writing for \
institutional clients. Be specific, cite the figures provided and keep a measured tone.";

pub const DISCLAIMER: &str = "*Disclaimer: This report is for informational purposes only and \
does not constitute financial advice.*";

pub const APPENDIX_HEADER: &str = "## Appendix: Methodology & Data";

const APPENDIX_MAX_TOKENS: usize = 300;
const TITLE_MAX_TOKENS: usize = 50;

const MIN_TITLE_CHARS: usize = 10;

/// Token budget, length target and brief for each section
fn section_brief(section: ReportSection) -> (usize, &'static str, &'static str) {
    match section {
        ReportSection::ExecutiveSummary => (
            400,
            "200-250 words",
            "Summarize the main conclusions for a portfolio manager.",
        ),
        ReportSection::MarketAnalysis => (
            600,
            "300-400 words",
            "Analyse what is driving USD/JPY, JGB yields and Japanese money markets, using the metrics.",
        ),
        ReportSection::KeyFindings => (
            400,
            "5-7 bullet points",
            "List the most important findings as bullet points.",
        ),
        ReportSection::RiskAssessment => (
            400,
            "200-250 words",
            "Assess the main risks to this view, including the caveats raised in review.",
        ),
        ReportSection::Outlook => (
            300,
            "150-200 words",
            "Give the near-term outlook and the levels and events to watch.",
        ),
    }
}

const SECTION_TEMPLATE: &str = r"Write the {{ section }} section of a {{ kind }} on Japanese FX and rates markets.
{{ brief }}
Target length: {{ target }}. Do not repeat the section heading.

Market summary:
{{ summary }}

Key metrics:
- USD/JPY: {{ usd_jpy }}
- Implied EUR/USD: {{ implied_eurusd }}
- US-Japan 10Y differential: {{ differential }}
- Sentiment: {{ sentiment }}
{% if insights %}
Analysis insights:
{% for insight in insights %}- {{ insight }}
{% endfor %}{% endif %}{% if caveats %}
Review caveats:
{% for caveat in caveats %}- {{ caveat }}
{% endfor %}{% endif %}
Review confidence: {{ confidence }}/100";

fn section_name(section: ReportSection) -> &'static str {
    section.header().trim_start_matches("## ")
}

fn kind_label(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::WeeklyReport => "weekly strategist report",
        ReportKind::DailyBrief => "daily market brief",
    }
}

/// Join the sections, appendix and disclaimer into one markdown document
pub fn compile_report(
    kind: ReportKind,
    date: &str,
    sections: &ReportSections,
    appendix: &str,
) -> String {
    let mut parts = vec![format!("# {}", kind.heading()), format!("**Date:** {date}")];
    for section in ReportSection::ALL {
        let body = sections.get(&section).map_or("", |text| text.trim());
        parts.push(format!("{}\n\n{body}", section.header()));
    }
    parts.push(format!("{APPENDIX_HEADER}\n\n{}", appendix.trim()));
    parts.push("---".to_string());
    parts.push(DISCLAIMER.to_string());
    parts.join("\n\n") + "\n"
}

/// Cleaned first line, or the rate-based fallback when it is too short
pub(crate) fn clean_title(response: &str, usd_jpy: f64) -> ParseOutcome<String> {
    let mut title = response.lines().next().unwrap_or_default().trim();
    if title.to_ascii_lowercase().starts_with("title:") {
        title = title["title:".len()..].trim();
    }
    let title = title
        .trim_matches(|c| matches!(c, '"' | '\'' | '\u{201c}' | '\u{201d}' | '*' | '#'))
        .trim();

    let length = title.chars().count();
    let usable = length >= MIN_TITLE_CHARS;
    ParseOutcome::parse_or(usable.then(|| title.to_string()), || {
        format!("Japan FX Analysis: USD/JPY at {usd_jpy:.2}")
    })
}

/// Writes the five sections, the appendix, the compiled report and its title
pub struct ReportGenerationStage {
    analyst: Arc<dyn CompletionService>,
    kind: ReportKind,
    template: JinjaTemplate,
}

impl ReportGenerationStage {
    pub fn new(analyst: Arc<dyn CompletionService>, kind: ReportKind) -> Result<Self> {
        Ok(Self {
            analyst,
            kind,
            template: JinjaTemplate::new("report_section", SECTION_TEMPLATE)?,
        })
    }

    fn section_prompt(&self, section: ReportSection, context: &PipelineContext) -> Result<String> {
        let (_, target, brief) = section_brief(section);
        let metrics = context.calculations.as_ref().map(|c| &c.basic_metrics);
        let validation = context.validation_results.as_ref();

        let vars = json!({
            "section": section_name(section),
            "kind": kind_label(self.kind),
            "brief": brief,
            "target": target,
            "summary": context.summary,
            "usd_jpy": or_na(context.raw_data.usd_jpy()),
            "implied_eurusd": or_na(metrics.and_then(|m| m.implied_eurusd)),
            "differential": or_na(metrics.and_then(|m| m.rate_differential_10y)),
            "sentiment": metrics.map_or_else(
                || "N/A".to_string(),
                |m| format!("{} ({}/100)", m.sentiment_interpretation, m.sentiment_score),
            ),
            "insights": context
                .analysis_plan
                .iter()
                .map(|record| format!("{} {}", record.question, record.insight))
                .collect::<Vec<_>>(),
            "caveats": validation.map(|v| v.caveats.clone()).unwrap_or_default(),
            "confidence": validation.map_or_else(|| "N/A".to_string(), |v| v.confidence_score.to_string()),
        });
        Ok(self.template.render(&vars)?)
    }

    fn appendix_prompt(context: &PipelineContext) -> String {
        let categories: Vec<&str> = RawCategory::ALL
            .iter()
            .filter(|c| context.raw_data.has(**c))
            .map(|c| c.key())
            .collect();
        let evidence: Vec<&str> = context.enhanced_data.keys().map(String::as_str).collect();

        PromptBuilder::new()
            .text(
                "Write a brief methodology appendix (under 150 words) for a Japan FX research \
                 report. Describe the data sources and the analysis steps in plain language.",
            )
            .section("Facts")
            .field("Market data", "FRED and Alpha Vantage, with reference values where unavailable")
            .field("Data categories", categories.join(", "))
            .field("Supplemental evidence", evidence.join(", "))
            .field("Analytical questions", context.questions.len().to_string())
            .field("Analyses performed", context.analysis_plan.len().to_string())
            .when(
                context.validation_results.is_some(),
                "Steps: summary, evidence gathering, gap identification, reasoning, calculation, independent review\n",
            )
            .build()
    }

    fn title_prompt(&self, sections: &ReportSections) -> String {
        let summary = sections
            .get(&ReportSection::ExecutiveSummary)
            .map_or("", String::as_str);
        PromptBuilder::new()
            .text(format!(
                "Write a concise, professional title (at most 12 words) for a {} with this executive summary:",
                kind_label(self.kind)
            ))
            .blank_line()
            .text(truncate_chars(summary, 500))
            .blank_line()
            .text("Return only the title.")
            .build()
    }
}

#[async_trait]
impl Stage for ReportGenerationStage {
    fn id(&self) -> StageId {
        StageId::ReportGeneration
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let appendix = self
            .analyst
            .complete(
                &Self::appendix_prompt(context),
                SYSTEM_PROMPT,
                APPENDIX_MAX_TOKENS,
            )
            .await;

        let mut sections = ReportSections::new();
        for section in ReportSection::ALL {
            let (max_tokens, _, _) = section_brief(section);
            let prompt = self.section_prompt(section, context)?;
            let text = self.analyst.complete(&prompt, SYSTEM_PROMPT, max_tokens).await;
            sections.insert(section, text.trim().to_string());
        }

        let date = context.started_at().format("%B %d, %Y").to_string();
        let report = compile_report(self.kind, &date, &sections, &appendix);

        let title_response = self
            .analyst
            .complete(&self.title_prompt(&sections), SYSTEM_PROMPT, TITLE_MAX_TOKENS)
            .await;
        let usd_jpy = context.raw_data.usd_jpy().unwrap_or(FALLBACK_USD_JPY);
        let title = clean_title(&title_response, usd_jpy);
        if title.is_fallback() {
            warn!("Generated title unusable, using rate-based title");
        }
        let title_fallback = title.is_fallback();

        info!(
            sections = sections.len(),
            report_length = report.len(),
            "Report generated"
        );
        context.add_stage_output(
            StageId::ReportGeneration.key(),
            json!({
                "sections_generated": sections.len(),
                "report_length": report.len(),
                "title_fallback": title_fallback,
            }),
        );
        context.report_sections = sections;
        context.final_report = report;
        context.title = title.into_inner();
        Ok(())
    }
}
