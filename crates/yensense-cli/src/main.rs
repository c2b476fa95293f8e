//! YenSense CLI
//!
//! Commands:
//! - `run`     full pipeline, writes the Markdown report
//! - `partial` selected stages only, no report and no snapshot
//! - `fetch`   market data only, printed as JSON
//! - `stages`  list stage names in pipeline order

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use yensense_llm::providers::{OpenAIConfig, OpenAIProvider};
use yensense_llm::{Analyst, CompletionService};
use yensense_market::{MarketDataFetcher, MarketDataSource};
use yensense_pipeline::{AnalysisPipeline, ReportKind};
use yensense_utils::{AppConfig, LogFormat, init_tracing};

mod output;

#[derive(Parser, Debug)]
#[command(name = "yensense")]
#[command(about = "Japan macro & FX narrative pipeline", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "yensense.toml")]
    config: PathBuf,

    /// Log output format, overrides `[logging] format`
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Never call the language model, use fallback text only
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full eight-stage pipeline
    Run {
        /// Report kind: weekly or daily
        #[arg(short, long)]
        kind: Option<ReportKind>,

        /// Skip the context snapshot
        #[arg(long)]
        no_persist: bool,

        /// Where the Markdown report is written, overrides `[output] report_dir`
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Run only the named stages, in pipeline order
    Partial {
        /// Stage name, e.g. `DataCollection`, `validation` or `gap-identification`
        #[arg(short, long = "stage", required = true, num_args = 1..)]
        stages: Vec<String>,
    },

    /// Fetch market data and print it
    Fetch,

    /// List the pipeline stages
    Stages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(
        cli.log_format.unwrap_or(config.logging.format),
        &config.logging.filter,
    );

    match cli.command {
        Commands::Run {
            kind,
            no_persist,
            output_dir,
        } => run(config, cli.offline, kind, !no_persist, output_dir).await,
        Commands::Partial { stages } => partial(config, cli.offline, &stages).await,
        Commands::Fetch => fetch(&config).await,
        Commands::Stages => {
            print!("{}", output::stage_list());
            Ok(())
        }
    }
}

async fn run(
    mut config: AppConfig,
    offline: bool,
    kind: Option<ReportKind>,
    persist: bool,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(kind) = kind {
        config.pipeline.report_kind = kind;
    }
    let report_dir = output_dir.unwrap_or_else(|| config.output.report_dir.clone());

    let pipeline = build_pipeline(&config, offline)?;
    info!(kind = %pipeline.config().report_kind, persist, "Starting pipeline run");
    let run = pipeline.run(persist).await;

    println!("{}", output::summary_table(&run));

    if !run.is_completed() {
        anyhow::bail!("pipeline run {} ended {}", run.run_id, run.state);
    }

    let path = output::write_report(&report_dir, &run.context)?;
    println!("Report: {} ({})", run.context.title, path.display());
    Ok(())
}

async fn partial(config: AppConfig, offline: bool, stages: &[String]) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config, offline)?;
    let run = pipeline.run_partial(stages).await;
    println!("{}", output::summary_table(&run));

    if run.stages_run.is_empty() {
        warn!("No known stage names given, see `yensense stages`");
    }
    Ok(())
}

async fn fetch(config: &AppConfig) -> anyhow::Result<()> {
    let fetcher = MarketDataFetcher::new(&config.market.market_config())?;
    let data = fetcher.fetch_all().await;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn build_pipeline(config: &AppConfig, offline: bool) -> anyhow::Result<AnalysisPipeline> {
    let source: Arc<dyn MarketDataSource> =
        Arc::new(MarketDataFetcher::new(&config.market.market_config())?);
    let analyst = build_analyst(config, offline)?;
    Ok(AnalysisPipeline::standard(
        source,
        analyst,
        config.pipeline.clone(),
    )?)
}

fn build_analyst(config: &AppConfig, offline: bool) -> anyhow::Result<Arc<dyn CompletionService>> {
    let api_key = config.llm.api_key.as_deref().filter(|_| !offline);
    let Some(api_key) = api_key else {
        if !offline {
            warn!("No OpenAI API key configured, running with fallback analysis text");
        }
        return Ok(Arc::new(Analyst::offline()));
    };

    let mut provider_config = OpenAIConfig::new(api_key).with_timeout(config.llm.timeout_secs);
    if let Some(base) = &config.llm.api_base {
        provider_config = provider_config.with_api_base(base);
    }
    let provider = OpenAIProvider::with_config(provider_config)?;
    let analyst_config = config.llm.analyst_config();
    info!(model = %analyst_config.model, "Using OpenAI-compatible provider");

    Ok(Arc::new(Analyst::new(Arc::new(provider), analyst_config)))
}
