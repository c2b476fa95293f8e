//! Terminal and file output for the CLI

use anyhow::Context as _;
use comfy_table::{ContentArrangement, Table};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use yensense_core::{PipelineContext, StageId};
use yensense_pipeline::PipelineRun;

/// One row per stage that ran, plus the run state and error count
pub fn summary_table(run: &PipelineRun) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Stage", "Output"]);

    for id in &run.stages_run {
        let output = run
            .context
            .get_stage_output(id.key())
            .map_or_else(|| "-".to_string(), ToString::to_string);
        table.add_row(vec![id.name().to_string(), output]);
    }

    table.add_row(vec!["Run".to_string(), format!("{} ({})", run.run_id, run.state)]);
    table.add_row(vec![
        "Errors".to_string(),
        run.context.errors().len().to_string(),
    ]);
    table
}

/// Stage names in pipeline order, one per line
pub fn stage_list() -> String {
    let mut out = String::new();
    for id in StageId::ALL {
        let marker = if id.is_foundational() { " (foundational)" } else { "" };
        let _ = writeln!(out, "{}. {}{}", id.position(), id.name(), marker);
    }
    out
}

/// `<dir>/report_<YYYYMMDD>.md`, dated by the run start
pub fn report_path(dir: &Path, context: &PipelineContext) -> PathBuf {
    dir.join(format!(
        "report_{}.md",
        context.started_at().format("%Y%m%d")
    ))
}

pub fn write_report(dir: &Path, context: &PipelineContext) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = report_path(dir, context);
    std::fs::write(&path, &context.final_report)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "Saved markdown report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yensense_pipeline::RunState;

    fn finished_run() -> PipelineRun {
        let mut context = PipelineContext::new();
        context.add_stage_output(
            StageId::DataCollection.key(),
            serde_json::json!({ "sources_fetched": 7 }),
        );
        context.add_error("Fetch failed for repo_rates: timeout");
        context.final_report = "# Report\n".to_string();
        PipelineRun {
            run_id: "20260105_083000".to_string(),
            state: RunState::Completed,
            context,
            stages_run: vec![StageId::DataCollection, StageId::InitialSummary],
        }
    }

    #[test]
    fn test_summary_table_rows() {
        let rendered = summary_table(&finished_run()).to_string();
        assert!(rendered.contains("DataCollection"));
        assert!(rendered.contains("sources_fetched"));
        assert!(rendered.contains("20260105_083000"));
        // InitialSummary ran without recording an output
        assert!(rendered.contains("InitialSummary"));
    }

    #[test]
    fn test_stage_list_order() {
        let list = stage_list();
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "1. DataCollection (foundational)");
        assert_eq!(lines[7], "8. ReportGeneration");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");
        let run = finished_run();

        let path = write_report(&target, &run.context).unwrap();
        assert_eq!(path, report_path(&target, &run.context));
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("report_")
        );
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report\n");
    }
}
