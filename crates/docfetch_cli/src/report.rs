use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use docfetch_core::PipelineReport;
use docfetch_engine::AtomicFileWriter;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    started_utc: DateTime<Utc>,
    finished_utc: DateTime<Utc>,
    #[serde(flatten)]
    report: &'a PipelineReport,
}

/// Serialize `report` with run timestamps and write it atomically to `path`.
pub fn write(
    path: &Path,
    report: &PipelineReport,
    started_utc: DateTime<Utc>,
    finished_utc: DateTime<Utc>,
) -> anyhow::Result<PathBuf> {
    let content = render(report, started_utc, finished_utc)?;
    let (writer, filename) = AtomicFileWriter::for_target(path)?;
    let written = writer
        .write(&filename, content.as_bytes())
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(written)
}

fn render(
    report: &PipelineReport,
    started_utc: DateTime<Utc>,
    finished_utc: DateTime<Utc>,
) -> anyhow::Result<String> {
    let file = ReportFile {
        started_utc,
        finished_utc,
        report,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// One-line summary for the log.
pub fn summary(report: &PipelineReport) -> String {
    let zip = report
        .zip
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "downloaded={} skipped={} failed={} zip={}",
        report.downloaded.len(),
        report.skipped.len(),
        report.failed.len(),
        zip
    )
}
