use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::app::ports::ReportOutputPort;
use crate::types::{ComplaintRecord, ConcentrationReport, DefectRateRow, ReportSummary};

pub const ANNOTATED_COMPLAINTS_FILE: &str = "annotated_complaints.json";
pub const DEFECT_RATE_FILE: &str = "defect_rate.json";
pub const ISSUE_STATS_FILE: &str = "issue_stats.json";
pub const CONCENTRATED_ISSUES_FILE: &str = "concentrated_issues.json";
pub const CASE_SAMPLES_FILE: &str = "case_samples.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// File-based implementation of ReportOutputPort.
/// Writes each output table as pretty JSON into one directory.
pub struct FileReportOutputAdapter {
    output_dir: PathBuf,
}

impl FileReportOutputAdapter {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
        info!(dir = %output_dir.display(), "Writing report outputs");
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!(path = %path.display(), "Wrote report output");
        Ok(())
    }
}

#[async_trait]
impl ReportOutputPort for FileReportOutputAdapter {
    async fn write_annotated_complaints(&self, records: &[ComplaintRecord]) -> Result<()> {
        let rows: Vec<_> = records.iter().map(ComplaintRecord::to_flat_row).collect();
        self.write_json(ANNOTATED_COMPLAINTS_FILE, &rows)
    }

    async fn write_defect_rates(&self, rows: &[DefectRateRow]) -> Result<()> {
        self.write_json(DEFECT_RATE_FILE, rows)
    }

    async fn write_concentration(&self, report: &ConcentrationReport) -> Result<()> {
        self.write_json(ISSUE_STATS_FILE, &report.issue_stats)?;
        self.write_json(CONCENTRATED_ISSUES_FILE, &report.concentrated_issues)?;
        self.write_json(CASE_SAMPLES_FILE, &report.case_samples)
    }

    async fn write_summary(&self, summary: &ReportSummary) -> Result<()> {
        self.write_json(SUMMARY_FILE, summary)
    }
}
