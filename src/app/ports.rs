use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ComplaintRecord, ConcentrationReport, DefectRateRow, ReportSummary};

/// Report-side sink for pipeline outputs. Rendering charts or documents is up to the implementor.
#[async_trait]
pub trait ReportOutputPort: Send + Sync {
    async fn write_annotated_complaints(&self, records: &[ComplaintRecord]) -> Result<()>;
    async fn write_defect_rates(&self, rows: &[DefectRateRow]) -> Result<()>;
    async fn write_concentration(&self, report: &ConcentrationReport) -> Result<()>;
    async fn write_summary(&self, summary: &ReportSummary) -> Result<()>;
}
