use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::types::{ComplaintRecord, DefectRateRow, IssueStat, ReportSummary, ShipmentRecord};

/// Headline figures the report collaborator renders on its cover page
pub fn build_report_summary(
    month: Option<&str>,
    defect_rows: &[DefectRateRow],
    issue_stats: &[IssueStat],
    shipments: &[ShipmentRecord],
    complaints: &[ComplaintRecord],
    generated_at: DateTime<Utc>,
) -> ReportSummary {
    let machine_types: BTreeSet<&str> = complaints
        .iter()
        .map(|c| c.machine_type_standard.as_str())
        .collect();

    let average_defect_rate = if defect_rows.is_empty() {
        0.0
    } else {
        defect_rows.iter().map(|r| r.defect_rate).sum::<f64>() / defect_rows.len() as f64
    };

    ReportSummary {
        month: month.map(String::from),
        generated_at,
        total_complaints: complaints.len(),
        machine_type_count: machine_types.len(),
        total_shipments: shipments.iter().map(|s| s.units).sum(),
        average_defect_rate,
        top_issue: issue_stats.first().map(|s| s.category.clone()),
    }
}
