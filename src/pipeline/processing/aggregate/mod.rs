// Batch reductions over fully annotated complaint records

pub mod concentration;
pub mod defect_rate;
pub mod report;

use serde::{Deserialize, Serialize};

pub use concentration::{analyze_concentration, concentration_threshold, ConcentrationFilter};
pub use defect_rate::{aggregate_shipments, compute_defect_rate, DefectRateFilter};
pub use report::build_report_summary;

use crate::types::ComplaintRecord;

/// Tunables for the concentrated-issue pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateRules {
    /// A category is concentrated at this many complaints at minimum
    pub concentration_min_count: u64,
    /// ...or at this share of the analyzed set, whichever is higher
    pub concentration_ratio: f64,
    pub max_case_samples: usize,
    pub percentage_decimals: u32,
}

impl Default for AggregateRules {
    fn default() -> Self {
        Self {
            concentration_min_count: 3,
            concentration_ratio: 0.05,
            max_case_samples: 10,
            percentage_decimals: 2,
        }
    }
}

/// Whether a record's complaint date falls in the `YYYY-MM` month.
/// Records without a parseable complaint date never match.
pub(crate) fn complained_in_month(record: &ComplaintRecord, month: &str) -> bool {
    record
        .complaint_timestamp
        .is_some_and(|ts| ts.format("%Y-%m").to_string() == month.trim())
}
