use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use super::complained_in_month;
use crate::constants;
use crate::types::{ComplaintRecord, DefectRateRow, ShipmentAggregate, ShipmentRecord};

/// Restricts a defect-rate computation to one period and/or some machine types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefectRateFilter {
    /// `YYYY-MM`
    pub period: Option<String>,
    /// Machine types to keep; empty or containing "all" keeps everything
    pub machine_types: Vec<String>,
}

impl DefectRateFilter {
    fn keeps_machine_type(&self, machine_type: &str) -> bool {
        if self.machine_types.is_empty()
            || self.machine_types.iter().any(|m| constants::is_all_sentinel(m))
        {
            return true;
        }
        self.machine_types.iter().any(|m| m == machine_type)
    }
}

/// Sum shipped units per standardized machine type
pub fn aggregate_shipments<'a>(shipments: impl IntoIterator<Item = &'a ShipmentRecord>) -> ShipmentAggregate {
    let mut totals = ShipmentAggregate::new();
    for shipment in shipments {
        *totals.entry(shipment.machine_type_standard.clone()).or_insert(0) += shipment.units;
    }
    totals
}

/// Defect rate per machine type: complaints over shipped units, outer-joined on machine type.
/// Rows come back ordered by machine type.
pub fn compute_defect_rate(
    complaints: &[ComplaintRecord],
    shipments: &[ShipmentRecord],
    filter: &DefectRateFilter,
) -> Vec<DefectRateRow> {
    if complaints.is_empty() || shipments.is_empty() {
        return Vec::new();
    }

    let mut defects: BTreeMap<&str, u64> = BTreeMap::new();
    for record in complaints {
        if let Some(period) = &filter.period {
            if !complained_in_month(record, period) {
                continue;
            }
        }
        *defects.entry(record.machine_type_standard.as_str()).or_insert(0) += 1;
    }

    let shipped = aggregate_shipments(shipments.iter().filter(|s| match (&filter.period, &s.period) {
        (Some(wanted), Some(period)) => period.trim() == wanted.trim(),
        _ => true,
    }));

    let machine_types: BTreeSet<&str> = defects
        .keys()
        .copied()
        .chain(shipped.keys().map(String::as_str))
        .collect();

    let rows: Vec<DefectRateRow> = machine_types
        .into_iter()
        .filter(|m| filter.keeps_machine_type(m))
        .map(|m| {
            DefectRateRow::new(
                m.to_string(),
                defects.get(m).copied().unwrap_or(0),
                shipped.get(m).copied().unwrap_or(0),
            )
        })
        .collect();

    info!(rows = rows.len(), period = ?filter.period, "Defect rates computed");
    rows
}
