// Pipeline ingestion: CSV readers for complaints, reference catalogs and shipments

pub mod table;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

pub use table::Table;

use crate::constants::columns;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::enrich::CatalogIndex;
use crate::types::{CatalogEntry, ColumnPresence, ComplaintBatch, RawComplaintRow, ShipmentRecord};
use table::cell;

pub fn read_complaints(path: impl AsRef<Path>) -> Result<ComplaintBatch> {
    read_complaints_from(File::open(path)?)
}

/// Read a complaint table. Missing columns are recorded, not rejected.
pub fn read_complaints_from<R: Read>(reader: R) -> Result<ComplaintBatch> {
    let table = Table::read(reader)?;

    let sn = table.column(columns::SERIAL_NUMBER);
    let model = table.column(columns::MACHINE_MODEL);
    let power = table.column(columns::POWER);
    let problem = table.column(columns::PROBLEM_DESCRIPTION);
    let solution = table.column(columns::SOLUTION);
    let time = table.column(columns::COMPLAINT_TIME);

    let presence = ColumnPresence {
        serial_number: sn.is_some(),
        machine_model: model.is_some(),
        power: power.is_some(),
        problem_description: problem.is_some(),
        solution: solution.is_some(),
        complaint_time: time.is_some(),
    };
    if presence != ColumnPresence::all() {
        warn!(?presence, "Complaint table is missing columns; dependent steps will be skipped");
    }

    let rows: Vec<RawComplaintRow> = table
        .rows
        .iter()
        .map(|row| RawComplaintRow {
            serial_number: cell(row, sn),
            machine_model: cell(row, model),
            power: cell(row, power),
            problem_description: cell(row, problem),
            solution: cell(row, solution),
            complaint_time: cell(row, time),
            source_row: table.row_map(row),
        })
        .collect();

    info!(rows = rows.len(), columns = table.headers.len(), "Read complaint table");
    Ok(ComplaintBatch::with_columns(rows, presence))
}

pub fn read_catalog(path: impl AsRef<Path>) -> Result<CatalogIndex> {
    read_catalog_from(File::open(path)?)
}

/// Read a reference catalog and index it by serial number. The `SN` column is required.
/// Blank descriptive cells are left out of an entry's fields.
pub fn read_catalog_from<R: Read>(reader: R) -> Result<CatalogIndex> {
    let table = Table::read(reader)?;
    let sn = table
        .column(columns::SERIAL_NUMBER)
        .ok_or_else(|| PipelineError::MissingColumn(columns::SERIAL_NUMBER[0].to_string()))?;

    let entries = table.rows.iter().filter_map(|row| {
        let serial_number = cell(row, Some(sn))?;
        let fields = table
            .headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, _)| *i != sn)
            .filter_map(|(i, (h, _))| Some((h.clone(), cell(row, Some(i))?)))
            .collect();
        Some(CatalogEntry {
            serial_number,
            fields,
        })
    });

    Ok(CatalogIndex::build(entries))
}

pub fn read_shipments(path: impl AsRef<Path>) -> Result<Vec<ShipmentRecord>> {
    read_shipments_from(File::open(path)?)
}

/// Read shipment rows. A row without a usable unit count counts as one unit.
pub fn read_shipments_from<R: Read>(reader: R) -> Result<Vec<ShipmentRecord>> {
    let table = Table::read(reader)?;
    let machine_type = table.column(columns::MACHINE_TYPE_STANDARD).ok_or_else(|| {
        PipelineError::MissingColumn(columns::MACHINE_TYPE_STANDARD[0].to_string())
    })?;
    let units = table.column(columns::SHIPPED_UNITS);
    let period = table.column(columns::PERIOD);

    let mut shipments = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let Some(machine_type_standard) = cell(row, Some(machine_type)) else {
            skipped += 1;
            continue;
        };
        shipments.push(ShipmentRecord {
            machine_type_standard,
            units: cell(row, units).and_then(|u| parse_units(&u)).unwrap_or(1),
            period: cell(row, period),
        });
    }

    if skipped > 0 {
        warn!(skipped, "Shipment rows without a machine type were ignored");
    }
    info!(rows = shipments.len(), "Read shipment table");
    Ok(shipments)
}

/// Accepts "120", "120.0" and "1,200"
fn parse_units(raw: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<u64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complaints_with_chinese_headers() {
        let data = "SN,机器型号,功率,问题描述,解决办法,客诉时间\n\
                    2308A01,微逆 MG800,800W,不工作,更换,2024-03-05\n\
                    ,,,,,\n";
        let batch = read_complaints_from(data.as_bytes()).unwrap();

        assert_eq!(batch.columns, ColumnPresence::all());
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].machine_model.as_deref(), Some("微逆 MG800"));
        assert_eq!(batch.rows[0].source_row.get("功率").map(String::as_str), Some("800W"));
        assert_eq!(batch.rows[1].serial_number, None);
    }

    #[test]
    fn test_missing_columns_recorded() {
        let data = "SN,problem_description\nA1,broken\n";
        let batch = read_complaints_from(data.as_bytes()).unwrap();
        assert!(batch.columns.serial_number);
        assert!(batch.columns.problem_description);
        assert!(!batch.columns.machine_model);
        assert!(!batch.columns.solution);
        assert_eq!(batch.rows[0].power, None);
    }

    #[test]
    fn test_catalog_requires_sn() {
        let err = read_catalog_from("product_description\nMG800\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(c) if c == "SN"));
    }

    #[test]
    fn test_catalog_excludes_key_field() {
        let data = "SN,product_description,batch\nA1,MG800 micro inverter,B7\n,orphan,B8\n";
        let index = read_catalog_from(data.as_bytes()).unwrap();
        assert_eq!(index.len(), 1);

        let entry = index.get("A1").unwrap();
        assert!(!entry.fields.contains_key("SN"));
        assert_eq!(entry.product_description(), Some("MG800 micro inverter"));
        assert_eq!(entry.fields.get("batch").map(String::as_str), Some("B7"));
    }

    #[test]
    fn test_catalog_drops_blank_cells() {
        let data = "SN,product_description,batch,factory\nA1,,B7,  \n";
        let index = read_catalog_from(data.as_bytes()).unwrap();

        let entry = index.get("A1").unwrap();
        assert_eq!(entry.fields.len(), 1);
        assert_eq!(entry.fields.get("batch").map(String::as_str), Some("B7"));
        assert_eq!(entry.product_description(), None);
    }

    #[test]
    fn test_shipments_units_default_to_one() {
        let data = "machine_type_standard,units,period\n\
                    Micro Inverter,1200,2024-03\n\
                    Micro Inverter,,2024-03\n\
                    Balcony Storage,n/a,\n\
                    ,5,2024-03\n";
        let shipments = read_shipments_from(data.as_bytes()).unwrap();
        assert_eq!(shipments.len(), 3);
        assert_eq!(shipments[0].units, 1200);
        assert_eq!(shipments[1].units, 1);
        assert_eq!(shipments[2].units, 1);
        assert_eq!(shipments[2].period, None);
    }

    #[test]
    fn test_shipments_require_machine_type() {
        let err = read_shipments_from("units\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(_)));
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1,200"), Some(1200));
        assert_eq!(parse_units("12.0"), Some(12));
        assert_eq!(parse_units("-3"), None);
        assert_eq!(parse_units("abc"), None);
    }
}
