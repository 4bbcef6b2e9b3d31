use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;

/// One complaint row as read from the input table, before any derivation.
/// Absent or empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawComplaintRow {
    pub serial_number: Option<String>,
    pub machine_model: Option<String>,
    pub power: Option<String>,
    pub problem_description: Option<String>,
    pub solution: Option<String>,
    pub complaint_time: Option<String>,
    /// Every original cell keyed by its header
    pub source_row: BTreeMap<String, String>,
}

/// Which logical columns the complaint table carried.
/// A missing column skips the derivation step that depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPresence {
    pub serial_number: bool,
    pub machine_model: bool,
    pub power: bool,
    pub problem_description: bool,
    pub solution: bool,
    pub complaint_time: bool,
}

impl ColumnPresence {
    /// All columns present
    pub fn all() -> Self {
        Self {
            serial_number: true,
            machine_model: true,
            power: true,
            problem_description: true,
            solution: true,
            complaint_time: true,
        }
    }
}

impl Default for ColumnPresence {
    fn default() -> Self {
        Self::all()
    }
}

/// A batch of complaint rows plus the column layout they came with
#[derive(Debug, Clone, Default)]
pub struct ComplaintBatch {
    pub rows: Vec<RawComplaintRow>,
    pub columns: ColumnPresence,
}

impl ComplaintBatch {
    pub fn new(rows: Vec<RawComplaintRow>) -> Self {
        Self {
            rows,
            columns: ColumnPresence::all(),
        }
    }

    pub fn with_columns(rows: Vec<RawComplaintRow>, columns: ColumnPresence) -> Self {
        Self { rows, columns }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUnit {
    #[serde(rename = "W")]
    Watt,
    #[serde(rename = "KW")]
    Kilowatt,
}

impl PowerUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUnit::Watt => constants::UNIT_WATT,
            PowerUnit::Kilowatt => constants::UNIT_KILOWATT,
        }
    }
}

/// Which reference catalog supplied a record's enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogSource {
    A,
    B,
}

/// One customer-reported issue, annotated in place by each pipeline stage.
/// Stages add derived fields and never clear the raw ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub row_index: usize,
    pub source_row: BTreeMap<String, String>,

    pub serial_number_raw: Option<String>,
    pub serial_number_primary: Option<String>,
    pub serial_number_overflow: Option<Vec<String>>,

    pub machine_type_raw: Option<String>,
    pub machine_type_standard: String,

    pub power_raw: Option<String>,
    pub power_value: Option<f64>,
    pub power_unit: Option<PowerUnit>,

    pub problem_description: Option<String>,
    pub solution_description: Option<String>,

    pub category: String,
    pub alarm_code: Option<String>,
    pub production_period: Option<String>,

    pub complaint_time_raw: Option<String>,
    pub complaint_timestamp: Option<NaiveDateTime>,

    /// Catalog field name -> value; empty when the serial number matched nothing
    pub enrichment: BTreeMap<String, String>,
    pub enrichment_source: Option<CatalogSource>,

    pub processed_at: Option<DateTime<Utc>>,
}

impl ComplaintRecord {
    /// Seed a record from a raw row. Derived fields start at their fallbacks.
    pub fn from_raw(row_index: usize, raw: RawComplaintRow) -> Self {
        Self {
            row_index,
            source_row: raw.source_row,
            serial_number_raw: raw.serial_number.clone(),
            serial_number_primary: raw.serial_number,
            serial_number_overflow: None,
            machine_type_raw: raw.machine_model,
            machine_type_standard: constants::UNKNOWN.to_string(),
            power_raw: raw.power,
            power_value: None,
            power_unit: None,
            problem_description: raw.problem_description,
            solution_description: raw.solution,
            category: constants::OTHER.to_string(),
            alarm_code: None,
            production_period: None,
            complaint_time_raw: raw.complaint_time,
            complaint_timestamp: None,
            enrichment: BTreeMap::new(),
            enrichment_source: None,
            processed_at: None,
        }
    }

    /// Rebuild the raw row this record can be re-run from.
    /// Already-derived values are fed back in as the raw inputs.
    pub fn to_raw_row(&self) -> RawComplaintRow {
        RawComplaintRow {
            serial_number: self.serial_number_primary.clone(),
            machine_model: Some(self.machine_type_standard.clone()),
            power: self.power_value.map(|value| match self.power_unit {
                Some(unit) => format!("{}{}", value, unit.as_str()),
                None => value.to_string(),
            }),
            problem_description: self.problem_description.clone(),
            solution: self.solution_description.clone(),
            complaint_time: self.complaint_time_raw.clone(),
            source_row: self.source_row.clone(),
        }
    }

    /// Flat row handed to the store: native fields plus namespaced enrichment fields
    pub fn to_flat_row(&self) -> BTreeMap<String, serde_json::Value> {
        use serde_json::Value;

        let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        let mut row = BTreeMap::new();
        row.insert("row_index".to_string(), Value::from(self.row_index as u64));
        row.insert("serial_number_raw".to_string(), opt(&self.serial_number_raw));
        row.insert("serial_number".to_string(), opt(&self.serial_number_primary));
        row.insert(
            "serial_number_overflow".to_string(),
            self.serial_number_overflow
                .as_ref()
                .map(|o| Value::String(o.join("; ")))
                .unwrap_or(Value::Null),
        );
        row.insert("machine_type_raw".to_string(), opt(&self.machine_type_raw));
        row.insert(
            "machine_type_standard".to_string(),
            Value::String(self.machine_type_standard.clone()),
        );
        row.insert("power_raw".to_string(), opt(&self.power_raw));
        row.insert(
            "power_value".to_string(),
            self.power_value.map(Value::from).unwrap_or(Value::Null),
        );
        row.insert(
            "power_unit".to_string(),
            self.power_unit
                .map(|u| Value::String(u.as_str().to_string()))
                .unwrap_or(Value::Null),
        );
        row.insert("problem_description".to_string(), opt(&self.problem_description));
        row.insert("solution".to_string(), opt(&self.solution_description));
        row.insert("category".to_string(), Value::String(self.category.clone()));
        row.insert("alarm_code".to_string(), opt(&self.alarm_code));
        row.insert("production_period".to_string(), opt(&self.production_period));
        row.insert("complaint_time".to_string(), opt(&self.complaint_time_raw));
        row.insert(
            "processed_at".to_string(),
            self.processed_at
                .map(|t| Value::String(t.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
        );
        for (field, value) in &self.enrichment {
            row.insert(
                format!("{}{}", constants::ENRICHMENT_PREFIX, field),
                Value::String(value.clone()),
            );
        }
        row
    }
}

/// One row of a reference device catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub serial_number: String,
    /// Descriptive columns other than the serial number key
    pub fields: BTreeMap<String, String>,
}

impl CatalogEntry {
    pub fn product_description(&self) -> Option<&str> {
        constants::columns::PRODUCT_DESCRIPTION
            .iter()
            .find_map(|name| self.fields.get(*name))
            .map(String::as_str)
    }
}

/// One shipment row: a machine type and how many units shipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub machine_type_standard: String,
    pub units: u64,
    pub period: Option<String>,
}

/// Machine type -> shipped unit count for a period
pub type ShipmentAggregate = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectRateRow {
    pub machine_type_standard: String,
    pub defect_count: u64,
    pub shipment_count: u64,
    /// Percent; 0 when nothing shipped
    pub defect_rate: f64,
}

impl DefectRateRow {
    pub fn new(machine_type_standard: String, defect_count: u64, shipment_count: u64) -> Self {
        Self {
            machine_type_standard,
            defect_count,
            shipment_count,
            defect_rate: defect_rate(defect_count, shipment_count),
        }
    }
}

/// Defects per hundred shipped units. Never negative, never NaN.
pub fn defect_rate(defect_count: u64, shipment_count: u64) -> f64 {
    if shipment_count > 0 {
        defect_count as f64 / shipment_count as f64 * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueStat {
    pub category: String,
    /// Rows in the category, counted whether or not they carry a serial number
    pub issue_count: u64,
    /// Percent of the analyzed complaint set
    pub percentage: f64,
    pub dominant_machine_type: String,
}

/// A representative complaint for a concentrated issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSample {
    pub serial_number: Option<String>,
    pub problem_description: Option<String>,
    pub complaint_time: Option<String>,
    pub machine_type_standard: String,
}

impl From<&ComplaintRecord> for CaseSample {
    fn from(record: &ComplaintRecord) -> Self {
        Self {
            serial_number: record.serial_number_primary.clone(),
            problem_description: record.problem_description.clone(),
            complaint_time: record.complaint_time_raw.clone(),
            machine_type_standard: record.machine_type_standard.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSampleGroup {
    pub category: String,
    pub cases: Vec<CaseSample>,
}

/// Output of the concentrated-issue pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationReport {
    pub issue_stats: Vec<IssueStat>,
    pub concentrated_issues: Vec<IssueStat>,
    pub case_samples: Vec<CaseSampleGroup>,
}

/// Headline numbers for a periodic report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub month: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub total_complaints: usize,
    pub machine_type_count: usize,
    pub total_shipments: u64,
    pub average_defect_rate: f64,
    pub top_issue: Option<String>,
}
