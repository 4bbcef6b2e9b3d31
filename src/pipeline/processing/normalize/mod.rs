pub mod fields;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use fields::{
    append_overflow_note, mentions_micro_inverter, split_serial_field, standardize_machine_type,
    standardize_power, SerialSplit,
};

use super::RecordStage;
use crate::constants;
use crate::observability::metrics;
use crate::types::{ColumnPresence, ComplaintRecord};

/// One entry of an ordered keyword -> category table.
/// Tables are walked front to back and the first hit wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub keyword: String,
    pub category: String,
}

impl KeywordMapping {
    pub fn new(keyword: &str, category: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            category: category.to_string(),
        }
    }
}

/// Immutable rule tables for field-level normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRules {
    /// Serial-number separators in precedence order
    pub separators: Vec<char>,
    /// Keywords that identify micro-inverter products
    pub micro_inverter_keywords: Vec<String>,
    /// Matched by substring against the lower-cased label
    pub machine_type_keywords: Vec<KeywordMapping>,
    /// Matched by substring against the upper-cased label when no keyword hits
    pub product_codes: Vec<KeywordMapping>,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        use constants::*;

        Self {
            separators: vec![',', ';', ' ', '，', '、'],
            micro_inverter_keywords: ["micro-inverter", "micro inverter", "microinverter", "微逆"]
                .into_iter()
                .map(String::from)
                .collect(),
            machine_type_keywords: vec![
                KeywordMapping::new("微逆", MICRO_INVERTER),
                KeywordMapping::new("micro-inverter", MICRO_INVERTER),
                KeywordMapping::new("micro inverter", MICRO_INVERTER),
                KeywordMapping::new("microinverter", MICRO_INVERTER),
                KeywordMapping::new("组串单相", SINGLE_PHASE_STRING),
                KeywordMapping::new("string single-phase", SINGLE_PHASE_STRING),
                KeywordMapping::new("组串三相", THREE_PHASE_STRING),
                KeywordMapping::new("string three-phase", THREE_PHASE_STRING),
                KeywordMapping::new("储能单相", SINGLE_PHASE_STORAGE),
                KeywordMapping::new("storage single-phase", SINGLE_PHASE_STORAGE),
                KeywordMapping::new("储能三相低压", LOW_VOLTAGE_THREE_PHASE_STORAGE),
                KeywordMapping::new("storage three-phase low-voltage", LOW_VOLTAGE_THREE_PHASE_STORAGE),
                KeywordMapping::new("储能三相高压", HIGH_VOLTAGE_THREE_PHASE_STORAGE),
                KeywordMapping::new("storage three-phase high-voltage", HIGH_VOLTAGE_THREE_PHASE_STORAGE),
                KeywordMapping::new("裂相", SPLIT_PHASE_STORAGE),
                KeywordMapping::new("split-phase", SPLIT_PHASE_STORAGE),
                KeywordMapping::new("离网机", SINGLE_PHASE_STORAGE),
                KeywordMapping::new("off-grid", SINGLE_PHASE_STORAGE),
                KeywordMapping::new("pcs", COMMERCIAL_STORAGE),
                KeywordMapping::new("mppt", COMMERCIAL_STORAGE),
                KeywordMapping::new("sts", COMMERCIAL_STORAGE),
                KeywordMapping::new("微储", BALCONY_STORAGE),
                KeywordMapping::new("micro-storage", BALCONY_STORAGE),
                KeywordMapping::new("阳台", BALCONY_STORAGE),
                KeywordMapping::new("balcony", BALCONY_STORAGE),
            ],
            product_codes: vec![
                KeywordMapping::new("LP1", SINGLE_PHASE_STORAGE),
                KeywordMapping::new("LP2", SPLIT_PHASE_STORAGE),
                KeywordMapping::new("LP3", LOW_VOLTAGE_THREE_PHASE_STORAGE),
                KeywordMapping::new("HP3", HIGH_VOLTAGE_THREE_PHASE_STORAGE),
                KeywordMapping::new("MG", MICRO_INVERTER),
                KeywordMapping::new("OG", SINGLE_PHASE_STORAGE),
                KeywordMapping::new("P1", SINGLE_PHASE_STRING),
                KeywordMapping::new("P3", THREE_PHASE_STRING),
            ],
        }
    }
}

impl NormalizeRules {
    /// Every value `standardize_machine_type` can produce, fallbacks included
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.machine_type_keywords
            .iter()
            .chain(self.product_codes.iter())
            .map(|m| m.category.as_str())
            .chain([constants::UNKNOWN, constants::OTHER])
    }
}

const COMPLAINT_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const COMPLAINT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Parse a date-like complaint time. Unparseable input yields `None`.
pub fn parse_complaint_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    COMPLAINT_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            COMPLAINT_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Field-level normalization stage: serial split, machine type, power, complaint time
pub struct Normalizer<'a> {
    rules: &'a NormalizeRules,
    processed_at: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    pub fn new(rules: &'a NormalizeRules, processed_at: DateTime<Utc>) -> Self {
        Self {
            rules,
            processed_at,
        }
    }
}

impl RecordStage for Normalizer<'_> {
    fn apply(&self, record: &mut ComplaintRecord, columns: &ColumnPresence) {
        if columns.serial_number {
            let split = split_serial_field(record.serial_number_raw.as_deref(), &self.rules.separators);
            if let Some(overflow) = split.overflow_text() {
                debug!(row = record.row_index, overflow = %overflow, "Multiple serial numbers in cell");
                metrics::normalize::serial_overflow();
                record.problem_description = Some(append_overflow_note(
                    record.problem_description.as_deref(),
                    &overflow,
                ));
            }
            record.serial_number_primary = split.primary;
            record.serial_number_overflow = split.overflow;
        }

        record.machine_type_standard = if columns.machine_model {
            standardize_machine_type(record.machine_type_raw.as_deref(), self.rules)
        } else {
            constants::UNKNOWN.to_string()
        };

        if columns.power {
            let (value, unit) = standardize_power(
                record.power_raw.as_deref(),
                &record.machine_type_standard,
                self.rules,
            );
            record.power_value = value;
            record.power_unit = unit;
        }

        if columns.complaint_time {
            record.complaint_timestamp = record
                .complaint_time_raw
                .as_deref()
                .and_then(parse_complaint_time);
        }

        record.processed_at = Some(self.processed_at);
        metrics::normalize::record_normalized(&record.machine_type_standard);
    }

    fn name(&self) -> &'static str {
        "normalize"
    }
}
