/// Output vocabulary and column-name constants shared across the pipeline.
/// The standardized machine types double as the join key between complaints and shipments.

// Standardized machine types
pub const MICRO_INVERTER: &str = "Micro Inverter";
pub const SINGLE_PHASE_STRING: &str = "Single-Phase String";
pub const THREE_PHASE_STRING: &str = "Three-Phase String";
pub const SINGLE_PHASE_STORAGE: &str = "Single-Phase Storage";
pub const LOW_VOLTAGE_THREE_PHASE_STORAGE: &str = "Low-Voltage Three-Phase Storage";
pub const HIGH_VOLTAGE_THREE_PHASE_STORAGE: &str = "High-Voltage Three-Phase Storage";
pub const SPLIT_PHASE_STORAGE: &str = "Split-Phase Storage";
pub const COMMERCIAL_STORAGE: &str = "C&I Storage";
pub const BALCONY_STORAGE: &str = "Balcony Storage";

/// Machine type when the label is absent
pub const UNKNOWN: &str = "Unknown";
/// Fallback for machine types and problem categories that match nothing
pub const OTHER: &str = "Other";

/// Machine filter entries that disable filtering
pub const ALL_MACHINE_TYPES: &[&str] = &["all", "全部"];

// Power units
pub const UNIT_WATT: &str = "W";
pub const UNIT_KILOWATT: &str = "KW";

// Enrichment
pub const ENRICHMENT_PREFIX: &str = "sn_info_";

/// Header aliases for each logical input column.
/// The first alias is the canonical English name.
pub mod columns {
    pub const SERIAL_NUMBER: &[&str] = &["SN", "sn", "serial_number"];
    pub const MACHINE_MODEL: &[&str] = &["machine_model", "机器型号"];
    pub const POWER: &[&str] = &["power", "功率"];
    pub const PROBLEM_DESCRIPTION: &[&str] = &["problem_description", "问题描述"];
    pub const SOLUTION: &[&str] = &["solution", "解决办法"];
    pub const COMPLAINT_TIME: &[&str] = &["complaint_time", "客诉时间"];

    pub const PRODUCT_DESCRIPTION: &[&str] = &["product_description", "产品描述"];

    pub const MACHINE_TYPE_STANDARD: &[&str] = &["machine_type_standard", "机型_标准化"];
    pub const SHIPPED_UNITS: &[&str] = &["units", "shipped_units", "出货数"];
    pub const PERIOD: &[&str] = &["period", "month", "期间"];
}

/// Find the position of the first header matching any alias (trimmed, case-insensitive).
pub fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim();
        aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
    })
}

/// Whether a machine filter list disables filtering
pub fn is_all_sentinel(value: &str) -> bool {
    ALL_MACHINE_TYPES
        .iter()
        .any(|s| value.trim().eq_ignore_ascii_case(s))
}
