use once_cell::sync::Lazy;
use regex::Regex;

use super::NormalizeRules;
use crate::constants;
use crate::types::PowerUnit;

static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("number pattern is valid"));

/// Result of splitting a serial-number cell that may hold several serials
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerialSplit {
    pub primary: Option<String>,
    /// Tokens after the first; `None` unless the cell held more than one token
    pub overflow: Option<Vec<String>>,
}

impl SerialSplit {
    /// Overflow tokens as they appear in the problem-description note
    pub fn overflow_text(&self) -> Option<String> {
        self.overflow.as_ref().map(|tokens| tokens.join("; "))
    }
}

/// Split a serial-number cell on the first listed separator it contains.
pub fn split_serial_field(raw: Option<&str>, separators: &[char]) -> SerialSplit {
    let Some(raw) = raw else {
        return SerialSplit::default();
    };

    let Some(separator) = separators.iter().find(|sep| raw.contains(**sep)) else {
        let trimmed = raw.trim();
        return SerialSplit {
            primary: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            overflow: None,
        };
    };

    let mut tokens = raw
        .split(*separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    let primary = tokens.next();
    let rest: Vec<String> = tokens.collect();

    SerialSplit {
        primary,
        overflow: (!rest.is_empty()).then_some(rest),
    }
}

/// Append the overflow serial list to a problem description
pub fn append_overflow_note(description: Option<&str>, overflow: &str) -> String {
    match description {
        Some(desc) => format!("{} [multiple SN: {}]", desc, overflow),
        None => format!("[multiple SN: {}]", overflow),
    }
}

/// Map a free-form machine label onto the standardized vocabulary.
/// Total: every input yields some category.
pub fn standardize_machine_type(label: Option<&str>, rules: &NormalizeRules) -> String {
    let Some(label) = label else {
        return constants::UNKNOWN.to_string();
    };

    // Already-standard labels map to themselves
    let trimmed = label.trim();
    if let Some(standard) = rules
        .vocabulary()
        .find(|standard| standard.eq_ignore_ascii_case(trimmed))
    {
        return standard.to_string();
    }

    let lower = label.to_lowercase();
    if let Some(mapping) = rules
        .machine_type_keywords
        .iter()
        .find(|m| lower.contains(&m.keyword.to_lowercase()))
    {
        return mapping.category.clone();
    }

    let upper = label.to_uppercase();
    if let Some(mapping) = rules
        .product_codes
        .iter()
        .find(|m| upper.contains(&m.keyword.to_uppercase()))
    {
        return mapping.category.clone();
    }

    constants::OTHER.to_string()
}

/// Whether any micro-inverter keyword occurs in the text (case-insensitive)
pub fn mentions_micro_inverter(text: &str, rules: &NormalizeRules) -> bool {
    let lower = text.to_lowercase();
    rules
        .micro_inverter_keywords
        .iter()
        .any(|k| lower.contains(&k.to_lowercase()))
}

/// Extract a numeric power rating and resolve its unit.
///
/// Micro-inverters are rated in watts, so a micro-inverter keyword in the power
/// text or a standardized type of Micro Inverter keeps the number as watts.
/// Otherwise a bare watt figure is converted to kilowatts and anything else is
/// taken as kilowatts. The standardized type is stable across re-runs, unlike
/// the raw label.
pub fn standardize_power(
    raw: Option<&str>,
    machine_type_standard: &str,
    rules: &NormalizeRules,
) -> (Option<f64>, Option<PowerUnit>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    let Some(value) = NUMBER_PATTERN
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
    else {
        return (None, None);
    };

    let micro =
        mentions_micro_inverter(raw, rules) || machine_type_standard == constants::MICRO_INVERTER;
    if micro {
        return (Some(value), Some(PowerUnit::Watt));
    }

    let lower = raw.to_lowercase();
    if lower.contains('w') && !lower.contains("kw") {
        (Some(value / 1000.0), Some(PowerUnit::Kilowatt))
    } else {
        (Some(value), Some(PowerUnit::Kilowatt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> NormalizeRules {
        NormalizeRules::default()
    }

    #[test]
    fn test_split_two_serials() {
        let split = split_serial_field(Some("A001, B002"), &rules().separators);
        assert_eq!(split.primary.as_deref(), Some("A001"));
        assert_eq!(split.overflow, Some(vec!["B002".to_string()]));
        assert_eq!(split.overflow_text().as_deref(), Some("B002"));
    }

    #[test]
    fn test_split_uses_first_listed_separator() {
        // comma precedes space in the separator list
        let split = split_serial_field(Some("A001 X,B002 Y,C003"), &rules().separators);
        assert_eq!(split.primary.as_deref(), Some("A001 X"));
        assert_eq!(
            split.overflow,
            Some(vec!["B002 Y".to_string(), "C003".to_string()])
        );
    }

    #[test]
    fn test_split_cjk_separators() {
        let split = split_serial_field(Some("A001、B002、C003"), &rules().separators);
        assert_eq!(split.primary.as_deref(), Some("A001"));
        assert_eq!(split.overflow_text().as_deref(), Some("B002; C003"));

        let split = split_serial_field(Some("A001，B002"), &rules().separators);
        assert_eq!(split.primary.as_deref(), Some("A001"));
    }

    #[test]
    fn test_split_single_token() {
        let split = split_serial_field(Some("  2308ABC  "), &rules().separators);
        assert_eq!(split.primary.as_deref(), Some("2308ABC"));
        assert!(split.overflow.is_none());

        // separator present but only one non-empty token
        let split = split_serial_field(Some("2308ABC,"), &rules().separators);
        assert_eq!(split.primary.as_deref(), Some("2308ABC"));
        assert!(split.overflow.is_none());
    }

    #[test]
    fn test_split_on_space_and_semicolon() {
        let r = rules();
        for raw in ["A001 B002", "A001;B002", "A001、B002", "A001，B002"] {
            let split = split_serial_field(Some(raw), &r.separators);
            assert_eq!(split.primary.as_deref(), Some("A001"), "{raw}");
            assert_eq!(split.overflow, Some(vec!["B002".to_string()]), "{raw}");
        }
    }

    #[test]
    fn test_split_whitespace_only_cell() {
        let split = split_serial_field(Some("   "), &rules().separators);
        assert_eq!(split, SerialSplit::default());
    }

    #[test]
    fn test_split_absent() {
        assert_eq!(split_serial_field(None, &rules().separators), SerialSplit::default());
    }

    #[test]
    fn test_overflow_note() {
        assert_eq!(
            append_overflow_note(Some("no output"), "B002"),
            "no output [multiple SN: B002]"
        );
        assert_eq!(append_overflow_note(None, "B002"), "[multiple SN: B002]");
    }

    #[test]
    fn test_machine_type_keywords() {
        let r = rules();
        assert_eq!(standardize_machine_type(Some("800W 微逆"), &r), constants::MICRO_INVERTER);
        assert_eq!(
            standardize_machine_type(Some("组串单相 5K"), &r),
            constants::SINGLE_PHASE_STRING
        );
        assert_eq!(
            standardize_machine_type(Some("Storage three-phase high-voltage 10kW"), &r),
            constants::HIGH_VOLTAGE_THREE_PHASE_STORAGE
        );
        assert_eq!(standardize_machine_type(Some("PCS-100"), &r), constants::COMMERCIAL_STORAGE);
        assert_eq!(standardize_machine_type(Some("离网机"), &r), constants::SINGLE_PHASE_STORAGE);
    }

    #[test]
    fn test_machine_type_keyword_order_wins() {
        // "split-phase" and "off-grid" both present: the earlier table entry wins
        let r = rules();
        assert_eq!(
            standardize_machine_type(Some("off-grid split-phase unit"), &r),
            constants::SPLIT_PHASE_STORAGE
        );
    }

    #[test]
    fn test_machine_type_product_codes() {
        let r = rules();
        assert_eq!(standardize_machine_type(Some("hp3-10k"), &r), constants::HIGH_VOLTAGE_THREE_PHASE_STORAGE);
        assert_eq!(standardize_machine_type(Some("x-lp2"), &r), constants::SPLIT_PHASE_STORAGE);
        assert_eq!(standardize_machine_type(Some("P3 8K"), &r), constants::THREE_PHASE_STRING);
    }

    #[test]
    fn test_machine_type_fallbacks() {
        let r = rules();
        assert_eq!(standardize_machine_type(None, &r), constants::UNKNOWN);
        assert_eq!(standardize_machine_type(Some("toaster"), &r), constants::OTHER);
    }

    #[test]
    fn test_machine_type_idempotent_on_vocabulary() {
        let r = rules();
        for standard in r.vocabulary() {
            assert_eq!(standardize_machine_type(Some(standard), &r), standard);
        }
    }

    #[test]
    fn test_power_watts_to_kilowatts() {
        let r = rules();
        assert_eq!(
            standardize_power(Some("350W"), constants::SINGLE_PHASE_STRING, &r),
            (Some(0.35), Some(PowerUnit::Kilowatt))
        );
    }

    #[test]
    fn test_power_micro_inverter_keeps_watts() {
        let r = rules();
        assert_eq!(
            standardize_power(Some("350W"), constants::MICRO_INVERTER, &r),
            (Some(350.0), Some(PowerUnit::Watt))
        );
        assert_eq!(
            standardize_power(Some("微逆350W"), constants::UNKNOWN, &r),
            (Some(350.0), Some(PowerUnit::Watt))
        );
    }

    #[test]
    fn test_power_product_code_micro_is_stable() {
        // "MG800" only reaches Micro Inverter through the product-code table
        let r = rules();
        let standard = standardize_machine_type(Some("MG800"), &r);
        assert_eq!(standard, constants::MICRO_INVERTER);

        let first = standardize_power(Some("800W"), &standard, &r);
        assert_eq!(first, (Some(800.0), Some(PowerUnit::Watt)));

        let rerun_label = standardize_machine_type(Some(standard.as_str()), &r);
        let second = standardize_power(Some("800W"), &rerun_label, &r);
        assert_eq!(first, second);
    }

    #[test]
    fn test_power_kilowatt_and_bare_numbers() {
        let r = rules();
        assert_eq!(standardize_power(Some("5.5kW"), constants::UNKNOWN, &r), (Some(5.5), Some(PowerUnit::Kilowatt)));
        assert_eq!(standardize_power(Some("10"), constants::UNKNOWN, &r), (Some(10.0), Some(PowerUnit::Kilowatt)));
    }

    #[test]
    fn test_power_unparseable() {
        let r = rules();
        assert_eq!(standardize_power(Some("n/a"), constants::UNKNOWN, &r), (None, None));
        assert_eq!(standardize_power(None, constants::UNKNOWN, &r), (None, None));
    }
}
