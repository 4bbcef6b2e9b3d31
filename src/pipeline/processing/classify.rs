use regex::Regex;
use serde::{Deserialize, Serialize};

use super::RecordStage;
use crate::constants;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::{ColumnPresence, ComplaintRecord};

/// A problem category and the keywords that select it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

pub fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Hardware Failure",
            &[
                "损坏", "故障", "不工作", "无响应", "短路", "断路",
                "damaged", "fault", "not working", "no response", "short circuit", "open circuit",
            ],
        ),
        CategoryRule::new(
            "Software Issue",
            &[
                "程序", "软件", "固件", "升级", "版本", "bug",
                "software", "firmware", "upgrade", "version",
            ],
        ),
        CategoryRule::new(
            "Installation Issue",
            &[
                "安装", "接线", "连接", "配置", "设置",
                "install", "wiring", "connection", "configuration", "setting",
            ],
        ),
        CategoryRule::new(
            "Performance Issue",
            &[
                "效率低", "功率不足", "过热", "噪音",
                "low efficiency", "insufficient power", "overheat", "noise",
            ],
        ),
        CategoryRule::new(
            "Appearance Issue",
            &["划伤", "变形", "颜色", "外观", "scratch", "deformed", "color", "appearance"],
        ),
        CategoryRule::new(constants::OTHER, &[]),
    ]
}

/// Alarm-code shapes, tried in order. Patterns with a capture group yield the group.
pub fn default_alarm_patterns() -> Vec<String> {
    [
        r"ERR\d{2,4}",
        r"ALM\d{2,4}",
        r"F\d{2,4}",
        r"E\d{2,4}",
        r"(?:代码|code)[：:]\s*(\w+)",
        r"(?:报警|alarm)[：:]\s*(\w+)",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Compiled, immutable classification rules
#[derive(Debug, Clone)]
pub struct ClassifyRules {
    pub categories: Vec<CategoryRule>,
    pub default_category: String,
    pub alarm_patterns: Vec<Regex>,
}

impl ClassifyRules {
    /// Compile alarm patterns case-insensitively
    pub fn new(
        categories: Vec<CategoryRule>,
        default_category: String,
        alarm_patterns: &[String],
    ) -> Result<Self> {
        let alarm_patterns = alarm_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            categories,
            default_category,
            alarm_patterns,
        })
    }
}

impl Default for ClassifyRules {
    fn default() -> Self {
        Self::new(
            default_category_rules(),
            constants::OTHER.to_string(),
            &default_alarm_patterns(),
        )
        .expect("built-in alarm patterns compile")
    }
}

/// Pick the first category (in rule order) owning a keyword found in the combined text
pub fn assign_category(problem: Option<&str>, solution: Option<&str>, rules: &ClassifyRules) -> String {
    let combined = format!("{} {}", problem.unwrap_or(""), solution.unwrap_or("")).to_lowercase();

    rules
        .categories
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .any(|keyword| combined.contains(&keyword.to_lowercase()))
        })
        .map(|rule| rule.category.clone())
        .unwrap_or_else(|| rules.default_category.clone())
}

/// First alarm code found by the first pattern that matches anything
pub fn extract_alarm_code(text: Option<&str>, rules: &ClassifyRules) -> Option<String> {
    let text = text?;
    rules.alarm_patterns.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    })
}

/// Decode `YYMM` from the first four characters of a serial number.
/// Month is not range-checked: "2313..." decodes to "2023-13".
pub fn decode_production_period(serial: Option<&str>) -> Option<String> {
    let serial = serial?;
    let prefix: String = serial.chars().take(4).collect();
    if prefix.chars().count() < 4 || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let year: u32 = prefix[..2].parse().ok()?;
    let month: u32 = prefix[2..4].parse().ok()?;
    let full_year = if year < 50 { 2000 + year } else { 1900 + year };
    Some(format!("{}-{:02}", full_year, month))
}

/// Category, alarm code and production period for each record
pub struct Classifier<'a> {
    rules: &'a ClassifyRules,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a ClassifyRules) -> Self {
        Self { rules }
    }
}

impl RecordStage for Classifier<'_> {
    fn apply(&self, record: &mut ComplaintRecord, columns: &ColumnPresence) {
        record.category = if columns.problem_description && columns.solution {
            assign_category(
                record.problem_description.as_deref(),
                record.solution_description.as_deref(),
                self.rules,
            )
        } else {
            self.rules.default_category.clone()
        };
        metrics::classify::category_assigned(&record.category);

        if columns.problem_description {
            record.alarm_code = extract_alarm_code(record.problem_description.as_deref(), self.rules);
            if record.alarm_code.is_some() {
                metrics::classify::alarm_code_extracted();
            }
        }

        if columns.serial_number {
            record.production_period = decode_production_period(record.serial_number_primary.as_deref());
        }
    }

    fn name(&self) -> &'static str {
        "classify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_beats_keyword_position() {
        let rules = ClassifyRules::default();
        // "升级" (software) appears before "故障" (hardware) in the text,
        // but hardware is the earlier category
        assert_eq!(
            assign_category(Some("升级后出现故障"), None, &rules),
            "Hardware Failure"
        );
    }

    #[test]
    fn test_category_uses_solution_text() {
        let rules = ClassifyRules::default();
        assert_eq!(
            assign_category(Some("device offline"), Some("Redo WIRING at site"), &rules),
            "Installation Issue"
        );
    }

    #[test]
    fn test_category_defaults_to_other() {
        let rules = ClassifyRules::default();
        assert_eq!(assign_category(None, None, &rules), constants::OTHER);
        assert_eq!(assign_category(Some("customer asked a question"), None, &rules), constants::OTHER);
    }

    #[test]
    fn test_custom_rules_override_defaults() {
        let rules = ClassifyRules::new(
            vec![CategoryRule::new("Battery", &["battery"])],
            "Unsorted".to_string(),
            &[],
        )
        .unwrap();
        assert_eq!(assign_category(Some("Battery swelling"), None, &rules), "Battery");
        assert_eq!(assign_category(Some("fault"), None, &rules), "Unsorted");
    }

    #[test]
    fn test_alarm_code_pattern_order() {
        let rules = ClassifyRules::default();
        assert_eq!(
            extract_alarm_code(Some("shows F12 then err0031"), &rules).as_deref(),
            Some("err0031")
        );
        assert_eq!(extract_alarm_code(Some("alarm E105"), &rules).as_deref(), Some("E105"));
    }

    #[test]
    fn test_alarm_code_labelled_forms() {
        let rules = ClassifyRules::default();
        assert_eq!(extract_alarm_code(Some("代码：X7"), &rules).as_deref(), Some("X7"));
        assert_eq!(extract_alarm_code(Some("Alarm: grid_lost"), &rules).as_deref(), Some("grid_lost"));
        assert_eq!(extract_alarm_code(Some("no code here"), &rules), None);
        assert_eq!(extract_alarm_code(None, &rules), None);
    }

    #[test]
    fn test_production_period() {
        assert_eq!(decode_production_period(Some("2308XXXX")).as_deref(), Some("2023-08"));
        assert_eq!(decode_production_period(Some("9912ABC")).as_deref(), Some("1999-12"));
        assert_eq!(decode_production_period(Some("4901")).as_deref(), Some("2049-01"));
        assert_eq!(decode_production_period(Some("5001")).as_deref(), Some("1950-01"));
    }

    #[test]
    fn test_production_period_unchecked_month() {
        assert_eq!(decode_production_period(Some("2313A")).as_deref(), Some("2023-13"));
        assert_eq!(decode_production_period(Some("2300A")).as_deref(), Some("2023-00"));
    }

    #[test]
    fn test_production_period_rejects() {
        assert_eq!(decode_production_period(Some("99")), None);
        assert_eq!(decode_production_period(Some("A308XX")), None);
        assert_eq!(decode_production_period(Some("23年8月")), None);
        assert_eq!(decode_production_period(None), None);
    }
}
