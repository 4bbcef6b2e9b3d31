use std::collections::BTreeMap;

use tracing::info;

use super::{complained_in_month, AggregateRules};
use crate::constants;
use crate::observability::metrics;
use crate::types::{CaseSample, CaseSampleGroup, ComplaintRecord, ConcentrationReport, IssueStat};

/// Narrows the complaint set before issues are counted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcentrationFilter {
    /// `YYYY-MM` of the complaint date
    pub month: Option<String>,
    pub machine_type: Option<String>,
}

impl ConcentrationFilter {
    fn keeps(&self, record: &ComplaintRecord) -> bool {
        if let Some(month) = &self.month {
            if !complained_in_month(record, month) {
                return false;
            }
        }
        match &self.machine_type {
            Some(m) if !constants::is_all_sentinel(m) => record.machine_type_standard == *m,
            _ => true,
        }
    }
}

/// The complaint count at or above which a category is concentrated
pub fn concentration_threshold(total: usize, rules: &AggregateRules) -> f64 {
    (rules.concentration_min_count as f64).max(total as f64 * rules.concentration_ratio)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Most frequent machine type; ties go to the lexicographically smallest
fn dominant_machine_type<'a>(records: impl IntoIterator<Item = &'a ComplaintRecord>) -> String {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        *counts.entry(record.machine_type_standard.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, u64)> = None;
    for (machine_type, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((machine_type, count));
        }
    }
    best.map(|(m, _)| m.to_string())
        .unwrap_or_else(|| constants::UNKNOWN.to_string())
}

/// Count complaints per category, flag concentrated categories and sample cases for them.
pub fn analyze_concentration(
    complaints: &[ComplaintRecord],
    filter: &ConcentrationFilter,
    rules: &AggregateRules,
) -> ConcentrationReport {
    let analyzed: Vec<&ComplaintRecord> = complaints.iter().filter(|r| filter.keeps(r)).collect();
    if analyzed.is_empty() {
        return ConcentrationReport::default();
    }
    let total = analyzed.len();

    let mut by_category: BTreeMap<&str, Vec<&ComplaintRecord>> = BTreeMap::new();
    for &record in &analyzed {
        by_category.entry(record.category.as_str()).or_default().push(record);
    }

    let mut issue_stats: Vec<IssueStat> = by_category
        .iter()
        .map(|(category, records)| IssueStat {
            category: category.to_string(),
            issue_count: records.len() as u64,
            percentage: round_to(
                records.len() as f64 / total as f64 * 100.0,
                rules.percentage_decimals,
            ),
            dominant_machine_type: dominant_machine_type(records.iter().copied()),
        })
        .collect();
    issue_stats.sort_by(|a, b| {
        b.issue_count
            .cmp(&a.issue_count)
            .then_with(|| a.category.cmp(&b.category))
    });

    let threshold = concentration_threshold(total, rules);
    let concentrated_issues: Vec<IssueStat> = issue_stats
        .iter()
        .filter(|stat| stat.issue_count as f64 >= threshold)
        .cloned()
        .collect();

    let case_samples = concentrated_issues
        .iter()
        .map(|stat| CaseSampleGroup {
            category: stat.category.clone(),
            cases: by_category
                .get(stat.category.as_str())
                .map(|records| {
                    records
                        .iter()
                        .take(rules.max_case_samples)
                        .map(|r| CaseSample::from(*r))
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    metrics::aggregate::concentrated_issues(concentrated_issues.len());
    info!(
        analyzed = total,
        categories = issue_stats.len(),
        concentrated = concentrated_issues.len(),
        threshold,
        "Concentration analysis complete"
    );

    ConcentrationReport {
        issue_stats,
        concentrated_issues,
        case_samples,
    }
}
