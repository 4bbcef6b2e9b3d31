//! Pipeline metrics recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op, so library users and
//! tests pay nothing. The binary installs a Prometheus recorder on request.

use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{PipelineError, Result};

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize
    NormalizeRecordsProcessed,
    NormalizeSerialOverflow,

    // Enrich
    EnrichLookups,

    // Classify
    ClassifyCategoriesAssigned,
    ClassifyAlarmCodesExtracted,

    // Aggregate
    AggregateConcentratedIssues,

    // Pipeline
    PipelineBatchSize,
    PipelineStageDuration,
    PipelineRunsCancelled,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRecordsProcessed => "complaints_normalize_records_processed_total",
            MetricName::NormalizeSerialOverflow => "complaints_normalize_serial_overflow_total",
            MetricName::EnrichLookups => "complaints_enrich_lookups_total",
            MetricName::ClassifyCategoriesAssigned => "complaints_classify_categories_assigned_total",
            MetricName::ClassifyAlarmCodesExtracted => "complaints_classify_alarm_codes_extracted_total",
            MetricName::AggregateConcentratedIssues => "complaints_aggregate_concentrated_issues",
            MetricName::PipelineBatchSize => "complaints_pipeline_batch_size",
            MetricName::PipelineStageDuration => "complaints_pipeline_stage_duration_seconds",
            MetricName::PipelineRunsCancelled => "complaints_pipeline_runs_cancelled_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install the Prometheus recorder and hand back a handle for rendering
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PipelineError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

pub mod normalize {
    use super::MetricName;

    pub fn record_normalized(machine_type: &str) {
        ::metrics::counter!(
            MetricName::NormalizeRecordsProcessed.as_str(),
            "machine_type" => machine_type.to_string()
        )
        .increment(1);
    }

    pub fn serial_overflow() {
        ::metrics::counter!(MetricName::NormalizeSerialOverflow.as_str()).increment(1);
    }
}

pub mod enrich {
    use super::MetricName;
    use crate::types::CatalogSource;

    /// Record a catalog lookup and which catalog, if any, answered it
    pub fn lookup(source: Option<CatalogSource>) {
        let source = match source {
            Some(CatalogSource::A) => "a",
            Some(CatalogSource::B) => "b",
            None => "miss",
        };
        ::metrics::counter!(MetricName::EnrichLookups.as_str(), "source" => source).increment(1);
    }
}

pub mod classify {
    use super::MetricName;

    pub fn category_assigned(category: &str) {
        ::metrics::counter!(
            MetricName::ClassifyCategoriesAssigned.as_str(),
            "category" => category.to_string()
        )
        .increment(1);
    }

    pub fn alarm_code_extracted() {
        ::metrics::counter!(MetricName::ClassifyAlarmCodesExtracted.as_str()).increment(1);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn concentrated_issues(count: usize) {
        ::metrics::gauge!(MetricName::AggregateConcentratedIssues.as_str()).set(count as f64);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn batch_processed(batch_size: usize) {
        ::metrics::histogram!(MetricName::PipelineBatchSize.as_str()).record(batch_size as f64);
    }

    pub fn stage_duration(stage: &'static str, seconds: f64) {
        ::metrics::histogram!(MetricName::PipelineStageDuration.as_str(), "stage" => stage)
            .record(seconds);
    }

    pub fn run_cancelled(stage: &'static str) {
        ::metrics::counter!(MetricName::PipelineRunsCancelled.as_str(), "stage" => stage).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::NormalizeRecordsProcessed,
            MetricName::EnrichLookups,
            MetricName::PipelineStageDuration,
        ] {
            assert!(name.to_string().starts_with("complaints_"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        normalize::record_normalized("Micro Inverter");
        enrich::lookup(None);
        pipeline::batch_processed(3);
    }
}
