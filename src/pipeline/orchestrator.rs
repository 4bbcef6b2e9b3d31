//! Batch runner: per-record stages in parallel, then the aggregation passes.
//!
//! Catalog indexes and rule tables are built before a run and only read during it.
//! Cancellation is honoured between stages, never in the middle of one.

use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineRules;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::{
    analyze_concentration, build_report_summary, compute_defect_rate, ConcentrationFilter,
    DefectRateFilter,
};
use crate::pipeline::processing::classify::Classifier;
use crate::pipeline::processing::enrich::{CatalogEnricher, Catalogs};
use crate::pipeline::processing::normalize::Normalizer;
use crate::pipeline::processing::RecordStage;
use crate::types::{
    ColumnPresence, ComplaintBatch, ComplaintRecord, ConcentrationReport, DefectRateRow,
    ReportSummary, ShipmentRecord,
};

/// Filters for the aggregation passes
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub defect_rate: DefectRateFilter,
    pub concentration: ConcentrationFilter,
}

impl AnalysisOptions {
    /// Month shown on the report: the concentration month, else the defect-rate period
    pub fn report_month(&self) -> Option<&str> {
        self.concentration
            .month
            .as_deref()
            .or(self.defect_rate.period.as_deref())
    }
}

/// Everything the report collaborator consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub defect_rates: Vec<DefectRateRow>,
    pub concentration: ConcentrationReport,
    pub summary: ReportSummary,
}

fn check_cancelled(cancel: &CancellationToken, stage: &'static str) -> Result<()> {
    if cancel.is_cancelled() {
        warn!(stage, "Pipeline cancelled");
        metrics::pipeline::run_cancelled(stage);
        return Err(PipelineError::Cancelled(stage));
    }
    Ok(())
}

fn run_stage(stage: &dyn RecordStage, records: &mut [ComplaintRecord], columns: ColumnPresence) {
    let started = Instant::now();
    records
        .par_iter_mut()
        .for_each(|record| stage.apply(record, &columns));
    let elapsed = started.elapsed().as_secs_f64();
    metrics::pipeline::stage_duration(stage.name(), elapsed);
    info!(stage = stage.name(), records = records.len(), elapsed_secs = elapsed, "Stage complete");
}

/// Normalize, enrich and classify every row of a batch.
pub fn run_batch(
    batch: ComplaintBatch,
    catalogs: &Catalogs,
    rules: &PipelineRules,
    cancel: &CancellationToken,
) -> Result<Vec<ComplaintRecord>> {
    let ComplaintBatch { rows, columns } = batch;
    let mut records: Vec<ComplaintRecord> = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| ComplaintRecord::from_raw(index, row))
        .collect();
    metrics::pipeline::batch_processed(records.len());
    info!(records = records.len(), "Starting complaint batch");

    if !columns.serial_number {
        warn!("No serial number column: serial split, enrichment and production period skipped");
    } else if catalogs.a.is_none() {
        warn!("Catalog A not loaded: enrichment skipped");
    }
    if !(columns.problem_description && columns.solution) {
        warn!("Problem or solution column missing: every record gets the default category");
    }

    let normalizer = Normalizer::new(&rules.normalize, Utc::now());
    let enricher = CatalogEnricher::new(catalogs, &rules.normalize);
    let classifier = Classifier::new(&rules.classify);
    let stages: [&dyn RecordStage; 3] = [&normalizer, &enricher, &classifier];

    for stage in stages {
        check_cancelled(cancel, stage.name())?;
        run_stage(stage, &mut records, columns);
    }

    Ok(records)
}

/// Reduce annotated records into defect rates, issue concentration and a summary
pub fn analyze(
    records: &[ComplaintRecord],
    shipments: &[ShipmentRecord],
    options: &AnalysisOptions,
    rules: &PipelineRules,
    cancel: &CancellationToken,
) -> Result<AnalysisOutput> {
    check_cancelled(cancel, "aggregate")?;

    let defect_rates = compute_defect_rate(records, shipments, &options.defect_rate);
    let concentration = analyze_concentration(records, &options.concentration, &rules.aggregate);
    let summary = build_report_summary(
        options.report_month(),
        &defect_rates,
        &concentration.issue_stats,
        shipments,
        records,
        Utc::now(),
    );

    Ok(AnalysisOutput {
        defect_rates,
        concentration,
        summary,
    })
}
