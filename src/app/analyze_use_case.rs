use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::ports::ReportOutputPort;
use crate::config::PipelineRules;
use crate::pipeline::orchestrator::{analyze, run_batch, AnalysisOptions, AnalysisOutput};
use crate::pipeline::processing::enrich::{CatalogIndex, Catalogs};
use crate::pipeline::storage::ComplaintStore;
use crate::types::{CatalogEntry, CatalogSource, ComplaintBatch, ComplaintRecord, ShipmentRecord};

/// Inputs for one analysis run, already read from their tables
#[derive(Debug, Clone, Default)]
pub struct AnalysisInputs {
    pub complaints: ComplaintBatch,
    pub catalog_a: Option<CatalogIndex>,
    pub catalog_b: Option<CatalogIndex>,
    pub shipments: Vec<ShipmentRecord>,
    /// Fingerprint of the complaint file, if it came from one
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub fingerprint: Option<String>,
    pub records: Vec<ComplaintRecord>,
    pub output: AnalysisOutput,
    pub stored_complaints: usize,
}

/// Use case for running a complaint batch through the pipeline, persisting it and reporting on it
pub struct AnalyzeUseCase {
    rules: PipelineRules,
    store: Arc<dyn ComplaintStore>,
    output: Box<dyn ReportOutputPort>,
}

impl AnalyzeUseCase {
    pub fn new(rules: PipelineRules, store: Arc<dyn ComplaintStore>, output: Box<dyn ReportOutputPort>) -> Self {
        Self { rules, store, output }
    }

    pub async fn run(
        &self,
        inputs: AnalysisInputs,
        options: &AnalysisOptions,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRun> {
        let AnalysisInputs {
            complaints,
            catalog_a,
            catalog_b,
            shipments,
            fingerprint,
        } = inputs;

        let catalogs = Catalogs::new(catalog_a, catalog_b);
        let records = run_batch(complaints, &catalogs, &self.rules, cancel)
            .context("Complaint batch failed")?;

        let stored_complaints = self
            .store
            .upload_complaints(&records)
            .await
            .context("Failed to store complaints")?;
        self.store
            .upload_shipments(&shipments)
            .await
            .context("Failed to store shipments")?;
        for (source, index) in [(CatalogSource::A, &catalogs.a), (CatalogSource::B, &catalogs.b)] {
            if let Some(index) = index {
                let entries: Vec<CatalogEntry> = index.iter().cloned().collect();
                self.store
                    .upload_catalog(source, &entries)
                    .await
                    .with_context(|| format!("Failed to store catalog {:?}", source))?;
            }
        }

        let output = analyze(&records, &shipments, options, &self.rules, cancel)
            .context("Aggregation failed")?;

        self.output.write_annotated_complaints(&records).await?;
        self.output.write_defect_rates(&output.defect_rates).await?;
        self.output.write_concentration(&output.concentration).await?;
        self.output.write_summary(&output.summary).await?;

        info!(
            fingerprint = fingerprint.as_deref().unwrap_or("-"),
            complaints = records.len(),
            defect_rows = output.defect_rates.len(),
            concentrated = output.concentration.concentrated_issues.len(),
            "Analysis run complete"
        );

        Ok(AnalysisRun {
            fingerprint,
            records,
            output,
            stored_complaints,
        })
    }
}
