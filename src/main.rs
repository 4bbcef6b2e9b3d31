use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use complaint_pipeline::app::{AnalysisInputs, AnalyzeUseCase};
use complaint_pipeline::config::PipelineConfig;
use complaint_pipeline::idempotency::batch_fingerprint;
use complaint_pipeline::infra::FileReportOutputAdapter;
use complaint_pipeline::logging;
use complaint_pipeline::observability::metrics;
use complaint_pipeline::pipeline::ingestion;
use complaint_pipeline::pipeline::processing::aggregate::{ConcentrationFilter, DefectRateFilter};
use complaint_pipeline::pipeline::storage::{ComplaintStore, InMemoryStore};
use complaint_pipeline::pipeline::AnalysisOptions;

#[derive(Parser)]
#[command(name = "complaint_pipeline")]
#[command(about = "Normalize, enrich, classify and aggregate product complaint records")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a complaint table through the full pipeline and write report outputs
    Run {
        /// Complaint table (CSV)
        #[arg(long)]
        complaints: PathBuf,
        /// Reference catalog A (CSV, keyed by SN)
        #[arg(long)]
        catalog_a: Option<PathBuf>,
        /// Micro-inverter reference catalog B (CSV, keyed by SN)
        #[arg(long)]
        catalog_b: Option<PathBuf>,
        /// Shipment table (CSV)
        #[arg(long)]
        shipments: Option<PathBuf>,
        /// Pipeline config (TOML); falls back to COMPLAINT_PIPELINE_CONFIG
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
        /// Defect-rate period (YYYY-MM)
        #[arg(long)]
        period: Option<String>,
        /// Machine types for the defect-rate table (comma-separated, "all" for every type)
        #[arg(long)]
        machine_types: Option<String>,
        /// Month for concentrated-issue analysis (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        /// Machine type for concentrated-issue analysis
        #[arg(long)]
        machine_type: Option<String>,
        /// Record metrics and print a Prometheus snapshot at the end
        #[arg(long)]
        metrics: bool,
    },
    /// Print the effective rule tables as TOML
    Rules {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            complaints,
            catalog_a,
            catalog_b,
            shipments,
            config,
            output_dir,
            period,
            machine_types,
            month,
            machine_type,
            metrics: with_metrics,
        } => {
            let metrics_handle = if with_metrics { Some(metrics::init()?) } else { None };

            let rules = PipelineConfig::load_or_default(config.as_deref())?.into_rules()?;

            let bytes = std::fs::read(&complaints)
                .with_context(|| format!("Failed to read complaint table {}", complaints.display()))?;
            let fingerprint = batch_fingerprint(&bytes);
            info!(path = %complaints.display(), %fingerprint, "Complaint table loaded");

            let inputs = AnalysisInputs {
                complaints: ingestion::read_complaints_from(bytes.as_slice())?,
                catalog_a: catalog_a.as_ref().map(ingestion::read_catalog).transpose()?,
                catalog_b: catalog_b.as_ref().map(ingestion::read_catalog).transpose()?,
                shipments: match &shipments {
                    Some(path) => ingestion::read_shipments(path)?,
                    None => {
                        warn!("No shipment table given; defect rates will be empty");
                        Vec::new()
                    }
                },
                fingerprint: Some(fingerprint),
            };

            let options = AnalysisOptions {
                defect_rate: DefectRateFilter {
                    period,
                    machine_types: split_list(machine_types),
                },
                concentration: ConcentrationFilter { month, machine_type },
            };

            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current stage");
                    ctrl_c_token.cancel();
                }
            });

            let store: Arc<dyn ComplaintStore> = Arc::new(InMemoryStore::new());
            let output = FileReportOutputAdapter::new(&output_dir)?;
            let use_case = AnalyzeUseCase::new(rules, store, Box::new(output));

            let run = use_case.run(inputs, &options, &cancel).await?;

            let summary = &run.output.summary;
            println!("\n📊 Complaint analysis:");
            println!("   Complaints: {}", summary.total_complaints);
            println!("   Machine types: {}", summary.machine_type_count);
            println!("   Shipments: {}", summary.total_shipments);
            println!("   Average defect rate: {:.2}%", summary.average_defect_rate);
            println!(
                "   Concentrated issues: {}",
                run.output.concentration.concentrated_issues.len()
            );
            if let Some(top) = &summary.top_issue {
                println!("   Top issue: {}", top);
            }
            println!("   Output dir: {}", output_dir.display());

            if let Some(handle) = metrics_handle {
                println!("\n{}", handle.render());
            }
        }
        Commands::Rules { config } => {
            let config = PipelineConfig::load_or_default(config.as_deref())?;
            // Reject configs whose alarm patterns do not compile
            config.clone().into_rules()?;
            println!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
