// Complaint pipeline: ingestion, processing, orchestration and storage

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod storage;

// Re-export key types and functions from each stage
pub use orchestrator::{analyze, run_batch, AnalysisOptions, AnalysisOutput};
pub use processing::enrich::{CatalogIndex, Catalogs};
