pub mod analyze_use_case;
pub mod ports;

pub use analyze_use_case::{AnalysisInputs, AnalysisRun, AnalyzeUseCase};
