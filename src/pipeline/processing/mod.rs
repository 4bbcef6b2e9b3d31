// Pipeline processing: per-record stages and batch aggregation

pub mod normalize;
pub mod enrich;
pub mod classify;
pub mod aggregate;

use crate::types::{ColumnPresence, ComplaintRecord};

/// A per-record transform applied in place.
/// Implementations hold only read-only rule tables and indexes, so one stage
/// instance can be shared across worker threads.
pub trait RecordStage: Send + Sync {
    /// Annotate one record. Never fails; unusable input leaves fields absent.
    fn apply(&self, record: &mut ComplaintRecord, columns: &ColumnPresence);

    /// Stage name for logs and cancellation errors
    fn name(&self) -> &'static str;
}
