// Store collaborator: where annotated complaints, shipments and catalogs are persisted

pub mod in_memory;

use async_trait::async_trait;
use chrono::NaiveDate;

pub use in_memory::InMemoryStore;

use crate::error::Result;
use crate::types::{CatalogEntry, CatalogSource, ComplaintRecord, ShipmentRecord};

/// Optional bounds for reading records back. Dates are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub machine_type: Option<String>,
}

impl ComplaintQuery {
    pub fn matches_complaint(&self, record: &ComplaintRecord) -> bool {
        if let Some(machine_type) = &self.machine_type {
            if &record.machine_type_standard != machine_type {
                return false;
            }
        }
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        // Date bounds exclude records without a parseable complaint date
        let Some(date) = record.complaint_timestamp.map(|ts| ts.date()) else {
            return false;
        };
        self.start_date.map_or(true, |start| date >= start) && self.end_date.map_or(true, |end| date <= end)
    }

    /// Shipments carry a `YYYY-MM` period; it is compared against the month of each bound
    pub fn matches_shipment(&self, shipment: &ShipmentRecord) -> bool {
        if let Some(machine_type) = &self.machine_type {
            if &shipment.machine_type_standard != machine_type {
                return false;
            }
        }
        let Some(period) = shipment.period.as_deref().map(str::trim) else {
            return true;
        };
        let start_ok = self
            .start_date
            .map_or(true, |start| period >= start.format("%Y-%m").to_string().as_str());
        let end_ok = self
            .end_date
            .map_or(true, |end| period <= end.format("%Y-%m").to_string().as_str());
        start_ok && end_ok
    }
}

/// Persistence for pipeline inputs and outputs. Upload methods return the stored row count.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn upload_complaints(&self, records: &[ComplaintRecord]) -> Result<usize>;
    async fn upload_shipments(&self, shipments: &[ShipmentRecord]) -> Result<usize>;
    async fn upload_catalog(&self, source: CatalogSource, entries: &[CatalogEntry]) -> Result<usize>;

    async fn get_complaints(&self, query: &ComplaintQuery) -> Result<Vec<ComplaintRecord>>;
    async fn get_shipments(&self, query: &ComplaintQuery) -> Result<Vec<ShipmentRecord>>;
}
