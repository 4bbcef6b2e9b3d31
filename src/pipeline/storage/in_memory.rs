use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{ComplaintQuery, ComplaintStore};
use crate::error::{PipelineError, Result};
use crate::types::{CatalogEntry, CatalogSource, ComplaintRecord, ShipmentRecord};

/// A stored row and its upload position, so reads come back in upload order
#[derive(Debug, Clone)]
struct Stored<T> {
    seq: usize,
    value: T,
}

type Table<T> = Arc<Mutex<HashMap<Uuid, Stored<T>>>>;

/// In-memory store for local runs and tests
#[derive(Clone, Default)]
pub struct InMemoryStore {
    complaints: Table<ComplaintRecord>,
    shipments: Table<ShipmentRecord>,
    catalogs: Table<(CatalogSource, CatalogEntry)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog_len(&self, source: CatalogSource) -> Result<usize> {
        let catalogs = lock(&self.catalogs)?;
        Ok(catalogs.values().filter(|s| s.value.0 == source).count())
    }
}

fn lock<T>(table: &Table<T>) -> Result<MutexGuard<'_, HashMap<Uuid, Stored<T>>>> {
    table.lock().map_err(|e| PipelineError::Store {
        message: format!("store lock poisoned: {}", e),
    })
}

fn insert_all<T: Clone>(table: &Table<T>, values: impl IntoIterator<Item = T>) -> Result<usize> {
    let mut rows = lock(table)?;
    let mut inserted = 0;
    for value in values {
        let seq = rows.len();
        rows.insert(Uuid::new_v4(), Stored { seq, value });
        inserted += 1;
    }
    Ok(inserted)
}

fn select<T: Clone>(table: &Table<T>, keep: impl Fn(&T) -> bool) -> Result<Vec<T>> {
    let rows = lock(table)?;
    let mut selected: Vec<&Stored<T>> = rows.values().filter(|s| keep(&s.value)).collect();
    selected.sort_by_key(|s| s.seq);
    Ok(selected.into_iter().map(|s| s.value.clone()).collect())
}

#[async_trait]
impl ComplaintStore for InMemoryStore {
    async fn upload_complaints(&self, records: &[ComplaintRecord]) -> Result<usize> {
        let count = insert_all(&self.complaints, records.iter().cloned())?;
        debug!(count, "Stored complaint records");
        Ok(count)
    }

    async fn upload_shipments(&self, shipments: &[ShipmentRecord]) -> Result<usize> {
        let count = insert_all(&self.shipments, shipments.iter().cloned())?;
        debug!(count, "Stored shipment records");
        Ok(count)
    }

    async fn upload_catalog(&self, source: CatalogSource, entries: &[CatalogEntry]) -> Result<usize> {
        let count = insert_all(&self.catalogs, entries.iter().map(|e| (source, e.clone())))?;
        debug!(count, ?source, "Stored catalog entries");
        Ok(count)
    }

    async fn get_complaints(&self, query: &ComplaintQuery) -> Result<Vec<ComplaintRecord>> {
        select(&self.complaints, |r| query.matches_complaint(r))
    }

    async fn get_shipments(&self, query: &ComplaintQuery) -> Result<Vec<ShipmentRecord>> {
        select(&self.shipments, |s| query.matches_shipment(s))
    }
}
