use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use super::normalize::{mentions_micro_inverter, NormalizeRules};
use super::RecordStage;
use crate::constants;
use crate::observability::metrics;
use crate::types::{CatalogEntry, CatalogSource, ColumnPresence, ComplaintRecord};

/// Serial-number index over one reference catalog.
/// Built once per catalog load and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: HashMap<String, CatalogEntry>,
}

impl CatalogIndex {
    /// Index catalog rows by serial number. When a serial repeats, the first row wins.
    pub fn build(rows: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut entries = HashMap::new();
        let mut duplicates = 0usize;
        for row in rows {
            if entries.contains_key(&row.serial_number) {
                duplicates += 1;
                continue;
            }
            entries.insert(row.serial_number.clone(), row);
        }
        if duplicates > 0 {
            debug!(duplicates, "Ignored repeated serial numbers in catalog");
        }
        Self { entries }
    }

    pub fn get(&self, serial_number: &str) -> Option<&CatalogEntry> {
        self.entries.get(serial_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

/// The two reference catalogs. B covers micro-inverter products.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub a: Option<CatalogIndex>,
    pub b: Option<CatalogIndex>,
}

impl Catalogs {
    pub fn new(a: Option<CatalogIndex>, b: Option<CatalogIndex>) -> Self {
        if let Some(a) = &a {
            info!(entries = a.len(), "Catalog A indexed");
        }
        if let Some(b) = &b {
            info!(entries = b.len(), "Catalog B indexed");
        }
        Self { a, b }
    }
}

/// Fields picked for one record and the catalog they came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub fields: BTreeMap<String, String>,
    pub source: Option<CatalogSource>,
}

/// Look a record's primary serial number up in both catalogs.
///
/// A's row is used when it matches. B's row replaces it only when B also matches
/// and the record is a micro-inverter: A's product description or the raw machine
/// label names one, or the machine type standardized to Micro Inverter.
pub fn enrich(record: &ComplaintRecord, catalogs: &Catalogs, rules: &NormalizeRules) -> Enrichment {
    let Some(serial) = record.serial_number_primary.as_deref() else {
        return Enrichment::default();
    };

    let match_a = catalogs.a.as_ref().and_then(|index| index.get(serial));
    let match_b = catalogs.b.as_ref().and_then(|index| index.get(serial));

    let mut enrichment = match match_a {
        Some(entry) => Enrichment {
            fields: entry.fields.clone(),
            source: Some(CatalogSource::A),
        },
        None => Enrichment::default(),
    };

    if let Some(entry_b) = match_b {
        let described_as_micro = match_a
            .and_then(CatalogEntry::product_description)
            .is_some_and(|desc| mentions_micro_inverter(desc, rules));
        // Product codes such as "MG800" only show up in the standardized type
        let labelled_as_micro = record.machine_type_standard == constants::MICRO_INVERTER
            || record
                .machine_type_raw
                .as_deref()
                .is_some_and(|label| mentions_micro_inverter(label, rules));

        if described_as_micro || labelled_as_micro {
            debug!(serial, "Micro-inverter record: catalog B takes precedence");
            enrichment = Enrichment {
                fields: entry_b.fields.clone(),
                source: Some(CatalogSource::B),
            };
        }
    }

    enrichment
}

/// Enrichment stage. Skips the whole batch when catalog A was never loaded.
pub struct CatalogEnricher<'a> {
    catalogs: &'a Catalogs,
    rules: &'a NormalizeRules,
}

impl<'a> CatalogEnricher<'a> {
    pub fn new(catalogs: &'a Catalogs, rules: &'a NormalizeRules) -> Self {
        Self { catalogs, rules }
    }
}

impl RecordStage for CatalogEnricher<'_> {
    fn apply(&self, record: &mut ComplaintRecord, columns: &ColumnPresence) {
        if !columns.serial_number || self.catalogs.a.is_none() {
            return;
        }
        let Enrichment { fields, source } = enrich(record, self.catalogs, self.rules);
        metrics::enrich::lookup(source);
        record.enrichment = fields;
        record.enrichment_source = source;
    }

    fn name(&self) -> &'static str {
        "enrich"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawComplaintRow;

    fn entry(sn: &str, fields: &[(&str, &str)]) -> CatalogEntry {
        CatalogEntry {
            serial_number: sn.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn record(sn: Option<&str>, label: Option<&str>) -> ComplaintRecord {
        let mut record = ComplaintRecord::from_raw(
            0,
            RawComplaintRow {
                serial_number: sn.map(String::from),
                machine_model: label.map(String::from),
                ..Default::default()
            },
        );
        record.serial_number_primary = sn.map(String::from);
        record
    }

    fn catalogs() -> Catalogs {
        Catalogs::new(
            Some(CatalogIndex::build(vec![
                entry("SN1", &[("product_description", "储能单相 5K"), ("factory", "A-plant")]),
                entry("SN2", &[("product_description", "微逆 800W"), ("factory", "A-plant")]),
                entry("SN1", &[("product_description", "duplicate"), ("factory", "ignored")]),
            ])),
            Some(CatalogIndex::build(vec![
                entry("SN1", &[("factory", "B-plant")]),
                entry("SN2", &[("factory", "B-plant")]),
                entry("SN3", &[("factory", "B-plant")]),
            ])),
        )
    }

    #[test]
    fn test_catalog_a_match() {
        let rules = NormalizeRules::default();
        let result = enrich(&record(Some("SN1"), Some("储能单相")), &catalogs(), &rules);
        assert_eq!(result.source, Some(CatalogSource::A));
        assert_eq!(result.fields["factory"], "A-plant");
        assert_eq!(result.fields["product_description"], "储能单相 5K");
    }

    #[test]
    fn test_catalog_b_precedence_from_label() {
        let rules = NormalizeRules::default();
        let result = enrich(&record(Some("SN1"), Some("Micro-Inverter 600")), &catalogs(), &rules);
        assert_eq!(result.source, Some(CatalogSource::B));
        assert_eq!(result.fields["factory"], "B-plant");
        assert!(!result.fields.contains_key("product_description"));
    }

    #[test]
    fn test_catalog_b_precedence_from_description() {
        let rules = NormalizeRules::default();
        let result = enrich(&record(Some("SN2"), None), &catalogs(), &rules);
        assert_eq!(result.source, Some(CatalogSource::B));
    }

    #[test]
    fn test_catalog_b_precedence_from_product_code() {
        let rules = NormalizeRules::default();
        let mut rec = record(Some("SN1"), Some("MG800"));
        rec.machine_type_standard = constants::MICRO_INVERTER.to_string();
        let first = enrich(&rec, &catalogs(), &rules);
        assert_eq!(first.source, Some(CatalogSource::B));

        // a re-run sees the standardized label in place of the product code
        rec.machine_type_raw = Some(constants::MICRO_INVERTER.to_string());
        assert_eq!(enrich(&rec, &catalogs(), &rules), first);
    }

    #[test]
    fn test_catalog_b_alone_is_not_enough() {
        // B matches but nothing marks the record as micro-inverter
        let rules = NormalizeRules::default();
        let result = enrich(&record(Some("SN3"), Some("组串三相")), &catalogs(), &rules);
        assert_eq!(result, Enrichment::default());
    }

    #[test]
    fn test_unmatched_and_absent_serials() {
        let rules = NormalizeRules::default();
        assert_eq!(enrich(&record(Some("nope"), None), &catalogs(), &rules), Enrichment::default());
        assert_eq!(enrich(&record(None, None), &catalogs(), &rules), Enrichment::default());
    }

    #[test]
    fn test_stage_skips_without_catalog_a() {
        let rules = NormalizeRules::default();
        let only_b = Catalogs::new(None, catalogs().b);
        let stage = CatalogEnricher::new(&only_b, &rules);
        let mut rec = record(Some("SN2"), Some("微逆"));
        stage.apply(&mut rec, &ColumnPresence::all());
        assert!(rec.enrichment.is_empty());
        assert!(rec.enrichment_source.is_none());
    }
}
