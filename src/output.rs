//! Analysis-ready output rows and the run summary.
//!
//! Shipments and cargo items form a relational pair linked by `shipment_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::pipeline::processing::cargo::CargoStats;
use crate::pipeline::processing::dedup::DedupReport;
use crate::pipeline::processing::normalize::{CoverageCounters, Resolution};
use crate::pipeline::processing::parser::ParseStats;
use crate::types::{CargoItem, EntityClass, RawShipmentRecord, RecordFormat};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRow {
    pub shipment_id: Uuid,
    pub group_id: String,
    pub source_file: String,
    pub page_seq: u32,
    pub line_number: usize,
    pub ship_name: String,
    pub origin_port: Option<String>,
    pub destination_port: Option<String>,
    pub merchant: Option<String>,
    pub arrival_day: Option<u32>,
    pub arrival_month: Option<u32>,
    pub arrival_year: Option<i32>,
    pub publication_day: Option<u32>,
    pub publication_month: Option<u32>,
    pub publication_year: Option<i32>,
    pub is_steamship: bool,
    pub format: RecordFormat,
    pub confidence: f64,
    pub raw_cargo: String,
    pub raw_line: String,
    /// Tier that resolved each normalized field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub normalization: BTreeMap<EntityClass, Resolution>,
}

impl From<&RawShipmentRecord> for ShipmentRow {
    fn from(record: &RawShipmentRecord) -> Self {
        Self {
            shipment_id: record.record_id,
            group_id: record.source.group_id.clone(),
            source_file: record.source.source_file.clone(),
            page_seq: record.source.page_seq,
            line_number: record.line_number,
            ship_name: record.ship_name.clone(),
            origin_port: Some(record.origin_port.clone()).filter(|o| !o.is_empty()),
            destination_port: record.destination_port.clone(),
            merchant: record.merchant.clone(),
            arrival_day: record.arrival.day,
            arrival_month: record.arrival.month,
            arrival_year: record.arrival.year,
            publication_day: record.publication.day,
            publication_month: record.publication.month,
            publication_year: record.publication.year,
            is_steamship: record.is_steamship,
            format: record.format,
            confidence: record.confidence,
            raw_cargo: record.cargo.clone(),
            raw_line: record.raw_line.clone(),
            normalization: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoItemRow {
    pub item_id: Uuid,
    pub shipment_id: Uuid,
    pub quantity: Option<u64>,
    pub unit: Option<String>,
    pub commodity: Option<String>,
    pub merchant: Option<String>,
    #[serde(default)]
    pub merchant_inherited: bool,
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub normalization: BTreeMap<EntityClass, Resolution>,
}

impl From<&CargoItem> for CargoItemRow {
    fn from(item: &CargoItem) -> Self {
        Self {
            item_id: item.item_id,
            shipment_id: item.record_id,
            quantity: item.quantity,
            unit: item.unit.clone(),
            commodity: Some(item.commodity.clone()).filter(|c| !c.is_empty()),
            merchant: item.merchant.clone(),
            merchant_inherited: item.merchant_inherited,
            raw_text: item.raw_text.clone(),
            normalization: BTreeMap::new(),
        }
    }
}

/// Statistics for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub reference_fingerprint: String,
    pub shipments: usize,
    pub cargo_items: usize,
    pub review_queue_len: usize,
    pub parse: ParseStats,
    pub cargo: CargoStats,
    pub dedup: DedupReport,
    pub coverage: BTreeMap<EntityClass, CoverageCounters>,
}

impl RunSummary {
    /// Share of normalized occurrences that did not end up unmatched
    pub fn resolved_share(&self, class: EntityClass) -> Option<f64> {
        let counters = self.coverage.get(&class)?;
        let total = counters.total();
        if total == 0 {
            return None;
        }
        Some((total - counters.unmatched) as f64 / total as f64)
    }
}
