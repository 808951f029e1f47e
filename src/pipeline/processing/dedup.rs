//! Hallucination deduplicator.
//!
//! The OCR model occasionally loops and prints the same arrival line dozens or
//! hundreds of times in a row. Such runs share a `RecordSignature`, come from
//! one source file and sit on tightly packed line numbers, even when the loop
//! cycles through several different lines. The same signature spread over
//! different files is a genuine repeat voyage (or a reprint) and is kept; far
//! apart in one file it is kept and flagged.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DedupConfig;
use crate::metrics;
use crate::types::{CargoItem, RawShipmentRecord, RecordSignature};

/// Repeated occurrences of one signature in one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatBlock {
    pub signature: String,
    pub source_file: String,
    pub occurrences: usize,
    pub first_line: usize,
    pub last_line: usize,
    /// Records dropped from this block; zero for flagged blocks
    pub removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub records_in: usize,
    pub records_out: usize,
    pub records_removed: usize,
    pub cargo_items_removed: usize,
    /// Blocks classified as hallucinations; only the first record of each survives
    pub removed_patterns: Vec<RepeatBlock>,
    /// Same-file repeats kept as-is for manual inspection
    pub flagged_blocks: Vec<RepeatBlock>,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub records: Vec<RawShipmentRecord>,
    pub cargo_items: Vec<CargoItem>,
    pub report: DedupReport,
}

pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Split the stream positions of one signature in one file into blocks of
    /// occurrences whose consecutive line numbers are at most `max_line_gap` apart.
    fn chain_blocks(&self, records: &[RawShipmentRecord], mut positions: Vec<usize>) -> Vec<Vec<usize>> {
        positions.sort_by_key(|&i| (records[i].line_number, i));

        let mut blocks: Vec<Vec<usize>> = Vec::new();
        for pos in positions {
            let line = records[pos].line_number;
            match blocks.last_mut() {
                Some(block)
                    if block
                        .last()
                        .is_some_and(|&prev| line - records[prev].line_number <= self.config.max_line_gap) =>
                {
                    block.push(pos)
                }
                _ => blocks.push(vec![pos]),
            }
        }
        blocks
    }

    /// Remove hallucination blocks from the record stream, and the cargo items of
    /// removed records with them. Survivors keep their stream order.
    pub fn run(&self, records: Vec<RawShipmentRecord>, cargo_items: Vec<CargoItem>) -> DedupOutcome {
        let start = Instant::now();
        let mut report = DedupReport {
            records_in: records.len(),
            ..DedupReport::default()
        };

        let mut by_key: HashMap<(RecordSignature, &str), Vec<usize>> = HashMap::new();
        for (pos, record) in records.iter().enumerate() {
            by_key
                .entry((RecordSignature::of(record), record.source.source_file.as_str()))
                .or_default()
                .push(pos);
        }

        let mut removed: HashSet<usize> = HashSet::new();
        for ((signature, source_file), positions) in by_key {
            if positions.len() < self.config.flag_min_repeats.min(self.config.min_block_repeats) {
                continue;
            }
            let signature = signature.to_string();
            let mut kept_here: Vec<usize> = Vec::new();

            for block in self.chain_blocks(&records, positions) {
                if block.len() < self.config.min_block_repeats {
                    kept_here.extend(block);
                    continue;
                }
                let mut summary = repeat_block(&signature, source_file, &records, &block);
                summary.removed = block.len() - 1;
                removed.extend(block.iter().skip(1).copied());
                kept_here.push(block[0]);
                warn!(
                    "Removed hallucination: {} x{} in {} lines {}-{}",
                    summary.signature,
                    summary.occurrences,
                    summary.source_file,
                    summary.first_line,
                    summary.last_line
                );
                metrics::dedup::pattern_removed(summary.removed);
                report.removed_patterns.push(summary);
            }

            if kept_here.len() >= self.config.flag_min_repeats {
                kept_here.sort_by_key(|&i| (records[i].line_number, i));
                let summary = repeat_block(&signature, source_file, &records, &kept_here);
                warn!(
                    "Ambiguous repeat kept for inspection: {} x{} in {} lines {}-{}",
                    summary.signature,
                    summary.occurrences,
                    summary.source_file,
                    summary.first_line,
                    summary.last_line
                );
                metrics::dedup::block_flagged();
                report.flagged_blocks.push(summary);
            }
        }

        let removed_ids: HashSet<Uuid> = removed.iter().map(|&pos| records[pos].record_id).collect();
        let kept: Vec<RawShipmentRecord> = records
            .into_iter()
            .enumerate()
            .filter(|(pos, _)| !removed.contains(pos))
            .map(|(_, record)| record)
            .collect();

        let items_in = cargo_items.len();
        let kept_items: Vec<CargoItem> = cargo_items
            .into_iter()
            .filter(|item| !removed_ids.contains(&item.record_id))
            .collect();

        // Largest patterns first, ties by position for a stable report
        let order = |a: &RepeatBlock, b: &RepeatBlock| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.source_file.cmp(&b.source_file))
                .then_with(|| a.first_line.cmp(&b.first_line))
                .then_with(|| a.signature.cmp(&b.signature))
        };
        report.removed_patterns.sort_by(order);
        report.flagged_blocks.sort_by(order);

        report.records_out = kept.len();
        report.records_removed = report.records_in - kept.len();
        report.cargo_items_removed = items_in - kept_items.len();

        info!(
            "Deduplicated {} records: removed {} in {} patterns, flagged {} blocks",
            report.records_in,
            report.records_removed,
            report.removed_patterns.len(),
            report.flagged_blocks.len()
        );
        metrics::dedup::duration(start.elapsed().as_secs_f64());

        DedupOutcome {
            records: kept,
            cargo_items: kept_items,
            report,
        }
    }
}

/// Summary of line-ordered positions; `removed` starts at zero
fn repeat_block(
    signature: &str,
    source_file: &str,
    records: &[RawShipmentRecord],
    positions: &[usize],
) -> RepeatBlock {
    let line = |i: Option<&usize>| i.map(|&i| records[i].line_number).unwrap_or_default();
    RepeatBlock {
        signature: signature.to_string(),
        source_file: source_file.to_string(),
        occurrences: positions.len(),
        first_line: line(positions.first()),
        last_line: line(positions.last()),
        removed: 0,
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{cargo_item_id, shipment_id, DateParts, RecordFormat, SourceRef};

    fn record(ship: &str, file: &str, line: usize, day: u32) -> RawShipmentRecord {
        RawShipmentRecord {
            record_id: shipment_id("g", file, line),
            source: SourceRef {
                group_id: "g".to_string(),
                source_file: file.to_string(),
                page_seq: 1,
            },
            line_number: line,
            ship_name: ship.to_string(),
            origin_port: "Riga".to_string(),
            destination_port: Some("HULL".to_string()),
            cargo: "500 deals".to_string(),
            merchant: None,
            arrival: DateParts::new(Some(day), Some(5), Some(1880)),
            publication: DateParts::default(),
            is_steamship: false,
            format: RecordFormat::EarlyAt,
            confidence: 1.0,
            raw_line: String::new(),
        }
    }

    fn item_for(record: &RawShipmentRecord) -> CargoItem {
        CargoItem {
            item_id: cargo_item_id(&record.record_id, 0),
            record_id: record.record_id,
            quantity: Some(500),
            unit: None,
            commodity: "deals".to_string(),
            merchant: None,
            merchant_inherited: false,
            raw_text: "500 deals".to_string(),
        }
    }

    #[test]
    fn test_dense_block_collapses_and_takes_items_along() {
        let mut records = vec![record("Other", "a.txt", 1, 2)];
        records.extend((2..=13).map(|line| record("Anna", "a.txt", line, 4)));
        let items: Vec<CargoItem> = records.iter().map(item_for).collect();

        let outcome = Deduplicator::default().run(records, items);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].ship_name, "Other");
        assert_eq!(outcome.records[1].line_number, 2);
        assert_eq!(outcome.cargo_items.len(), 2);
        assert_eq!(outcome.report.records_removed, 11);
        assert_eq!(outcome.report.cargo_items_removed, 11);
        assert_eq!(outcome.report.removed_patterns.len(), 1);
        assert_eq!(outcome.report.removed_patterns[0].occurrences, 12);
    }

    #[test]
    fn test_small_repeat_is_flagged_not_removed() {
        let records = vec![
            record("Anna", "a.txt", 5, 4),
            record("Anna", "a.txt", 6, 4),
            record("Anna", "a.txt", 40, 4),
        ];
        let outcome = Deduplicator::default().run(records, Vec::new());

        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.report.removed_patterns.is_empty());
        assert_eq!(outcome.report.flagged_blocks.len(), 1);
        let flagged = &outcome.report.flagged_blocks[0];
        assert_eq!(flagged.occurrences, 3);
        assert_eq!((flagged.first_line, flagged.last_line), (5, 40));
        assert_eq!(flagged.removed, 0);
    }

    #[test]
    fn test_sparse_same_file_repeats_are_kept_and_flagged() {
        let records: Vec<_> = (0..12).map(|i| record("Anna", "a.txt", 1 + i * 10, 4)).collect();
        let outcome = Deduplicator::default().run(records, Vec::new());

        assert_eq!(outcome.records.len(), 12);
        assert!(outcome.report.removed_patterns.is_empty());
        assert_eq!(outcome.report.flagged_blocks.len(), 1);
        assert_eq!(outcome.report.flagged_blocks[0].occurrences, 12);
    }

    #[test]
    fn test_multi_line_loop_collapses_to_one_cycle() {
        let ships = ["Anna", "Bertha", "Carl", "Dora", "Emil"];
        let records: Vec<_> = (0..200)
            .map(|i| record(ships[i % ships.len()], "a.txt", i + 1, 4))
            .collect();
        let items: Vec<CargoItem> = records.iter().map(item_for).collect();

        let outcome = Deduplicator::default().run(records, items);

        let kept: Vec<&str> = outcome.records.iter().map(|r| r.ship_name.as_str()).collect();
        assert_eq!(kept, ships);
        assert_eq!(outcome.cargo_items.len(), 5);
        assert_eq!(outcome.report.records_removed, 195);
        assert_eq!(outcome.report.removed_patterns.len(), 5);
        assert!(outcome
            .report
            .removed_patterns
            .iter()
            .all(|p| p.occurrences == 40 && p.removed == 39));
        assert!(outcome.report.flagged_blocks.is_empty());
    }

    #[test]
    fn test_loop_survivor_and_distant_repeat_are_flagged() {
        let mut records: Vec<_> = (1..=15).map(|line| record("Anna", "a.txt", line, 4)).collect();
        records.push(record("Anna", "a.txt", 90, 4));
        let outcome = Deduplicator::default().run(records, Vec::new());

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.report.removed_patterns[0].removed, 14);
        let flagged = &outcome.report.flagged_blocks[0];
        assert_eq!(flagged.occurrences, 2);
        assert_eq!((flagged.first_line, flagged.last_line), (1, 90));
    }
}
