use chrono::Utc;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::metrics;
use crate::output::{CargoItemRow, RunSummary, ShipmentRow};
use crate::pipeline::processing::cargo::{CargoDecomposer, CargoStats};
use crate::pipeline::processing::dedup::Deduplicator;
use crate::pipeline::processing::normalize::{NormalizationEngine, ReviewEntry};
use crate::pipeline::processing::parser::{GroupParse, ParseStats, ShipmentParser};
use crate::reference::ReferenceData;
use crate::types::{CargoItem, DocumentGroup, RawShipmentRecord};

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub shipments: Vec<ShipmentRow>,
    pub cargo_items: Vec<CargoItemRow>,
    pub review_queue: Vec<ReviewEntry>,
    pub summary: RunSummary,
}

/// Parse → decompose → deduplicate → normalize
pub struct Pipeline {
    config: Config,
    parser: ShipmentParser,
    decomposer: CargoDecomposer,
    deduplicator: Deduplicator,
    engine: NormalizationEngine,
    reference_fingerprint: String,
}

impl Pipeline {
    /// Fails on invalid configuration or reference data; nothing is parsed
    /// until both are sound.
    pub fn new(config: Config, reference: ReferenceData) -> Result<Self> {
        config.validate()?;
        reference.validate()?;
        let engine = NormalizationEngine::new(&reference, config.normalize.clone())?;

        Ok(Self {
            parser: ShipmentParser::new(config.parser.clone()),
            decomposer: CargoDecomposer::new(config.cargo.clone()),
            deduplicator: Deduplicator::new(config.dedup.clone()),
            engine,
            reference_fingerprint: reference.fingerprint(),
            config,
        })
    }

    /// Parse every group, each with its own context. Records keep line order
    /// within a group; groups keep input order.
    pub fn parse(&self, groups: &[DocumentGroup]) -> (Vec<RawShipmentRecord>, ParseStats) {
        let start = Instant::now();
        let parsed: Vec<GroupParse> = if self.config.run.parallel {
            groups.par_iter().map(|g| self.parser.parse_group(g)).collect()
        } else {
            groups.iter().map(|g| self.parser.parse_group(g)).collect()
        };

        let mut stats = ParseStats::default();
        let mut records = Vec::new();
        for group in parsed {
            stats.merge(&group.stats);
            records.extend(group.records);
        }

        info!(
            "Parsed {} groups: {} records from {} lines ({} unrecognized)",
            stats.groups, stats.records, stats.lines_seen, stats.unrecognized_lines
        );
        metrics::parser::duration(start.elapsed().as_secs_f64());
        (records, stats)
    }

    /// Cargo items for every record, in record order
    pub fn decompose(&self, records: &[RawShipmentRecord]) -> (Vec<CargoItem>, CargoStats) {
        let start = Instant::now();
        let decompose_one = |record: &RawShipmentRecord| {
            let mut stats = CargoStats::default();
            let items = self.decomposer.decompose(record, &mut stats);
            (items, stats)
        };
        let per_record: Vec<(Vec<CargoItem>, CargoStats)> = if self.config.run.parallel {
            records.par_iter().map(decompose_one).collect()
        } else {
            records.iter().map(decompose_one).collect()
        };

        // Worker-local stats are merged once all records are done
        let mut stats = CargoStats::default();
        let mut items = Vec::new();
        for (record_items, record_stats) in per_record {
            stats.merge(&record_stats);
            items.extend(record_items);
        }

        info!(
            "Decomposed cargo of {} records into {} items ({} failed segments)",
            stats.records, stats.items, stats.segments_failed
        );
        metrics::cargo::decomposed(stats.items, stats.segments_failed);
        metrics::cargo::duration(start.elapsed().as_secs_f64());
        (items, stats)
    }

    pub fn run(&self, groups: Vec<DocumentGroup>) -> PipelineOutput {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id);
        let _enter = span.enter();
        info!("Starting run over {} document groups", groups.len());

        let (records, parse_stats) = self.parse(&groups);
        let (items, cargo_stats) = self.decompose(&records);
        let deduped = self.deduplicator.run(records, items);

        let mut shipments: Vec<ShipmentRow> = deduped.records.iter().map(ShipmentRow::from).collect();
        let mut cargo_items: Vec<CargoItemRow> = deduped.cargo_items.iter().map(CargoItemRow::from).collect();
        let normalization = self
            .engine
            .normalize(&mut shipments, &mut cargo_items, self.config.run.parallel);

        let summary = RunSummary {
            run_id,
            generated_at: Utc::now(),
            reference_fingerprint: self.reference_fingerprint.clone(),
            shipments: shipments.len(),
            cargo_items: cargo_items.len(),
            review_queue_len: normalization.review_queue.len(),
            parse: parse_stats,
            cargo: cargo_stats,
            dedup: deduped.report,
            coverage: normalization.coverage,
        };

        info!(
            "Run complete: {} shipments, {} cargo items, {} values for review",
            summary.shipments, summary.cargo_items, summary.review_queue_len
        );

        PipelineOutput {
            shipments,
            cargo_items,
            review_queue: normalization.review_queue,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricName;
    use crate::types::PageText;
    use ::metrics::{
        Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Tally(Arc<AtomicUsize>);

    impl HistogramFn for Tally {
        fn record(&self, _value: f64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Counts samples recorded into one histogram
    struct HistogramTally {
        name: &'static str,
        samples: Arc<AtomicUsize>,
    }

    impl Recorder for HistogramTally {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
            if key.name() == self.name {
                Histogram::from_arc(Arc::new(Tally(self.samples.clone())))
            } else {
                Histogram::noop()
            }
        }
    }

    #[test]
    fn test_parse_records_one_duration_per_call() {
        let mut config = Config::default();
        config.run.parallel = false;
        let pipeline = Pipeline::new(config, ReferenceData::default()).unwrap();
        let groups = crate::pipeline::parser::group_pages(vec![
            PageText {
                file_name: "18800508_p001.txt".to_string(),
                text: "HULL.\nMay 4.\nAnna @ Riga,—500 deals".to_string(),
            },
            PageText {
                file_name: "18800515_p001.txt".to_string(),
                text: "Bertha @ Memel,—20 lds. timber".to_string(),
            },
        ]);

        let recorder = HistogramTally {
            name: MetricName::ParserDuration.as_str(),
            samples: Arc::new(AtomicUsize::new(0)),
        };
        let (records, stats) = ::metrics::with_local_recorder(&recorder, || pipeline.parse(&groups));

        assert_eq!(stats.groups, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(recorder.samples.load(Ordering::SeqCst), 1);
    }
}
