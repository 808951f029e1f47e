//! Metric names and per-phase recording helpers.
//!
//! The library only talks to the `metrics` facade; installing a recorder
//! (Prometheus or otherwise) is left to the host process. Without one every
//! call below is a no-op.

use std::fmt;

use crate::types::EntityClass;

/// Centralized metric names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    // Parser metrics
    ParserGroupsParsed,
    ParserLinesSeen,
    ParserLinesUnrecognized,
    ParserRecordsParsed,
    ParserLayoutMismatch,
    ParserDuration,

    // Cargo metrics
    CargoItemsExtracted,
    CargoSegmentsFailed,
    CargoDuration,

    // Dedup metrics
    DedupRecordsRemoved,
    DedupPatternsRemoved,
    DedupBlocksFlagged,
    DedupDuration,

    // Normalize metrics
    NormalizeValuesResolved,
    NormalizeReviewQueued,
    NormalizeDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            // Parser metrics
            MetricName::ParserGroupsParsed => "ttj_parser_groups_parsed_total",
            MetricName::ParserLinesSeen => "ttj_parser_lines_seen_total",
            MetricName::ParserLinesUnrecognized => "ttj_parser_lines_unrecognized_total",
            MetricName::ParserRecordsParsed => "ttj_parser_records_parsed_total",
            MetricName::ParserLayoutMismatch => "ttj_parser_layout_mismatch_total",
            MetricName::ParserDuration => "ttj_parser_duration_seconds",

            // Cargo metrics
            MetricName::CargoItemsExtracted => "ttj_cargo_items_extracted_total",
            MetricName::CargoSegmentsFailed => "ttj_cargo_segments_failed_total",
            MetricName::CargoDuration => "ttj_cargo_duration_seconds",

            // Dedup metrics
            MetricName::DedupRecordsRemoved => "ttj_dedup_records_removed_total",
            MetricName::DedupPatternsRemoved => "ttj_dedup_patterns_removed_total",
            MetricName::DedupBlocksFlagged => "ttj_dedup_blocks_flagged_total",
            MetricName::DedupDuration => "ttj_dedup_duration_seconds",

            // Normalize metrics
            MetricName::NormalizeValuesResolved => "ttj_normalize_values_resolved_total",
            MetricName::NormalizeReviewQueued => "ttj_normalize_review_queued_total",
            MetricName::NormalizeDuration => "ttj_normalize_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            ParserGroupsParsed,
            ParserLinesSeen,
            ParserLinesUnrecognized,
            ParserRecordsParsed,
            ParserLayoutMismatch,
            ParserDuration,
            CargoItemsExtracted,
            CargoSegmentsFailed,
            CargoDuration,
            DedupRecordsRemoved,
            DedupPatternsRemoved,
            DedupBlocksFlagged,
            DedupDuration,
            NormalizeValuesResolved,
            NormalizeReviewQueued,
            NormalizeDuration,
        ]
        .into_iter()
    }
}

// ============================================================================
// Parser Metrics
// ============================================================================

pub mod parser {
    use super::MetricName;

    /// Record the statistics of one parsed document group
    pub fn group_parsed(lines_seen: usize, unrecognized: usize, records: usize, mismatches: usize) {
        ::metrics::counter!(MetricName::ParserGroupsParsed.as_str()).increment(1);
        ::metrics::counter!(MetricName::ParserLinesSeen.as_str()).increment(lines_seen as u64);
        ::metrics::counter!(MetricName::ParserLinesUnrecognized.as_str())
            .increment(unrecognized as u64);
        ::metrics::counter!(MetricName::ParserRecordsParsed.as_str()).increment(records as u64);
        ::metrics::counter!(MetricName::ParserLayoutMismatch.as_str()).increment(mismatches as u64);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::ParserDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Cargo Metrics
// ============================================================================

pub mod cargo {
    use super::MetricName;

    pub fn decomposed(items: usize, failed_segments: usize) {
        ::metrics::counter!(MetricName::CargoItemsExtracted.as_str()).increment(items as u64);
        ::metrics::counter!(MetricName::CargoSegmentsFailed.as_str())
            .increment(failed_segments as u64);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::CargoDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Dedup Metrics
// ============================================================================

pub mod dedup {
    use super::MetricName;

    /// Record one hallucination pattern and the records it lost
    pub fn pattern_removed(removed: usize) {
        ::metrics::counter!(MetricName::DedupPatternsRemoved.as_str()).increment(1);
        ::metrics::counter!(MetricName::DedupRecordsRemoved.as_str()).increment(removed as u64);
    }

    pub fn block_flagged() {
        ::metrics::counter!(MetricName::DedupBlocksFlagged.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::DedupDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::{EntityClass, MetricName};

    /// Record occurrences resolved by one tier for one entity class
    pub fn resolved(class: EntityClass, tier: &'static str, occurrences: u64) {
        if occurrences == 0 {
            return;
        }
        ::metrics::counter!(
            MetricName::NormalizeValuesResolved.as_str(),
            "class" => class.as_str(),
            "tier" => tier
        )
        .increment(occurrences);
    }

    pub fn review_queued(class: EntityClass, distinct_values: usize) {
        ::metrics::counter!(
            MetricName::NormalizeReviewQueued.as_str(),
            "class" => class.as_str()
        )
        .increment(distinct_values as u64);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::NormalizeDuration.as_str()).record(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_follow_prefix() {
        for metric in MetricName::all_metrics() {
            let name = metric.as_str();
            assert!(name.starts_with("ttj_"), "{name}");
            assert!(name.ends_with("_total") || name.ends_with("_seconds"), "{name}");
            assert_eq!(metric.to_string(), name);
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        parser::group_parsed(10, 2, 8, 0);
        cargo::decomposed(3, 1);
        dedup::pattern_removed(84);
        normalize::resolved(EntityClass::OriginPort, "auto_high", 5);
    }
}
