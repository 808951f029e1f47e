//! Context-carrying multi-page parser.
//!
//! Every line of a document group is classified as a blank line, journal
//! boilerplate, a destination-port header, a date header, a shipment line in
//! one of the registered layouts, or an unrecognized line. Headers update the
//! group's `ParseContext`; shipment lines become `RawShipmentRecord`s with
//! missing fields filled from that context.

pub mod context;
pub mod layouts;
pub mod pages;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ParserConfig;
use crate::metrics;
use crate::types::{
    shipment_id, DateParts, DocumentGroup, RawShipmentRecord, RecordFormat, SourceRef,
};
use crate::vocabulary::{is_boilerplate, is_merchant_placeholder, parse_month, repair_mojibake};

pub use context::{ContextState, FormatHint, ParseContext};
pub use layouts::{LayoutRegistry, LineFields, LineLayout};
pub use pages::{group_pages, page_key, read_page_dir, PublicationDate};

static PORT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z\s&.'()]+)\.\s*$").expect("port header pattern"));

static DATE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<month>[A-Za-z]{3,9})\.?\s+(?P<day>\d{1,2})\.?\s*$").expect("date header pattern")
});

/// What one trimmed line turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    Blank,
    Boilerplate,
    PortHeader(String),
    DateHeader { month: u32, day: u32 },
    Shipment(RecordFormat, LineFields),
    Unrecognized,
}

/// Per-run parse counters; merged across groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    pub groups: usize,
    pub empty_groups: usize,
    pub pages: usize,
    pub lines_seen: usize,
    pub blank_lines: usize,
    pub boilerplate_lines: usize,
    pub port_headers: usize,
    pub date_headers: usize,
    pub records: usize,
    pub unrecognized_lines: usize,
    pub layout_mismatches: usize,
    pub records_without_destination: usize,
    pub records_with_publication_date: usize,
    pub records_with_invalid_date: usize,
    pub records_by_format: BTreeMap<RecordFormat, usize>,
}

impl ParseStats {
    pub fn merge(&mut self, other: &ParseStats) {
        self.groups += other.groups;
        self.empty_groups += other.empty_groups;
        self.pages += other.pages;
        self.lines_seen += other.lines_seen;
        self.blank_lines += other.blank_lines;
        self.boilerplate_lines += other.boilerplate_lines;
        self.port_headers += other.port_headers;
        self.date_headers += other.date_headers;
        self.records += other.records;
        self.unrecognized_lines += other.unrecognized_lines;
        self.layout_mismatches += other.layout_mismatches;
        self.records_without_destination += other.records_without_destination;
        self.records_with_publication_date += other.records_with_publication_date;
        self.records_with_invalid_date += other.records_with_invalid_date;
        for (format, count) in &other.records_by_format {
            *self.records_by_format.entry(*format).or_insert(0) += count;
        }
    }
}

/// Records of one document group, in line order
#[derive(Debug, Clone, Default)]
pub struct GroupParse {
    pub records: Vec<RawShipmentRecord>,
    pub stats: ParseStats,
}

pub struct ShipmentParser {
    layouts: LayoutRegistry,
    config: ParserConfig,
}

impl ShipmentParser {
    pub fn new(config: ParserConfig) -> Self {
        Self::with_layouts(config, LayoutRegistry::new())
    }

    pub fn with_layouts(config: ParserConfig, layouts: LayoutRegistry) -> Self {
        Self { layouts, config }
    }

    /// Classify one line without touching any context
    pub fn classify(&self, line: &str) -> LineClass {
        let line = line.trim();
        if line.is_empty() {
            return LineClass::Blank;
        }

        if let Some(caps) = PORT_HEADER.captures(line) {
            let name = caps[1].trim().trim_end_matches('.').trim();
            if is_boilerplate(name) {
                return LineClass::Boilerplate;
            }
            return LineClass::PortHeader(name.to_string());
        }

        if let Some(caps) = DATE_HEADER.captures(line) {
            let day: Option<u32> = caps["day"].parse().ok().filter(|d| (1..=31).contains(d));
            if let (Some(month), Some(day)) = (parse_month(&caps["month"]), day) {
                return LineClass::DateHeader { month, day };
            }
        }

        match self.layouts.match_line(line) {
            Some((format, fields)) => LineClass::Shipment(format, fields),
            None => LineClass::Unrecognized,
        }
    }

    /// Parse one document group with a fresh context. Never fails: lines
    /// that fit no layout are counted and skipped.
    pub fn parse_group(&self, group: &DocumentGroup) -> GroupParse {
        let mut ctx = ParseContext::new(FormatHint::detect(group));
        let mut out = GroupParse::default();
        out.stats.groups = 1;

        for page in &group.pages {
            out.stats.pages += 1;
            for (idx, raw_line) in page.lines.iter().enumerate() {
                out.stats.lines_seen += 1;
                match self.classify(raw_line) {
                    LineClass::Blank => out.stats.blank_lines += 1,
                    LineClass::Boilerplate => out.stats.boilerplate_lines += 1,
                    LineClass::PortHeader(name) => {
                        out.stats.port_headers += 1;
                        ctx.enter_port_header(&repair_mojibake(&name));
                    }
                    LineClass::DateHeader { month, day } => {
                        out.stats.date_headers += 1;
                        ctx.observe_date(Some(month), Some(day));
                    }
                    LineClass::Shipment(format, fields) => {
                        let source = SourceRef {
                            group_id: group.group_id.clone(),
                            source_file: page.source_file.clone(),
                            page_seq: page.page_seq,
                        };
                        let record = self.build_record(
                            &mut ctx,
                            &mut out.stats,
                            group.publication,
                            source,
                            idx + 1,
                            raw_line.trim(),
                            format,
                            fields,
                        );
                        out.records.push(record);
                    }
                    LineClass::Unrecognized => out.stats.unrecognized_lines += 1,
                }
            }
        }

        if out.records.is_empty() {
            out.stats.empty_groups = 1;
        }

        debug!(
            "Parsed group {}: pages={} lines={} records={} unrecognized={} state={:?}",
            group.group_id,
            out.stats.pages,
            out.stats.lines_seen,
            out.stats.records,
            out.stats.unrecognized_lines,
            ctx.state()
        );
        metrics::parser::group_parsed(
            out.stats.lines_seen,
            out.stats.unrecognized_lines,
            out.stats.records,
            out.stats.layout_mismatches,
        );
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        ctx: &mut ParseContext,
        stats: &mut ParseStats,
        publication: DateParts,
        source: SourceRef,
        line_number: usize,
        raw_line: &str,
        format: RecordFormat,
        fields: LineFields,
    ) -> RawShipmentRecord {
        let penalties = &self.config;
        let mut confidence = 1.0_f64;

        stats.records += 1;
        *stats.records_by_format.entry(format).or_insert(0) += 1;
        if ctx.format_hint().disagrees_with(format) {
            stats.layout_mismatches += 1;
        }

        let destination_port = match fields.destination_port {
            Some(explicit) => Some(repair_mojibake(&explicit)),
            None => match ctx.destination() {
                Some(inherited) => {
                    confidence -= penalties.inherited_destination_penalty;
                    Some(inherited.to_string())
                }
                None => {
                    confidence -= penalties.missing_destination_penalty;
                    stats.records_without_destination += 1;
                    None
                }
            },
        };

        // Dates printed on the line become the carried date for later lines
        ctx.observe_date(fields.month, fields.day);
        let month = fields.month.or(ctx.month());
        let day = fields.day.or(ctx.day());
        let inherited_date =
            (fields.month.is_none() && month.is_some()) || (fields.day.is_none() && day.is_some());

        let arrival = if month.is_none() && day.is_none() {
            confidence -= penalties.publication_date_penalty;
            stats.records_with_publication_date += 1;
            publication
        } else {
            if inherited_date {
                confidence -= penalties.inherited_date_penalty;
            }
            DateParts::new(day, month, publication.year)
        };

        if arrival.is_calendar_date() == Some(false) {
            confidence -= penalties.invalid_date_penalty;
            stats.records_with_invalid_date += 1;
        }

        let ship_name = fields.ship_name.replace("(s)", "").trim().to_string();
        let merchant = fields.merchant.filter(|m| !is_merchant_placeholder(m));

        RawShipmentRecord {
            record_id: shipment_id(&source.group_id, &source.source_file, line_number),
            source,
            line_number,
            ship_name,
            origin_port: repair_mojibake(&fields.origin_port),
            destination_port,
            cargo: fields.cargo,
            merchant,
            arrival,
            publication,
            is_steamship: fields.is_steamship || raw_line.contains("(s)"),
            format,
            confidence: confidence.clamp(0.0, 1.0),
            raw_line: raw_line.to_string(),
        }
    }
}

impl Default for ShipmentParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}
