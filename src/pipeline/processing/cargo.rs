//! Cargo segment decomposer.
//!
//! A cargo field is split into segments at `;` and long dashes, each segment
//! into item chunks at a comma followed by a quantity, and every chunk is read
//! by one anchored pattern: quantity, optional unit, commodity, optional
//! merchant. Reading the whole chunk at once keeps a quantity from being
//! counted twice and scopes a merchant to its own item.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::CargoConfig;
use crate::types::{cargo_item_id, CargoItem, RawShipmentRecord};
use crate::vocabulary::{
    canonical_unit, is_commodity_word, is_denylisted_fragment, is_merchant_placeholder,
    is_unit_word, is_whitelisted_short_commodity, unit_alternation, MERCHANT_SUFFIXES,
};

static ITEM_CHUNK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<qty>\d[\d,]*)\s+(?:(?P<unit>(?i:{}))\.?\s+)?(?P<commodity>[A-Za-z&][A-Za-z&'.\- ]*?)\s*(?:,\s*(?P<merchant>[A-Z].*\S))?[\s.,]*$",
        unit_alternation()
    ))
    .expect("cargo item pattern")
});

/// Commodity text with no quantity, e.g. "mahogany and cedar, Order"
static DESCRIPTIVE_CHUNK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<commodity>[A-Za-z][A-Za-z&'.\- ]*?)\s*(?:,\s*(?P<merchant>[A-Z].*\S))?[\s.,]*$")
        .expect("descriptive cargo pattern")
});

/// A closing "&c." that belongs to no item, as in "500 deals, &c."
static TRAILING_ETC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,]*&c\.?[\s.,]*$").expect("trailing etc pattern"));

/// Comma, whitespace, then the digit opening the next item
static ITEM_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s+(\d)").expect("item boundary pattern"));

const DESCRIPTIVE_COMMODITIES: &[&str] = &[
    "deals", "timber", "boards", "battens", "staves", "mahogany", "cedar", "oak", "pine",
    "firewood", "laths", "planks",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CargoStats {
    pub records: usize,
    pub records_without_items: usize,
    pub segments: usize,
    pub segments_failed: usize,
    pub items: usize,
    pub descriptive_items: usize,
    pub rejected_commodities: usize,
    pub inherited_merchants: usize,
}

impl CargoStats {
    pub fn merge(&mut self, other: &CargoStats) {
        self.records += other.records;
        self.records_without_items += other.records_without_items;
        self.segments += other.segments;
        self.segments_failed += other.segments_failed;
        self.items += other.items;
        self.descriptive_items += other.descriptive_items;
        self.rejected_commodities += other.rejected_commodities;
        self.inherited_merchants += other.inherited_merchants;
    }
}

/// Split a cargo field into item segments at `;`, `—` and `–`
pub fn split_segments(cargo: &str) -> Vec<&str> {
    cargo
        .split([';', '—', '–'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Split one segment where a comma is followed by whitespace and a quantity
pub fn split_items(segment: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for caps in ITEM_BOUNDARY.captures_iter(segment) {
        let (Some(whole), Some(digit)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        chunks.push(segment[start..whole.start()].trim());
        start = digit.start();
    }
    chunks.push(segment[start..].trim());
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Lower-case, collapse whitespace and strip `&c.` style endings
fn clean_commodity(raw: &str) -> String {
    let mut commodity = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    loop {
        let trimmed = commodity
            .trim_end_matches(['-', '\'', '.', ',', ' '])
            .trim_end_matches("&c")
            .trim_end_matches('&')
            .trim_end()
            .to_string();
        if trimmed == commodity {
            break;
        }
        commodity = trimmed;
    }
    commodity
}

fn clean_merchant(raw: Option<&str>) -> Option<String> {
    let merchant = raw?.trim().trim_end_matches(',').trim();
    if merchant.is_empty() || is_merchant_placeholder(merchant) {
        return None;
    }
    let words: Vec<&str> = merchant
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    if !words.is_empty() && words.iter().all(|w| is_commodity_word(w)) {
        return None;
    }
    Some(merchant.to_string())
}

pub struct CargoDecomposer {
    config: CargoConfig,
}

impl CargoDecomposer {
    pub fn new(config: CargoConfig) -> Self {
        Self { config }
    }

    /// Guardrails on a cleaned commodity
    pub fn accepts_commodity(&self, commodity: &str) -> bool {
        let len = commodity.chars().count();
        if commodity.is_empty() || commodity.starts_with('&') {
            return false;
        }
        if MERCHANT_SUFFIXES.iter().any(|suffix| commodity.ends_with(suffix)) {
            return false;
        }
        if is_unit_word(commodity) || is_denylisted_fragment(commodity) {
            return false;
        }
        if len > self.config.max_commodity_len {
            return false;
        }
        len >= self.config.min_commodity_len || is_whitelisted_short_commodity(commodity)
    }

    /// Items of one record; a field with nothing recognizable yields an empty list
    pub fn decompose(&self, record: &RawShipmentRecord, stats: &mut CargoStats) -> Vec<CargoItem> {
        let mut items = Vec::new();
        stats.records += 1;

        for segment in split_segments(&record.cargo) {
            stats.segments += 1;
            let before = items.len();

            for chunk in split_items(segment) {
                if let Some(mut item) = self.read_chunk(chunk, stats) {
                    if item.merchant.is_none() && record.merchant.is_some() {
                        item.merchant = record.merchant.clone();
                        item.merchant_inherited = true;
                        stats.inherited_merchants += 1;
                    }
                    item.item_id = cargo_item_id(&record.record_id, items.len());
                    item.record_id = record.record_id;
                    items.push(item);
                }
            }

            if items.len() == before {
                stats.segments_failed += 1;
            }
        }

        stats.items += items.len();
        if items.is_empty() {
            stats.records_without_items += 1;
        }
        items
    }

    fn read_chunk(&self, chunk: &str, stats: &mut CargoStats) -> Option<CargoItem> {
        let text = TRAILING_ETC.replace(chunk, "");
        let (quantity, unit, raw_commodity, raw_merchant) = match ITEM_CHUNK.captures(&text) {
            Some(caps) => (
                caps.name("qty")
                    .and_then(|q| q.as_str().replace(',', "").parse::<u64>().ok()),
                caps.name("unit")
                    .and_then(|u| canonical_unit(u.as_str()))
                    .map(str::to_string),
                caps.name("commodity")?.as_str().to_string(),
                caps.name("merchant").map(|m| m.as_str().to_string()),
            ),
            None => {
                let caps = DESCRIPTIVE_CHUNK.captures(&text)?;
                let commodity = caps.name("commodity")?.as_str().to_lowercase();
                if !commodity
                    .split_whitespace()
                    .any(|w| DESCRIPTIVE_COMMODITIES.contains(&w))
                {
                    return None;
                }
                stats.descriptive_items += 1;
                (
                    None,
                    None,
                    commodity,
                    caps.name("merchant").map(|m| m.as_str().to_string()),
                )
            }
        };

        let commodity = clean_commodity(&raw_commodity);
        if !self.accepts_commodity(&commodity) {
            stats.rejected_commodities += 1;
            return None;
        }

        Some(CargoItem {
            item_id: Default::default(),
            record_id: Default::default(),
            quantity,
            unit,
            commodity,
            merchant: clean_merchant(raw_merchant.as_deref()),
            merchant_inherited: false,
            raw_text: chunk.to_string(),
        })
    }
}

impl Default for CargoDecomposer {
    fn default() -> Self {
        Self::new(CargoConfig::default())
    }
}
