//! Shipment line layouts, tried in a fixed order.
//!
//! Each layout is a pure matcher: it either extracts the fields of one line or
//! declines. New layouts are added by registering another `LineLayout`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::types::RecordFormat;
use crate::vocabulary::parse_month;

/// Fields lifted from one shipment line before any context is applied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineFields {
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub ship_name: String,
    pub origin_port: String,
    pub destination_port: Option<String>,
    pub cargo: String,
    pub merchant: Option<String>,
    pub is_steamship: bool,
}

pub trait LineLayout: Send + Sync {
    fn format(&self) -> RecordFormat;

    /// Returns the extracted fields, or `None` when the line is not in this layout
    fn extract(&self, line: &str) -> Option<LineFields>;
}

const MONTH: &str = r"(?P<month>(?i:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[A-Za-z]{0,6})";
const SHIP: &str = r"(?P<ship>[A-Za-z][A-Za-z\s.&'\-]*?)\s*(?P<steam>\(s\))?\s*";
/// Starts with a letter; OCR mojibake such as "GÃ¤vle" must survive until repair
const ORIGIN: &str = r"(?P<origin>\p{L}[^\d@—–]*?)";

static EARLY_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:{MONTH}\.?\s+(?P<day>\d{{1,2}})\.?\s+)?{SHIP}@\s*{ORIGIN},?\s*(?P<cargo>[—–\d].*?)\s*$"
    ))
    .expect("early layout pattern")
});

static STANDARD_DASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:{MONTH}\.\s+)?(?P<day>\d{{1,2}})\.?\s+{SHIP}-\s*{ORIGIN}\s*-\s*(?P<cargo>[^-]+?)\s*-\s*(?P<merchant>.+?)\s*$"
    ))
    .expect("standard layout pattern")
});

static CONDENSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<ship>[A-Z][A-Za-z\s.&'\-]*?)\s*(?P<steam>\(s\))?\s*-\s*{ORIGIN}\s*-\s*(?P<cargo>[^-]+?)\s*-\s*(?P<merchant>.+?)\s*$"
    ))
    .expect("condensed layout pattern")
});

fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim().trim_end_matches(',').trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Shared extraction; fails when a captured month is not a month or the day is out of range
fn fields_from(caps: &Captures<'_>) -> Option<LineFields> {
    let month = match caps.name("month") {
        Some(m) => Some(parse_month(m.as_str())?),
        None => None,
    };
    let day = match caps.name("day") {
        Some(d) => {
            let day: u32 = d.as_str().parse().ok()?;
            if !(1..=31).contains(&day) {
                return None;
            }
            Some(day)
        }
        None => None,
    };

    Some(LineFields {
        month,
        day,
        ship_name: text(caps, "ship")?,
        origin_port: text(caps, "origin")?,
        destination_port: None,
        cargo: text(caps, "cargo")?,
        merchant: text(caps, "merchant"),
        is_steamship: caps.name("steam").is_some(),
    })
}

/// `[Month. Day] Ship @ Origin,—cargo` (1874–1880)
pub struct EarlyAtLayout;

impl LineLayout for EarlyAtLayout {
    fn format(&self) -> RecordFormat {
        RecordFormat::EarlyAt
    }

    fn extract(&self, line: &str) -> Option<LineFields> {
        if !line.contains('@') {
            return None;
        }
        EARLY_AT.captures(line).and_then(|caps| fields_from(&caps))
    }
}

/// `[Month.] Day Ship - Origin - cargo - Merchant`
pub struct StandardDashLayout;

impl LineLayout for StandardDashLayout {
    fn format(&self) -> RecordFormat {
        RecordFormat::StandardDash
    }

    fn extract(&self, line: &str) -> Option<LineFields> {
        STANDARD_DASH.captures(line).and_then(|caps| fields_from(&caps))
    }
}

/// `Ship - Origin - cargo - Merchant`, date carried from context
pub struct CondensedLayout;

impl LineLayout for CondensedLayout {
    fn format(&self) -> RecordFormat {
        RecordFormat::Condensed
    }

    fn extract(&self, line: &str) -> Option<LineFields> {
        if !line.contains('-') {
            return None;
        }
        CONDENSED.captures(line).and_then(|caps| fields_from(&caps))
    }
}

/// Ordered set of layouts; the first match wins
pub struct LayoutRegistry {
    layouts: Vec<Box<dyn LineLayout>>,
}

impl LayoutRegistry {
    /// The three journal layouts in priority order
    pub fn new() -> Self {
        let mut registry = Self { layouts: Vec::new() };
        registry.register(Box::new(EarlyAtLayout));
        registry.register(Box::new(StandardDashLayout));
        registry.register(Box::new(CondensedLayout));
        registry
    }

    /// Append a layout after the built-in ones
    pub fn register(&mut self, layout: Box<dyn LineLayout>) {
        self.layouts.push(layout);
    }

    pub fn match_line(&self, line: &str) -> Option<(RecordFormat, LineFields)> {
        self.layouts
            .iter()
            .find_map(|layout| layout.extract(line).map(|fields| (layout.format(), fields)))
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}
