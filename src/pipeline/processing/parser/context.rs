use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{DocumentGroup, RecordFormat};
use crate::vocabulary::{is_dock_name, is_uk_city, LONDON_DOCKS};

/// Layout era expected for a document group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// 1874–1878: `Ship @ Origin,—cargo`
    EarlyAt,
    /// 1879–1880: both delimiters occur
    Transition,
    /// 1881–1884: dash-delimited columns
    StandardDash,
    /// 1885 onwards: dash columns under London dock subdivisions
    LateDock,
    #[default]
    Unknown,
}

static DASH_BEFORE_CAPITAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"-[A-Z]").expect("dash pattern"));
static SPACED_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+-\s+").expect("dash pattern"));

impl FormatHint {
    pub fn from_year(year: i32) -> Self {
        match year {
            i32::MIN..=1878 => FormatHint::EarlyAt,
            1879..=1880 => FormatHint::Transition,
            1881..=1884 => FormatHint::StandardDash,
            _ => FormatHint::LateDock,
        }
    }

    /// Guess from delimiter counts and dock subdivision names
    pub fn from_content(text: &str) -> Self {
        let at_count = text.matches('@').count();
        let dash_count = SPACED_DASH.find_iter(text).count();

        if at_count > 0 && at_count > dash_count {
            return FormatHint::EarlyAt;
        }
        if LONDON_DOCKS.iter().any(|dock| text.contains(dock)) {
            return FormatHint::LateDock;
        }
        if DASH_BEFORE_CAPITAL.is_match(text) {
            return FormatHint::StandardDash;
        }
        if at_count > 0 && dash_count > 0 {
            return FormatHint::Transition;
        }
        FormatHint::Unknown
    }

    /// Publication year when known, otherwise the page text
    pub fn detect(group: &DocumentGroup) -> Self {
        if let Some(year) = group.publication.year {
            return Self::from_year(year);
        }
        let text = group
            .pages
            .iter()
            .flat_map(|page| page.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        Self::from_content(&text)
    }

    /// True when the hint is definite and expects a different layout family
    pub fn disagrees_with(&self, format: RecordFormat) -> bool {
        match self {
            FormatHint::EarlyAt => format != RecordFormat::EarlyAt,
            FormatHint::StandardDash | FormatHint::LateDock => format == RecordFormat::EarlyAt,
            FormatHint::Transition | FormatHint::Unknown => false,
        }
    }
}

/// How much header context has been seen so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    NoContext,
    PortKnown,
    PortAndDateKnown,
}

/// Mutable header state for one document group.
///
/// Created fresh for every group and passed explicitly through the page loop;
/// it survives page boundaries but never crosses into another group.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    destination: Option<String>,
    city: Option<String>,
    month: Option<u32>,
    day: Option<u32>,
    format_hint: FormatHint,
}

impl ParseContext {
    pub fn new(format_hint: FormatHint) -> Self {
        Self {
            format_hint,
            ..Self::default()
        }
    }

    /// A date without a port still reports `NoContext`: records would lack a destination.
    pub fn state(&self) -> ContextState {
        match (&self.destination, self.month.or(self.day)) {
            (None, _) => ContextState::NoContext,
            (Some(_), None) => ContextState::PortKnown,
            (Some(_), Some(_)) => ContextState::PortAndDateKnown,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }

    pub fn day(&self) -> Option<u32> {
        self.day
    }

    pub fn format_hint(&self) -> FormatHint {
        self.format_hint
    }

    /// Apply a destination header. UK cities are remembered so that the dock
    /// headers printed beneath them resolve to `City (Dock)`.
    pub fn enter_port_header(&mut self, name: &str) {
        let upper = name.to_uppercase();
        if is_uk_city(&upper) {
            self.city = Some(name.to_string());
            self.destination = Some(name.to_string());
        } else if is_dock_name(&upper) {
            self.destination = Some(match &self.city {
                Some(city) => format!("{} ({})", city, name),
                None => name.to_string(),
            });
        } else {
            self.city = None;
            self.destination = Some(name.to_string());
        }
    }

    /// A date header, or a date printed on a shipment line
    pub fn observe_date(&mut self, month: Option<u32>, day: Option<u32>) {
        if month.is_some() {
            self.month = month;
        }
        if day.is_some() {
            self.day = day;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut ctx = ParseContext::new(FormatHint::Unknown);
        assert_eq!(ctx.state(), ContextState::NoContext);

        ctx.enter_port_header("GRIMSBY");
        assert_eq!(ctx.state(), ContextState::PortKnown);

        ctx.observe_date(Some(4), Some(18));
        assert_eq!(ctx.state(), ContextState::PortAndDateKnown);
    }

    #[test]
    fn test_dock_headers_under_city() {
        let mut ctx = ParseContext::default();
        ctx.enter_port_header("LONDON");
        assert_eq!(ctx.destination(), Some("LONDON"));

        ctx.enter_port_header("SURREY COMMERCIAL DOCKS");
        assert_eq!(ctx.destination(), Some("LONDON (SURREY COMMERCIAL DOCKS)"));

        ctx.enter_port_header("MILLWALL DOCKS");
        assert_eq!(ctx.destination(), Some("LONDON (MILLWALL DOCKS)"));

        // A new city replaces the old one; a plain port drops it
        ctx.enter_port_header("HULL");
        ctx.enter_port_header("GOOLE");
        ctx.enter_port_header("ALEXANDRA DOCK");
        assert_eq!(ctx.destination(), Some("GOOLE (ALEXANDRA DOCK)"));

        ctx.enter_port_header("WEST HARTLEPOOL");
        ctx.enter_port_header("VICTORIA DOCK");
        assert_eq!(ctx.destination(), Some("VICTORIA DOCK"));
    }

    #[test]
    fn test_format_hint_by_year() {
        assert_eq!(FormatHint::from_year(1875), FormatHint::EarlyAt);
        assert_eq!(FormatHint::from_year(1880), FormatHint::Transition);
        assert_eq!(FormatHint::from_year(1883), FormatHint::StandardDash);
        assert_eq!(FormatHint::from_year(1890), FormatHint::LateDock);
    }

    #[test]
    fn test_format_hint_by_content() {
        assert_eq!(
            FormatHint::from_content("Anna @ Riga,—500 deals\nHope @ Memel,—20 lds."),
            FormatHint::EarlyAt
        );
        assert_eq!(
            FormatHint::from_content("MILLWALL DOCKS.\nHoppet - Memel - timber - Order"),
            FormatHint::LateDock
        );
        assert_eq!(FormatHint::from_content("nothing here"), FormatHint::Unknown);
    }

    #[test]
    fn test_hint_disagreement() {
        assert!(FormatHint::EarlyAt.disagrees_with(RecordFormat::Condensed));
        assert!(FormatHint::LateDock.disagrees_with(RecordFormat::EarlyAt));
        assert!(!FormatHint::Transition.disagrees_with(RecordFormat::EarlyAt));
    }
}
