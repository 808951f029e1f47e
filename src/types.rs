use chrono::{Month, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PipelineError;

/// Namespace for deterministic shipment and cargo identifiers
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_4d0e_93a2_4c57_a1e8_2f0c_5d7e_9b31);

/// Free-text field classes that carry canonical values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    OriginPort,
    DestinationPort,
    Commodity,
    Merchant,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::OriginPort => "origin_port",
            EntityClass::DestinationPort => "destination_port",
            EntityClass::Commodity => "commodity",
            EntityClass::Merchant => "merchant",
        }
    }

    pub fn all() -> [EntityClass; 4] {
        [
            EntityClass::OriginPort,
            EntityClass::DestinationPort,
            EntityClass::Commodity,
            EntityClass::Merchant,
        ]
    }

    pub fn is_port(&self) -> bool {
        matches!(self, EntityClass::OriginPort | EntityClass::DestinationPort)
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "origin" | "origin_port" => Ok(EntityClass::OriginPort),
            "destination" | "destination_port" | "dest" => Ok(EntityClass::DestinationPort),
            "commodity" => Ok(EntityClass::Commodity),
            "merchant" => Ok(EntityClass::Merchant),
            other => Err(PipelineError::UnknownEntityClass(other.to_string())),
        }
    }
}

/// Day / month / year as found in the text; any part may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateParts {
    pub day: Option<u32>,
    /// 1-based month number
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl DateParts {
    pub fn new(day: Option<u32>, month: Option<u32>, year: Option<i32>) -> Self {
        Self { day, month, year }
    }

    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.month.is_none() && self.year.is_none()
    }

    pub fn month_name(&self) -> Option<&'static str> {
        let m = u8::try_from(self.month?).ok()?;
        Month::try_from(m).ok().map(|m| m.name())
    }

    /// `None` when a part is missing; otherwise whether the parts form a real date.
    pub fn is_calendar_date(&self) -> Option<bool> {
        let (d, m, y) = (self.day?, self.month?, self.year?);
        Some(NaiveDate::from_ymd_opt(y, m, d).is_some())
    }
}

/// One OCR page file as handed over by the OCR stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub file_name: String,
    pub text: String,
}

/// Ordered lines of one physical page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    pub group_id: String,
    pub page_seq: u32,
    pub source_file: String,
    pub lines: Vec<String>,
}

/// The pages of one physical journal excerpt, in page order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub group_id: String,
    pub publication: DateParts,
    pub pages: Vec<RawPage>,
}

/// Record layouts, tried in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `Ship @ Origin,—cargo`
    EarlyAt,
    /// `Month. Day Ship - Origin - cargo - Merchant`
    StandardDash,
    /// `Ship - Origin - cargo - Merchant`
    Condensed,
}

impl RecordFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::EarlyAt => "early_at",
            RecordFormat::StandardDash => "standard_dash",
            RecordFormat::Condensed => "condensed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub group_id: String,
    pub source_file: String,
    pub page_seq: u32,
}

/// One recognized arrival line, exactly as the parser saw it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawShipmentRecord {
    pub record_id: Uuid,
    pub source: SourceRef,
    /// 1-based line number within the page file
    pub line_number: usize,
    pub ship_name: String,
    pub origin_port: String,
    pub destination_port: Option<String>,
    pub cargo: String,
    pub merchant: Option<String>,
    pub arrival: DateParts,
    pub publication: DateParts,
    pub is_steamship: bool,
    pub format: RecordFormat,
    pub confidence: f64,
    pub raw_line: String,
}

/// One decomposed cargo entry, always tied to its parent shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoItem {
    pub item_id: Uuid,
    pub record_id: Uuid,
    pub quantity: Option<u64>,
    pub unit: Option<String>,
    pub commodity: String,
    pub merchant: Option<String>,
    /// Merchant copied from the shipment line rather than printed with the item
    #[serde(default)]
    pub merchant_inherited: bool,
    pub raw_text: String,
}

/// Reduced field tuple used only for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordSignature {
    pub ship_name: String,
    pub origin_port: String,
    pub destination_port: Option<String>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl RecordSignature {
    pub fn of(record: &RawShipmentRecord) -> Self {
        Self {
            ship_name: record.ship_name.clone(),
            origin_port: record.origin_port.clone(),
            destination_port: record.destination_port.clone(),
            day: record.arrival.day,
            month: record.arrival.month,
            year: record.arrival.year,
        }
    }
}

impl fmt::Display for RecordSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = DateParts::new(self.day, self.month, self.year);
        write!(
            f,
            "{} from {} to {} on {} {}, {}",
            self.ship_name,
            self.origin_port,
            self.destination_port.as_deref().unwrap_or("?"),
            date.month_name().unwrap_or("?"),
            self.day.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string()),
            self.year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string()),
        )
    }
}

pub fn shipment_id(group_id: &str, source_file: &str, line_number: usize) -> Uuid {
    let key = format!("{}|{}|{}", group_id, source_file, line_number);
    Uuid::new_v5(&RECORD_NAMESPACE, key.as_bytes())
}

pub fn cargo_item_id(record_id: &Uuid, index: usize) -> Uuid {
    let key = format!("{}|{}", record_id, index);
    Uuid::new_v5(&RECORD_NAMESPACE, key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_class_aliases() {
        assert_eq!("origin".parse::<EntityClass>().unwrap(), EntityClass::OriginPort);
        assert_eq!(
            "Destination_Port".parse::<EntityClass>().unwrap(),
            EntityClass::DestinationPort
        );
        assert!("harbour".parse::<EntityClass>().is_err());
    }

    #[test]
    fn test_calendar_date_check() {
        assert_eq!(DateParts::new(Some(31), Some(2), Some(1880)).is_calendar_date(), Some(false));
        assert_eq!(DateParts::new(Some(29), Some(2), Some(1880)).is_calendar_date(), Some(true));
        assert_eq!(DateParts::new(None, Some(2), Some(1880)).is_calendar_date(), None);
        assert_eq!(DateParts::new(Some(1), Some(9), None).month_name(), Some("September"));
    }

    #[test]
    fn test_identifiers_are_stable() {
        let a = shipment_id("18790426", "18790426_p001.txt", 12);
        let b = shipment_id("18790426", "18790426_p001.txt", 12);
        let c = shipment_id("18790426", "18790426_p001.txt", 13);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(cargo_item_id(&a, 0), cargo_item_id(&a, 1));
    }
}
