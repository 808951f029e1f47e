//! Static reference vocabulary: units, header denylists, month names,
//! encoding repairs and the curated historical alias tables.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::types::EntityClass;

/// Unit spellings as printed (lower-cased, no trailing period) mapped to the
/// abbreviation used in output rows.
pub const UNIT_FORMS: &[(&str, &str)] = &[
    ("pcs", "pcs"),
    ("pieces", "pcs"),
    ("pc", "pcs"),
    ("bdls", "bdls"),
    ("bundles", "bdls"),
    ("bdl", "bdls"),
    ("bgs", "bgs"),
    ("bags", "bgs"),
    ("doz", "doz"),
    ("dozen", "doz"),
    ("lds", "lds"),
    ("loads", "lds"),
    ("fms", "fms"),
    ("fathoms", "fms"),
    ("stds", "stds"),
    ("standards", "stds"),
    ("tons", "tons"),
    ("cases", "cases"),
    ("bales", "bales"),
    ("pkgs", "pkgs"),
    ("packages", "pkgs"),
    ("cords", "cords"),
    ("lbs", "lbs"),
];

static UNIT_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| UNIT_FORMS.iter().copied().collect());

/// Regex alternation of all unit forms, longest first
pub fn unit_alternation() -> String {
    let mut forms: Vec<&str> = UNIT_FORMS.iter().map(|(form, _)| *form).collect();
    forms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    forms.join("|")
}

/// Canonical abbreviation for a printed unit, if it is a known unit
pub fn canonical_unit(raw: &str) -> Option<&'static str> {
    let key = raw.trim().trim_end_matches('.').to_lowercase();
    UNIT_MAP.get(key.as_str()).copied()
}

pub fn is_unit_word(word: &str) -> bool {
    canonical_unit(word).is_some()
}

/// Upper-case lines that look like port headers but are journal furniture
static SKIP_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Journal headers
        "TIMBER TRADES JOURNAL",
        "TIMBER TRADES' JOURNAL",
        "ADES JOURNAL",
        "ENGLAND AND WALES",
        "SCOTLAND",
        "IRELAND",
        "SCOTCH SUPPLEMENT",
        "IMPORTS",
        "REVIEWS",
        "FREIGHTS",
        "FAILURES AND ARRANGEMENTS",
        "LIQUIDATIONS",
        "ERRATUM",
        "TRADE ITEMS",
        "CREDITOR PARTLY SECURED",
        "ACCEPTED TENDERS",
        "LONDON DOCK DELIVERIES",
        "ARRIVALS",
        // Commodity headings
        "PINE",
        "SPRUCE",
        "PITCH PINE",
        "OAK",
        "OAK TIMBER",
        "MAHOGANY",
        "ASH",
        "LATHWOOD",
        "WEATHERBOARDS",
        "SLATING BATTENS",
        "MOULDING",
        "MOULDINGS",
        "VENEERS",
        "SLAB BOARDS",
        "POLES",
        "SPARS",
        "DECK DEALS",
        "LATHS",
        "PLASTERERS' LATHS",
        "BEAD",
        "TORUS SKIRTING",
        "DEAL",
        "HEWN BALK",
        // Advertisement fragments
        "CONTRACTS OPEN",
        "TRADE MARK",
        "REGISTERED BRAND",
        "SILVER MEDAL",
        "CIRCULAR SAWS",
        "IN THE WORLD",
        // Company names
        "MAURICE GANDY",
        "JOSEPH GARDNER & SONS",
        "ROBERT PARKER & CO",
        "LAVY BROS",
        // OCR debris
        "R. M",
        "R & CO",
        "ONE",
        "EST",
        "TONE",
        "BURGH",
        "B. & F. S. WHARF",
        "B. & F. WHARF",
        "Y COMMERCIAL DOCKS",
    ]
    .into_iter()
    .collect()
});

/// Words that mark a header as editorial or advertising text wherever they occur
const BOILERPLATE_MARKERS: &[&str] = &[
    "JOURNAL",
    "SUPPLEMENT",
    "CATALOGUE",
    "APPLICATION",
    "SPECIFICATION",
    "ORDERS",
    "PATENT",
    "MEDAL",
    "EXPORTERS",
    "IN STOCK",
    "DESCRIPTION OF",
];

/// True for journal headings, commodity headings and advertisement fragments.
/// `text` is compared upper-cased with any trailing period removed.
pub fn is_boilerplate(text: &str) -> bool {
    let upper = text.trim().trim_end_matches('.').trim().to_uppercase();
    if upper.is_empty() {
        return false;
    }
    if upper.chars().filter(|c| c.is_alphabetic()).count() <= 2 {
        return true;
    }
    SKIP_HEADERS.contains(upper.as_str())
        || BOILERPLATE_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// British port cities printed as headers above their dock subdivisions
pub const UK_CITIES: &[&str] = &[
    "LONDON",
    "LIVERPOOL",
    "GLASGOW",
    "GREENOCK",
    "GRANGEMOUTH",
    "LEITH",
    "DUNDEE",
    "ABERDEEN",
    "BRISTOL",
    "CARDIFF",
    "HULL",
    "NEWCASTLE",
    "SUNDERLAND",
    "MIDDLESBROUGH",
    "HARTLEPOOL",
    "MANCHESTER",
    "GOOLE",
    "GRIMSBY",
    "SOUTHAMPTON",
    "PLYMOUTH",
    "BELFAST",
    "DUBLIN",
    "CORK",
    "BARROW",
    "PRESTON",
];

pub const DOCK_KEYWORDS: &[&str] = &["DOCK", "DOCKS", "WHARF", "WHARVES", "PIER", "QUAY", "BASIN"];

/// Dock subdivisions that only appear in the later layout
pub const LONDON_DOCKS: &[&str] = &[
    "SURREY COMMERCIAL DOCKS",
    "MILLWALL DOCKS",
    "ROYAL ALBERT DOCKS",
    "VICTORIA DOCKS",
    "TILBURY DOCKS",
    "WEST INDIA DOCKS",
    "REGENT'S CANAL DOCK",
    "SHADWELL BASIN",
];

pub fn is_uk_city(upper: &str) -> bool {
    UK_CITIES.contains(&upper)
}

pub fn is_dock_name(upper: &str) -> bool {
    upper
        .split(|c: char| !c.is_alphabetic())
        .any(|word| DOCK_KEYWORDS.contains(&word))
}

/// Month number for printed month names and abbreviations, tolerating
/// truncated OCR forms such as "Augus" or "Sept".
pub fn parse_month(raw: &str) -> Option<u32> {
    let word = raw.trim().trim_end_matches('.').to_lowercase();
    if word.len() < 3 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    const FULL: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    FULL.iter()
        .position(|full| full.starts_with(word.as_str()))
        .map(|idx| idx as u32 + 1)
}

/// Double-encoded UTF-8 sequences seen in OCR output, whole names first
const ENCODING_FIXES: &[(&str, &str)] = &[
    ("VilagarcÃ\u{ad}a de Arousa", "Vilagarcía de Arousa"),
    ("Â\u{a0}", ""),
    ("Ã¤", "ä"),
    ("Ã¶", "ö"),
    ("Ã¥", "å"),
    ("Ã¸", "ø"),
    ("Ã±", "ñ"),
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ã\u{ad}", "í"),
    ("Ã¼", "ü"),
];

/// Repairs Latin-1 misreadings of UTF-8 (e.g. "GÃ¤vle" → "Gävle")
pub fn repair_mojibake(text: &str) -> String {
    if !text.contains('Ã') && !text.contains('Â') {
        return text.to_string();
    }
    let mut fixed = text.to_string();
    for (corrupted, correct) in ENCODING_FIXES {
        if fixed.contains(corrupted) {
            fixed = fixed.replace(corrupted, correct);
        }
    }
    fixed.trim().to_string()
}

/// Fragments that are never a commodity on their own
static COMMODITY_DENYLIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "and", "the", "of", "in", "from", "for", "with", "do", "ditto", "nil", "order", "orders",
        "&c", "co", "sons", "bros", "same",
    ]
    .into_iter()
    .collect()
});

/// Short commodity names that survive a raised minimum length
const SHORT_COMMODITY_WHITELIST: &[&str] = &["oak", "ash", "elm", "fir", "yew", "box", "gum", "ek"];

pub fn is_denylisted_fragment(commodity: &str) -> bool {
    COMMODITY_DENYLIST.contains(commodity)
}

pub fn is_whitelisted_short_commodity(commodity: &str) -> bool {
    SHORT_COMMODITY_WHITELIST.contains(&commodity)
}

/// Endings showing a merchant name bled into the commodity column
pub const MERCHANT_SUFFIXES: &[&str] = &["& co", "& son", "& sons", "& bros", "and co", "& atkinson", "& sim", "& wood"];

/// Merchant column placeholders meaning "no consignee named"
const MERCHANT_PLACEHOLDERS: &[&str] = &["order", "orders", "nil", "ditto", "do"];

pub fn is_merchant_placeholder(merchant: &str) -> bool {
    let key = merchant.trim().trim_end_matches('.').trim().to_lowercase();
    MERCHANT_PLACEHOLDERS.contains(&key.as_str())
}

/// Common commodity words, used to reject merchants and suspicious ports
pub const COMMODITY_WORDS: &[&str] = &[
    "deals", "timber", "boards", "staves", "battens", "planks", "logs", "lathwood", "pitwood",
    "props", "laths", "ends", "teak", "firewood", "sleepers",
];

pub fn is_commodity_word(word: &str) -> bool {
    COMMODITY_WORDS.contains(&word.to_lowercase().as_str())
}

const ORIGIN_ALIASES: &[(&str, &str)] = &[
    ("Cronstadt", "Kronstadt"),
    ("Cronstad", "Kronstadt"),
    ("G'burg", "Gothenburg"),
    ("G'berg", "Gothenburg"),
    ("Gothenburgh", "Gothenburg"),
    ("F'stad", "Fredrikstad"),
    ("Fred'stad", "Fredrikstad"),
    ("Frederikstad", "Fredrikstad"),
    ("Frederickstad", "Fredrikstad"),
    ("Fredrikshald", "Halden"),
    ("Frederikshald", "Halden"),
    ("Frederickshald", "Halden"),
    ("Hernosand", "Harnosand"),
    ("Dantzic", "Danzig"),
    ("Dantzig", "Danzig"),
    ("Danzic", "Danzig"),
    ("Memel", "Klaipeda"),
    ("Windau", "Ventspils"),
    ("Libau", "Liepāja"),
    ("Wyburg", "Wyborg"),
    ("Drontheim", "Trondheim"),
    ("Christiania", "Kristiania"),
    ("Christ'a", "Kristiania"),
    ("Gefle", "Gävle"),
    ("St. John, N.B.", "St. John"),
    ("St. John's, N.B.", "St. John"),
    ("St. John, N. B.", "St. John"),
    ("St. Johns", "St. John"),
    ("Halifax, N.S.", "Halifax"),
    ("Charlotte Town", "Charlottetown"),
    ("Chatham, N.B.", "Chatham"),
    ("Krageroe", "Kragero"),
    ("Finklippan", "Finnklippan"),
    ("Swartvik", "Svartvik"),
    ("Swartwick", "Svartvik"),
    ("Swartwik", "Svartvik"),
    ("Westervik", "Västervik"),
    ("Westerwik", "Västervik"),
    ("Uddewalla", "Uddevalla"),
    ("Halmstadt", "Halmstad"),
    ("Jacobstad", "Jakobstad"),
    ("Carlshamn", "Karlshamn"),
    ("Calmar", "Kalmar"),
    ("Bergqvara", "Bergkvara"),
    ("Ornskjoldsvik", "Örnsköldsvik"),
    ("Ornskoldsvik", "Örnsköldsvik"),
    ("Holmstrand", "Holmestrand"),
    ("Grimstadt", "Grimstad"),
];

const DESTINATION_ALIASES: &[(&str, &str)] = &[
    ("Glasglow", "Glasgow"),
    ("Grangmouth", "Grangemouth"),
    ("Plymouh", "Plymouth"),
    ("Lonon", "London"),
];

/// Built-in historical/variant spellings for a class
pub fn builtin_aliases(class: EntityClass) -> &'static [(&'static str, &'static str)] {
    match class {
        EntityClass::OriginPort => ORIGIN_ALIASES,
        EntityClass::DestinationPort => DESTINATION_ALIASES,
        EntityClass::Commodity | EntityClass::Merchant => &[],
    }
}

const PORT_ARTIFACT_MARKERS: &[&str] = &[
    "journal", "errata", "imports", "freights", "failures", "liquidations", "trade items",
    "dividends", "bills of sale",
];

/// Heuristic hint for reviewers: the value is probably an OCR or parsing artifact
pub fn looks_like_artifact(value: &str, class: EntityClass) -> bool {
    let value = value.trim();
    if value.chars().count() <= 2 && value != "Mo" && value != "Mo." {
        return true;
    }
    if value.chars().all(|c| !c.is_alphanumeric()) || matches!(value, "and" | "or") {
        return true;
    }
    if value.chars().count() > 150 {
        return true;
    }
    if class.is_port() {
        let lower = value.to_lowercase();
        if is_commodity_word(&lower) || PORT_ARTIFACT_MARKERS.iter().any(|m| lower.contains(m)) {
            return true;
        }
        if value.chars().next().is_some_and(|c| c.is_lowercase()) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_unit_forms() {
        assert_eq!(canonical_unit("pcs."), Some("pcs"));
        assert_eq!(canonical_unit("Pieces"), Some("pcs"));
        assert_eq!(canonical_unit("BDLS"), Some("bdls"));
        assert_eq!(canonical_unit("staves"), None);
    }

    #[test]
    fn test_month_prefixes() {
        assert_eq!(parse_month("Sept."), Some(9));
        assert_eq!(parse_month("Augus"), Some(8));
        assert_eq!(parse_month("Dec"), Some(12));
        assert_eq!(parse_month("May"), Some(5));
        assert_eq!(parse_month("Ma"), None);
        assert_eq!(parse_month("Alert"), None);
    }

    #[test]
    fn test_boilerplate_headers() {
        assert!(is_boilerplate("TIMBER TRADES JOURNAL."));
        assert!(is_boilerplate("PITCH PINE."));
        assert!(is_boilerplate("ILLUSTRATED CATALOGUES FREE ON APPLICATION"));
        assert!(is_boilerplate("H."));
        assert!(!is_boilerplate("GLASGOW."));
        assert!(!is_boilerplate("SURREY COMMERCIAL DOCKS."));
    }

    #[test]
    fn test_dock_and_city_detection() {
        assert!(is_uk_city("LONDON"));
        assert!(is_dock_name("SURREY COMMERCIAL DOCKS"));
        assert!(is_dock_name("BURT'S WHARF"));
        assert!(!is_dock_name("DOCKRAY"));
    }

    #[test]
    fn test_repair_mojibake() {
        assert_eq!(repair_mojibake("GÃ¤vle"), "Gävle");
        assert_eq!(repair_mojibake("MÃ¶nsterÃ¥s"), "Mönsterås");
        assert_eq!(repair_mojibake("Riga"), "Riga");
    }

    #[test]
    fn test_artifact_hints() {
        assert!(looks_like_artifact("&", EntityClass::OriginPort));
        assert!(looks_like_artifact("deals", EntityClass::OriginPort));
        assert!(looks_like_artifact("from Halifax", EntityClass::OriginPort));
        assert!(!looks_like_artifact("Mo", EntityClass::OriginPort));
        assert!(!looks_like_artifact("Xyzport", EntityClass::OriginPort));
        assert!(!looks_like_artifact("deals", EntityClass::Commodity));
    }
}
