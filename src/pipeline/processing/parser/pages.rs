//! Page files → document groups.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::types::{DateParts, DocumentGroup, PageText, RawPage};
use crate::vocabulary::parse_month;

static PAGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<base>.+?)_p(?P<seq>\d{3})\.txt$").expect("page suffix pattern"));

static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<year>187[4-9]|188\d|189\d)(?P<month>\d{2})(?P<day>\d{2})").expect("numeric date pattern")
});

static DESCRIPTIVE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<month>(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*)\.?\s+(?P<day>\d{1,2})\s+(?P<year>187[4-9]|188\d|189\d)",
    )
    .expect("descriptive date pattern")
});

static YEAR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"187[4-9]|188\d|189\d").expect("year pattern"));

/// Publication dates are read from page file names
pub type PublicationDate = DateParts;

impl DateParts {
    /// `18790426p.11_p001.txt`, `May 1 1875.txt`, or just a year somewhere in the name
    pub fn from_filename(name: &str) -> DateParts {
        if let Some(caps) = NUMERIC_DATE.captures(name) {
            let month: u32 = caps["month"].parse().unwrap_or(0);
            let day: u32 = caps["day"].parse().unwrap_or(0);
            if (1..=12).contains(&month) {
                return DateParts::new(
                    Some(day).filter(|d| (1..=31).contains(d)),
                    Some(month),
                    caps["year"].parse().ok(),
                );
            }
        }

        if let Some(caps) = DESCRIPTIVE_DATE.captures(name) {
            if let Some(month) = parse_month(&caps["month"][..3]) {
                return DateParts::new(
                    caps["day"].parse().ok().filter(|d| (1..=31).contains(d)),
                    Some(month),
                    caps["year"].parse().ok(),
                );
            }
        }

        DateParts::new(
            None,
            None,
            YEAR_ONLY.find(name).and_then(|m| m.as_str().parse().ok()),
        )
    }
}

/// Split a page file name into group id and page sequence.
/// Files without a `_pNNN` suffix are single-page groups with sequence 0.
pub fn page_key(file_name: &str) -> (String, u32) {
    match PAGE_SUFFIX.captures(file_name) {
        Some(caps) => (
            caps["base"].to_string(),
            caps["seq"].parse().unwrap_or(0),
        ),
        None => (
            file_name
                .strip_suffix(".txt")
                .unwrap_or(file_name)
                .to_string(),
            0,
        ),
    }
}

/// Group page files into document groups ordered by id, pages ordered by sequence
pub fn group_pages(pages: Vec<PageText>) -> Vec<DocumentGroup> {
    let mut grouped: BTreeMap<String, Vec<RawPage>> = BTreeMap::new();

    for page in pages {
        let (group_id, page_seq) = page_key(&page.file_name);
        grouped.entry(group_id.clone()).or_default().push(RawPage {
            group_id,
            page_seq,
            source_file: page.file_name,
            lines: page.text.lines().map(str::to_string).collect(),
        });
    }

    grouped
        .into_iter()
        .map(|(group_id, mut pages)| {
            pages.sort_by(|a, b| {
                a.page_seq
                    .cmp(&b.page_seq)
                    .then_with(|| a.source_file.cmp(&b.source_file))
            });
            let publication = pages
                .first()
                .map(|p| PublicationDate::from_filename(&p.source_file))
                .unwrap_or_default();
            DocumentGroup {
                group_id,
                publication,
                pages,
            }
        })
        .collect()
}

/// Read every `.txt` page file directly inside `dir`, sorted by file name.
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn read_page_dir(dir: impl AsRef<Path>) -> Result<Vec<PageText>> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let bytes = fs::read(&path)?;
        pages.push(PageText {
            file_name,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    pages.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    debug!("Read {} page files from {}", pages.len(), dir.as_ref().display());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(name: &str, text: &str) -> PageText {
        PageText {
            file_name: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_publication_date_formats() {
        assert_eq!(
            PublicationDate::from_filename("18790426p.11_p001.txt"),
            DateParts::new(Some(26), Some(4), Some(1879))
        );
        assert_eq!(
            PublicationDate::from_filename("TTJ Augus 14 1875_p002.txt"),
            DateParts::new(Some(14), Some(8), Some(1875))
        );
        assert_eq!(
            PublicationDate::from_filename("ttj_1883_scan.txt"),
            DateParts::new(None, None, Some(1883))
        );
        assert!(PublicationDate::from_filename("notes.txt").is_empty());
    }

    #[test]
    fn test_group_pages_orders_pages_and_groups() {
        let groups = group_pages(vec![
            page("18790503_p002.txt", "second"),
            page("18790426_p001.txt", "a"),
            page("18790503_p001.txt", "first"),
            page("loose sheet 1881.txt", "x\ny"),
        ]);

        let ids: Vec<&str> = groups.iter().map(|g| g.group_id.as_str()).collect();
        assert_eq!(ids, vec!["18790426", "18790503", "loose sheet 1881"]);

        let may = &groups[1];
        assert_eq!(may.pages.len(), 2);
        assert_eq!(may.pages[0].lines, vec!["first"]);
        assert_eq!(may.pages[1].page_seq, 2);
        assert_eq!(may.publication, DateParts::new(Some(3), Some(5), Some(1879)));

        let loose = &groups[2];
        assert_eq!(loose.pages[0].page_seq, 0);
        assert_eq!(loose.pages[0].lines.len(), 2);
        assert_eq!(loose.publication.year, Some(1881));
    }

    #[test]
    fn test_read_page_dir_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("18800508_p002.txt"), "HULL.\n").unwrap();
        fs::write(dir.path().join("18800508_p001.txt"), b"G\xc3\xa4vle\n\xff").unwrap();
        fs::write(dir.path().join("scan.png"), "binary").unwrap();
        fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let pages = read_page_dir(dir.path()).unwrap();
        let names: Vec<&str> = pages.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["18800508_p001.txt", "18800508_p002.txt"]);
        assert!(pages[0].text.starts_with("G\u{e4}vle"));
        assert!(pages[0].text.contains('\u{fffd}'));
    }
}
