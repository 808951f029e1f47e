use std::collections::{HashMap, HashSet};

/// Authoritative values for one entity class.
///
/// Grows only through ledger ACCEPT rows; fuzzy matches never add to it.
#[derive(Debug, Clone, Default)]
pub struct CanonicalSet {
    entries: Vec<String>,
    exact: HashSet<String>,
    folded: HashMap<String, String>,
}

impl CanonicalSet {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for value in values {
            set.insert(value);
        }
        set
    }

    /// Adds a value; returns false if it was already present
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.is_empty() || self.exact.contains(&value) {
            return false;
        }
        // The first spelling wins for case-insensitive lookups
        self.folded.entry(value.to_lowercase()).or_insert_with(|| value.clone());
        self.exact.insert(value.clone());
        self.entries.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.exact.contains(value)
    }

    /// Canonical spelling of a value that differs only in case
    pub fn find_case_insensitive(&self, value: &str) -> Option<&str> {
        self.folded.get(&value.to_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let mut set = CanonicalSet::new(["Riga", "Fredrikstad"]);
        assert!(set.contains("Riga"));
        assert!(!set.contains("RIGA"));
        assert_eq!(set.find_case_insensitive("RIGA"), Some("Riga"));
        assert!(!set.insert("Riga"));
        assert!(set.insert("Oresund"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["Riga", "Fredrikstad", "Oresund"]);
    }
}
