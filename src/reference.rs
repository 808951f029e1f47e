//! Reference data bundle: canonical entity lists, curated aliases and the
//! human decision ledger, loaded from one TOML file.
//!
//! ```toml
//! [canonical]
//! origin_port = ["Fredrikstad", "Riga"]
//!
//! [aliases.origin_port]
//! "F'stad" = "Fredrikstad"
//!
//! [[decisions]]
//! class = "origin"
//! value = "Oresund"
//! frequency = 12
//! action = "ACCEPT"
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::types::EntityClass;
use crate::vocabulary::builtin_aliases;

/// What a reviewer decided about one free-text value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    /// Keep the value and treat it as canonical from now on
    Accept,
    /// Replace the value with the decision's target
    Map,
    /// The value is an artifact; clear the field
    Error,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecisionAction::Accept => "ACCEPT",
            DecisionAction::Map => "MAP",
            DecisionAction::Error => "ERROR",
        })
    }
}

impl FromStr for DecisionAction {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Ok(DecisionAction::Accept),
            "MAP" => Ok(DecisionAction::Map),
            "ERROR" => Ok(DecisionAction::Error),
            _ => Err(PipelineError::UnknownDecisionAction(s.to_string())),
        }
    }
}

/// One ledger row as written by a reviewer. Rows with a blank action are
/// undecided review-queue entries and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionRow {
    pub class: String,
    pub value: String,
    pub frequency: Option<u64>,
    pub action: String,
    pub target: Option<String>,
    pub notes: Option<String>,
}

/// A validated ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationDecision {
    pub class: EntityClass,
    pub value: String,
    pub frequency: Option<u64>,
    pub action: DecisionAction,
    pub target: Option<String>,
    pub notes: Option<String>,
}

impl DecisionRow {
    /// `Ok(None)` for undecided rows
    pub fn validate(&self) -> Result<Option<NormalizationDecision>> {
        if self.action.trim().is_empty() {
            return Ok(None);
        }
        let class: EntityClass = self.class.parse()?;
        let value = self.value.trim().to_string();
        let action = self.action.parse::<DecisionAction>().map_err(|_| PipelineError::InvalidDecision {
            class,
            value: value.clone(),
            action: self.action.clone(),
        })?;

        let target = self
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if action == DecisionAction::Map && target.is_none() {
            return Err(PipelineError::MissingMapTarget { class, value });
        }

        Ok(Some(NormalizationDecision {
            class,
            value,
            frequency: self.frequency,
            action,
            target: if action == DecisionAction::Map { target } else { None },
            notes: self.notes.clone().filter(|n| !n.trim().is_empty()),
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    /// Canonical values keyed by entity class name
    pub canonical: BTreeMap<String, Vec<String>>,
    /// Curated variant → canonical tables, merged over the built-in historical aliases
    pub aliases: BTreeMap<String, BTreeMap<String, String>>,
    pub decisions: Vec<DecisionRow>,
}

impl ReferenceData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read reference data '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let reference: ReferenceData = toml::from_str(content)?;
        reference.validate()?;
        Ok(reference)
    }

    /// Class names must be known and every decided row well-formed
    pub fn validate(&self) -> Result<()> {
        for class in self.canonical.keys().chain(self.aliases.keys()) {
            class.parse::<EntityClass>()?;
        }
        self.decisions()?;
        Ok(())
    }

    pub fn canonical_for(&self, class: EntityClass) -> Vec<String> {
        self.canonical
            .iter()
            .filter(|(name, _)| name.parse::<EntityClass>().ok() == Some(class))
            .flat_map(|(_, values)| values.iter().map(|v| v.trim().to_string()))
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Built-in aliases with this bundle's entries layered on top
    pub fn aliases_for(&self, class: EntityClass) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = builtin_aliases(class)
            .iter()
            .map(|(variant, canonical)| (variant.to_string(), canonical.to_string()))
            .collect();
        for (name, table) in &self.aliases {
            if name.parse::<EntityClass>().ok() == Some(class) {
                merged.extend(table.iter().map(|(k, v)| (k.trim().to_string(), v.trim().to_string())));
            }
        }
        merged
    }

    /// Decided ledger rows, validated
    pub fn decisions(&self) -> Result<Vec<NormalizationDecision>> {
        let mut decisions = Vec::new();
        for row in &self.decisions {
            if let Some(decision) = row.validate()? {
                decisions.push(decision);
            }
        }
        Ok(decisions)
    }

    /// SHA-256 over the canonical lists, aliases and ledger. Two runs with the
    /// same fingerprint normalize identically.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // BTreeMaps serialize in key order, so the digest is stable
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(format!("{:?}", self).as_bytes()),
        }
        hex::encode(hasher.finalize())
    }

    pub fn add_canonical(&mut self, class: EntityClass, value: impl Into<String>) {
        self.canonical
            .entry(class.as_str().to_string())
            .or_default()
            .push(value.into());
    }

    pub fn add_alias(&mut self, class: EntityClass, variant: impl Into<String>, canonical: impl Into<String>) {
        self.aliases
            .entry(class.as_str().to_string())
            .or_default()
            .insert(variant.into(), canonical.into());
    }

    pub fn add_decision(
        &mut self,
        class: EntityClass,
        value: impl Into<String>,
        action: DecisionAction,
        target: Option<&str>,
    ) {
        self.decisions.push(DecisionRow {
            class: class.as_str().to_string(),
            value: value.into(),
            frequency: None,
            action: action.to_string(),
            target: target.map(str::to_string),
            notes: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [canonical]
        origin_port = ["Fredrikstad", "Riga"]
        destination = ["Grimsby"]

        [aliases.origin_port]
        "F'stad" = "Fredrikstad"

        [[decisions]]
        class = "origin"
        value = "Oresund"
        frequency = 12
        action = "accept"

        [[decisions]]
        class = "destination"
        value = "PITWOOD"
        action = "ERROR"
        notes = "commodity heading read as port"

        [[decisions]]
        class = "origin"
        value = "Xyzport"
        action = ""
    "#;

    #[test]
    fn test_load_sample_bundle() {
        let reference = ReferenceData::from_toml_str(SAMPLE).unwrap();

        assert_eq!(reference.canonical_for(EntityClass::OriginPort), vec!["Fredrikstad", "Riga"]);
        assert_eq!(reference.canonical_for(EntityClass::DestinationPort), vec!["Grimsby"]);
        assert!(reference.canonical_for(EntityClass::Merchant).is_empty());

        let decisions = reference.decisions().unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].action, DecisionAction::Accept);
        assert_eq!(decisions[1].class, EntityClass::DestinationPort);

        let aliases = reference.aliases_for(EntityClass::OriginPort);
        assert_eq!(aliases.get("F'stad").map(String::as_str), Some("Fredrikstad"));
        assert_eq!(aliases.get("Cronstadt").map(String::as_str), Some("Kronstadt"));
    }

    #[test]
    fn test_map_without_target_is_rejected() {
        let mut reference = ReferenceData::default();
        reference.add_decision(EntityClass::OriginPort, "Cronstad", DecisionAction::Map, None);
        assert!(matches!(
            reference.validate(),
            Err(PipelineError::MissingMapTarget { .. })
        ));
    }

    #[test]
    fn test_unknown_action_and_class_are_rejected() {
        let bad_action = r#"
            [[decisions]]
            class = "origin"
            value = "Riga"
            action = "KEEP"
        "#;
        assert!(matches!(
            ReferenceData::from_toml_str(bad_action),
            Err(PipelineError::InvalidDecision { .. })
        ));

        let bad_class = "[canonical]\nharbour = [\"Riga\"]\n";
        assert!(matches!(
            ReferenceData::from_toml_str(bad_class),
            Err(PipelineError::UnknownEntityClass(_))
        ));
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(" map ".parse::<DecisionAction>().unwrap(), DecisionAction::Map);
        assert_eq!("accept".parse::<DecisionAction>().unwrap(), DecisionAction::Accept);

        let err = "KEEP".parse::<DecisionAction>().unwrap_err();
        assert!(matches!(&err, PipelineError::UnknownDecisionAction(a) if a == "KEEP"));
        assert_eq!(err.to_string(), "Unknown decision action: KEEP");
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = ReferenceData::from_toml_str(SAMPLE).unwrap();
        let b = ReferenceData::from_toml_str(SAMPLE).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut c = a.clone();
        c.add_canonical(EntityClass::OriginPort, "Memel");
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
