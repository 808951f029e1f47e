//! Tiered normalization of free-text entity values.
//!
//! Each distinct value is resolved once per entity class, in strict order:
//! human ledger decision, canonical exact match, curated alias, fuzzy match.
//! The resolution is then applied to every occurrence of the value.

pub mod canonical;
pub mod ledger;
pub mod review;
pub mod similarity;

pub use canonical::CanonicalSet;
pub use ledger::DecisionLedger;
pub use review::ReviewEntry;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::NormalizeConfig;
use crate::error::{PipelineError, Result};
use crate::metrics;
use crate::output::{CargoItemRow, ShipmentRow};
use crate::reference::{DecisionAction, ReferenceData};
use crate::types::EntityClass;

/// Which tier settled a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    ErrorRemoved,
    HumanMapped,
    HumanAccepted,
    Exact,
    Alias,
    AutoHigh,
    AutoMedium,
    Unmatched,
}

impl Resolution {
    pub fn all() -> [Resolution; 8] {
        [
            Resolution::ErrorRemoved,
            Resolution::HumanMapped,
            Resolution::HumanAccepted,
            Resolution::Exact,
            Resolution::Alias,
            Resolution::AutoHigh,
            Resolution::AutoMedium,
            Resolution::Unmatched,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::ErrorRemoved => "error_removed",
            Resolution::HumanMapped => "human_mapped",
            Resolution::HumanAccepted => "human_accepted",
            Resolution::Exact => "exact",
            Resolution::Alias => "alias",
            Resolution::AutoHigh => "auto_high",
            Resolution::AutoMedium => "auto_medium",
            Resolution::Unmatched => "unmatched",
        }
    }
}

/// Outcome for one distinct value
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Replacement value; `None` clears the field
    pub value: Option<String>,
    pub tier: Resolution,
    /// Similarity score for fuzzy tiers
    pub score: Option<f64>,
    /// Best fuzzy candidate for unmatched values, if above the suggestion floor
    pub best: Option<(String, f64)>,
}

impl Resolved {
    fn keep(value: &str, tier: Resolution) -> Self {
        Self {
            value: Some(value.to_string()),
            tier,
            score: None,
            best: None,
        }
    }

    fn replace(value: &str, tier: Resolution, score: Option<f64>) -> Self {
        Self {
            value: Some(value.to_string()),
            tier,
            score,
            best: None,
        }
    }
}

/// Occurrence counts per tier for one entity class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCounters {
    pub error_removed: u64,
    pub human_mapped: u64,
    pub human_accepted: u64,
    pub exact: u64,
    pub alias: u64,
    pub auto_high: u64,
    pub auto_medium: u64,
    pub unmatched: u64,
}

impl CoverageCounters {
    pub fn add(&mut self, tier: Resolution, occurrences: u64) {
        let slot = match tier {
            Resolution::ErrorRemoved => &mut self.error_removed,
            Resolution::HumanMapped => &mut self.human_mapped,
            Resolution::HumanAccepted => &mut self.human_accepted,
            Resolution::Exact => &mut self.exact,
            Resolution::Alias => &mut self.alias,
            Resolution::AutoHigh => &mut self.auto_high,
            Resolution::AutoMedium => &mut self.auto_medium,
            Resolution::Unmatched => &mut self.unmatched,
        };
        *slot += occurrences;
    }

    pub fn get(&self, tier: Resolution) -> u64 {
        match tier {
            Resolution::ErrorRemoved => self.error_removed,
            Resolution::HumanMapped => self.human_mapped,
            Resolution::HumanAccepted => self.human_accepted,
            Resolution::Exact => self.exact,
            Resolution::Alias => self.alias,
            Resolution::AutoHigh => self.auto_high,
            Resolution::AutoMedium => self.auto_medium,
            Resolution::Unmatched => self.unmatched,
        }
    }

    pub fn merge(&mut self, other: &CoverageCounters) {
        self.error_removed += other.error_removed;
        self.human_mapped += other.human_mapped;
        self.human_accepted += other.human_accepted;
        self.exact += other.exact;
        self.alias += other.alias;
        self.auto_high += other.auto_high;
        self.auto_medium += other.auto_medium;
        self.unmatched += other.unmatched;
    }

    pub fn total(&self) -> u64 {
        self.error_removed
            + self.human_mapped
            + self.human_accepted
            + self.exact
            + self.alias
            + self.auto_high
            + self.auto_medium
            + self.unmatched
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub coverage: BTreeMap<EntityClass, CoverageCounters>,
    pub review_queue: Vec<ReviewEntry>,
}

/// Canonical lookups for one entity class
struct ClassResolver {
    canonical: CanonicalSet,
    aliases: HashMap<String, String>,
    folded_aliases: HashMap<String, String>,
}

impl ClassResolver {
    fn new(class: EntityClass, canonical: CanonicalSet, aliases: BTreeMap<String, String>) -> Self {
        let mut kept = HashMap::new();
        let mut folded = HashMap::new();
        let mut dropped = 0usize;
        for (variant, target) in aliases {
            // An alias may only point at a canonical value
            if !canonical.contains(&target) {
                dropped += 1;
                continue;
            }
            folded.entry(variant.to_lowercase()).or_insert_with(|| target.clone());
            kept.insert(variant, target);
        }
        if dropped > 0 {
            debug!("Ignored {} {} aliases with non-canonical targets", dropped, class);
        }
        Self {
            canonical,
            aliases: kept,
            folded_aliases: folded,
        }
    }

    fn lookup(&self, value: &str) -> Option<Resolved> {
        if self.canonical.contains(value) {
            return Some(Resolved::keep(value, Resolution::Exact));
        }
        if let Some(spelling) = self.canonical.find_case_insensitive(value) {
            return Some(Resolved::replace(spelling, Resolution::Exact, None));
        }
        let alias = self
            .aliases
            .get(value)
            .or_else(|| self.folded_aliases.get(&value.to_lowercase()))?;
        Some(Resolved::replace(alias, Resolution::Alias, None))
    }

    /// Highest score wins; ties go to the more frequent candidate, then the
    /// lexically smaller one
    fn best_candidate(
        &self,
        value: &str,
        config: &NormalizeConfig,
        frequencies: &HashMap<String, u64>,
    ) -> Option<(String, f64)> {
        let frequency = |candidate: &str| frequencies.get(candidate).copied().unwrap_or(0);
        self.canonical
            .iter()
            .map(|candidate| (candidate, config.metric.score(value, candidate)))
            .max_by(|(a, score_a), (b, score_b)| {
                score_a
                    .total_cmp(score_b)
                    .then_with(|| frequency(a).cmp(&frequency(b)))
                    .then_with(|| b.cmp(a))
            })
            .map(|(candidate, score)| (candidate.to_string(), score))
    }
}

pub struct NormalizationEngine {
    ledger: DecisionLedger,
    resolvers: BTreeMap<EntityClass, ClassResolver>,
    config: NormalizeConfig,
}

impl NormalizationEngine {
    /// Loads canonical lists, aliases and the ledger. Fails if any MAP target
    /// is neither canonical nor accepted by the ledger.
    pub fn new(reference: &ReferenceData, config: NormalizeConfig) -> Result<Self> {
        let ledger = DecisionLedger::new(reference.decisions()?);
        let mut resolvers = BTreeMap::new();

        for class in EntityClass::all() {
            let mut canonical = CanonicalSet::new(reference.canonical_for(class));
            for decision in ledger.with_action(class, DecisionAction::Accept) {
                canonical.insert(decision.value.clone());
            }

            for decision in ledger.with_action(class, DecisionAction::Map) {
                let target = decision.target.clone().unwrap_or_default();
                if !canonical.contains(&target) {
                    return Err(PipelineError::UnknownMapTarget {
                        class,
                        value: decision.value.clone(),
                        target,
                    });
                }
            }

            if canonical.is_empty() && !ledger.has_rows(class) {
                debug!("No reference data for {}; values pass through", class);
                continue;
            }

            let resolver = ClassResolver::new(class, canonical, reference.aliases_for(class));
            debug!(
                "{}: {} canonical values, {} aliases",
                class,
                resolver.canonical.len(),
                resolver.aliases.len()
            );
            resolvers.insert(class, resolver);
        }

        info!(
            "Normalization engine ready: {} active classes, {} ledger decisions",
            resolvers.len(),
            ledger.len()
        );
        Ok(Self {
            ledger,
            resolvers,
            config,
        })
    }

    pub fn is_active(&self, class: EntityClass) -> bool {
        self.resolvers.contains_key(&class)
    }

    /// Resolve one value with no corpus frequencies for tie-breaking.
    /// Inactive classes return the value unchanged as unmatched.
    pub fn resolve(&self, class: EntityClass, value: &str) -> Resolved {
        self.resolve_with(class, value, &HashMap::new())
    }

    fn resolve_with(&self, class: EntityClass, value: &str, frequencies: &HashMap<String, u64>) -> Resolved {
        if let Some(decision) = self.ledger.lookup(class, value) {
            return match decision.action {
                DecisionAction::Error => Resolved {
                    value: None,
                    tier: Resolution::ErrorRemoved,
                    score: None,
                    best: None,
                },
                DecisionAction::Map => Resolved::replace(
                    decision.target.as_deref().unwrap_or(value),
                    Resolution::HumanMapped,
                    None,
                ),
                DecisionAction::Accept => Resolved::keep(value, Resolution::HumanAccepted),
            };
        }

        let Some(resolver) = self.resolvers.get(&class) else {
            return Resolved::keep(value, Resolution::Unmatched);
        };
        if let Some(resolved) = resolver.lookup(value) {
            return resolved;
        }

        let best = resolver.best_candidate(value, &self.config, frequencies);
        match best {
            Some((candidate, score)) if score >= self.config.high_threshold => {
                Resolved::replace(&candidate, Resolution::AutoHigh, Some(score))
            }
            Some((candidate, score)) if score >= self.config.medium_threshold => {
                Resolved::replace(&candidate, Resolution::AutoMedium, Some(score))
            }
            best => Resolved {
                value: Some(value.to_string()),
                tier: Resolution::Unmatched,
                score: None,
                best: best.filter(|(_, score)| *score >= self.config.suggestion_floor),
            },
        }
    }

    /// Normalize every entity field in place, tagging each row with the tier
    /// that settled each field. Unmatched values stay as they are and are
    /// returned in the review queue.
    pub fn normalize(
        &self,
        shipments: &mut [ShipmentRow],
        cargo_items: &mut [CargoItemRow],
        parallel: bool,
    ) -> NormalizationReport {
        let start = Instant::now();
        let mut report = NormalizationReport::default();

        for class in EntityClass::all() {
            if !self.is_active(class) {
                continue;
            }

            let frequencies = value_frequencies(class, shipments, cargo_items);
            let mut distinct: Vec<(&String, &u64)> = frequencies.iter().collect();
            distinct.sort();

            let resolve = |(value, _): &(&String, &u64)| {
                ((*value).clone(), self.resolve_with(class, value, &frequencies))
            };
            let resolved: HashMap<String, Resolved> = if parallel {
                distinct.par_iter().map(resolve).collect()
            } else {
                distinct.iter().map(resolve).collect()
            };

            let mut counters = CoverageCounters::default();
            let mut queued = 0usize;
            for (value, occurrences) in &distinct {
                let Some(outcome) = resolved.get(*value) else {
                    continue;
                };
                counters.add(outcome.tier, **occurrences);
                if outcome.tier == Resolution::Unmatched {
                    report.review_queue.push(ReviewEntry::new(
                        class,
                        value,
                        **occurrences,
                        outcome.best.clone(),
                    ));
                    queued += 1;
                }
            }

            apply_resolutions(class, &resolved, shipments, cargo_items);

            for tier in Resolution::all() {
                metrics::normalize::resolved(class, tier.as_str(), counters.get(tier));
            }
            metrics::normalize::review_queued(class, queued);

            info!(
                "Normalized {}: {} distinct values, {} occurrences, {} unmatched",
                class,
                distinct.len(),
                counters.total(),
                counters.unmatched
            );
            report.coverage.insert(class, counters);
        }

        review::sort_queue(&mut report.review_queue);
        metrics::normalize::duration(start.elapsed().as_secs_f64());
        report
    }
}

/// Occurrences of each non-empty value of one class across both tables.
/// A merchant an item inherited from its shipment is counted once, on the shipment.
fn value_frequencies(
    class: EntityClass,
    shipments: &[ShipmentRow],
    cargo_items: &[CargoItemRow],
) -> HashMap<String, u64> {
    let mut frequencies: HashMap<String, u64> = HashMap::new();
    let mut count = |value: &Option<String>| {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            *frequencies.entry(value.to_string()).or_insert(0) += 1;
        }
    };

    match class {
        EntityClass::OriginPort => shipments.iter().for_each(|s| count(&s.origin_port)),
        EntityClass::DestinationPort => shipments.iter().for_each(|s| count(&s.destination_port)),
        EntityClass::Commodity => cargo_items.iter().for_each(|c| count(&c.commodity)),
        EntityClass::Merchant => {
            shipments.iter().for_each(|s| count(&s.merchant));
            cargo_items
                .iter()
                .filter(|c| !c.merchant_inherited)
                .for_each(|c| count(&c.merchant));
        }
    }
    frequencies
}

fn apply_resolutions(
    class: EntityClass,
    resolved: &HashMap<String, Resolved>,
    shipments: &mut [ShipmentRow],
    cargo_items: &mut [CargoItemRow],
) {
    let apply = |field: &mut Option<String>, tags: &mut BTreeMap<EntityClass, Resolution>| {
        let Some(outcome) = field.as_deref().and_then(|v| resolved.get(v)) else {
            return;
        };
        *field = outcome.value.clone();
        tags.insert(class, outcome.tier);
    };

    match class {
        EntityClass::OriginPort => shipments
            .iter_mut()
            .for_each(|s| apply(&mut s.origin_port, &mut s.normalization)),
        EntityClass::DestinationPort => shipments
            .iter_mut()
            .for_each(|s| apply(&mut s.destination_port, &mut s.normalization)),
        EntityClass::Commodity => cargo_items
            .iter_mut()
            .for_each(|c| apply(&mut c.commodity, &mut c.normalization)),
        EntityClass::Merchant => {
            shipments
                .iter_mut()
                .for_each(|s| apply(&mut s.merchant, &mut s.normalization));
            cargo_items
                .iter_mut()
                .for_each(|c| apply(&mut c.merchant, &mut c.normalization));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(reference: &ReferenceData) -> NormalizationEngine {
        NormalizationEngine::new(reference, NormalizeConfig::default()).unwrap()
    }

    #[test]
    fn test_fuzzy_tiers() {
        let mut reference = ReferenceData::default();
        reference.add_canonical(EntityClass::OriginPort, "Fredrikstad");
        let engine = engine(&reference);

        let high = engine.resolve(EntityClass::OriginPort, "Fredrikstadt");
        assert_eq!(high.tier, Resolution::AutoHigh);
        assert_eq!(high.value.as_deref(), Some("Fredrikstad"));

        let none = engine.resolve(EntityClass::OriginPort, "Xyzport");
        assert_eq!(none.tier, Resolution::Unmatched);
        assert_eq!(none.value.as_deref(), Some("Xyzport"));
        assert!(none.best.is_none());
    }

    #[test]
    fn test_medium_band() {
        let mut reference = ReferenceData::default();
        reference.add_canonical(EntityClass::OriginPort, "Gothenburg");
        let engine = engine(&reference);

        // 2 * 9 / 21 matched characters
        let medium = engine.resolve(EntityClass::OriginPort, "Gothenbrugh");
        let score = medium.score.unwrap_or(0.0);
        assert!(score < 0.90 && score >= 0.85, "score was {}", score);
        assert_eq!(medium.tier, Resolution::AutoMedium);
    }

    #[test]
    fn test_exact_case_insensitive_and_alias() {
        let mut reference = ReferenceData::default();
        reference.add_canonical(EntityClass::OriginPort, "Kronstadt");
        reference.add_canonical(EntityClass::OriginPort, "Riga");
        reference.add_alias(EntityClass::OriginPort, "Rîga", "Riga");
        reference.add_alias(EntityClass::OriginPort, "Libau", "Liepaja");
        let engine = engine(&reference);

        assert_eq!(engine.resolve(EntityClass::OriginPort, "Riga").tier, Resolution::Exact);
        assert_eq!(engine.resolve(EntityClass::OriginPort, "Rîga").tier, Resolution::Alias);
        // Aliases pointing outside the canonical list are ignored
        assert_eq!(engine.resolve(EntityClass::OriginPort, "Libau").tier, Resolution::Unmatched);
        let folded = engine.resolve(EntityClass::OriginPort, "RIGA");
        assert_eq!(folded.tier, Resolution::Exact);
        assert_eq!(folded.value.as_deref(), Some("Riga"));

        let alias = engine.resolve(EntityClass::OriginPort, "Cronstadt");
        assert_eq!(alias.tier, Resolution::Alias);
        assert_eq!(alias.value.as_deref(), Some("Kronstadt"));
    }

    #[test]
    fn test_ledger_runs_first() {
        let mut reference = ReferenceData::default();
        reference.add_canonical(EntityClass::OriginPort, "Riga");
        reference.add_decision(EntityClass::OriginPort, "Oresund", DecisionAction::Accept, None);
        reference.add_decision(EntityClass::OriginPort, "Rigga", DecisionAction::Map, Some("Riga"));
        reference.add_decision(EntityClass::OriginPort, "Riga", DecisionAction::Error, None);
        let engine = engine(&reference);

        let accepted = engine.resolve(EntityClass::OriginPort, "Oresund");
        assert_eq!(accepted.tier, Resolution::HumanAccepted);
        assert_eq!(accepted.value.as_deref(), Some("Oresund"));

        // Accepted values are canonical for every other spelling
        let folded = engine.resolve(EntityClass::OriginPort, "ORESUND");
        assert_eq!(folded.tier, Resolution::Exact);
        assert_eq!(folded.value.as_deref(), Some("Oresund"));

        let mapped = engine.resolve(EntityClass::OriginPort, "Rigga");
        assert_eq!(mapped.tier, Resolution::HumanMapped);
        assert_eq!(mapped.value.as_deref(), Some("Riga"));

        let removed = engine.resolve(EntityClass::OriginPort, "Riga");
        assert_eq!(removed.tier, Resolution::ErrorRemoved);
        assert!(removed.value.is_none());
    }

    #[test]
    fn test_map_to_unknown_target_is_fatal() {
        let mut reference = ReferenceData::default();
        reference.add_canonical(EntityClass::DestinationPort, "Hull");
        reference.add_decision(EntityClass::DestinationPort, "Hul", DecisionAction::Map, Some("Hulle"));
        assert!(matches!(
            NormalizationEngine::new(&reference, NormalizeConfig::default()),
            Err(PipelineError::UnknownMapTarget { .. })
        ));
    }

    #[test]
    fn test_map_to_accepted_value_is_allowed() {
        let mut reference = ReferenceData::default();
        reference.add_decision(EntityClass::OriginPort, "Oresund", DecisionAction::Accept, None);
        reference.add_decision(EntityClass::OriginPort, "Öresund", DecisionAction::Map, Some("Oresund"));
        assert!(NormalizationEngine::new(&reference, NormalizeConfig::default()).is_ok());
    }

    #[test]
    fn test_tie_break_prefers_frequent_then_lexical() {
        let mut reference = ReferenceData::default();
        reference.add_canonical(EntityClass::OriginPort, "Abcx");
        reference.add_canonical(EntityClass::OriginPort, "Abcy");
        let engine = engine(&reference);
        let resolver = &engine.resolvers[&EntityClass::OriginPort];
        let config = NormalizeConfig::default();

        let lexical = resolver.best_candidate("Abcz", &config, &HashMap::new());
        assert_eq!(lexical.map(|(c, _)| c), Some("Abcx".to_string()));

        let frequencies = HashMap::from([("Abcy".to_string(), 3u64)]);
        let frequent = resolver.best_candidate("Abcz", &config, &frequencies);
        assert_eq!(frequent.map(|(c, _)| c), Some("Abcy".to_string()));
    }

    #[test]
    fn test_inactive_class_passes_through() {
        let engine = engine(&ReferenceData::default());
        assert!(!engine.is_active(EntityClass::Merchant));

        let mut shipments: Vec<ShipmentRow> = Vec::new();
        let mut cargo: Vec<CargoItemRow> = Vec::new();
        let report = engine.normalize(&mut shipments, &mut cargo, false);
        assert!(report.coverage.is_empty());
        assert!(report.review_queue.is_empty());
    }

    #[test]
    fn test_coverage_counters() {
        let mut counters = CoverageCounters::default();
        counters.add(Resolution::AutoHigh, 3);
        counters.add(Resolution::Unmatched, 2);
        let mut other = CoverageCounters::default();
        other.add(Resolution::AutoHigh, 1);
        counters.merge(&other);

        assert_eq!(counters.auto_high, 4);
        assert_eq!(counters.total(), 6);
        assert_eq!(counters.get(Resolution::Unmatched), 2);
        assert_eq!(counters.get(Resolution::Exact), 0);
    }
}
