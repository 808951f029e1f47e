use std::collections::HashMap;
use tracing::warn;

use crate::reference::{DecisionAction, NormalizationDecision};
use crate::types::EntityClass;

/// Read-only overlay of human decisions, consulted before any automatic tier.
///
/// Keyed by the exact original value; the engine never writes to it.
#[derive(Debug, Clone, Default)]
pub struct DecisionLedger {
    by_class: HashMap<EntityClass, HashMap<String, NormalizationDecision>>,
}

impl DecisionLedger {
    /// Later rows for the same class and value replace earlier ones
    pub fn new(decisions: Vec<NormalizationDecision>) -> Self {
        let mut by_class: HashMap<EntityClass, HashMap<String, NormalizationDecision>> = HashMap::new();
        for decision in decisions {
            let rows = by_class.entry(decision.class).or_default();
            if let Some(previous) = rows.get(&decision.value) {
                warn!(
                    "Ledger has two decisions for {} '{}': {} replaced by {}",
                    decision.class, decision.value, previous.action, decision.action
                );
            }
            rows.insert(decision.value.clone(), decision);
        }
        Self { by_class }
    }

    pub fn lookup(&self, class: EntityClass, value: &str) -> Option<&NormalizationDecision> {
        self.by_class.get(&class)?.get(value)
    }

    pub fn has_rows(&self, class: EntityClass) -> bool {
        self.by_class.get(&class).is_some_and(|rows| !rows.is_empty())
    }

    /// Decisions of one class with the given action
    pub fn with_action(
        &self,
        class: EntityClass,
        action: DecisionAction,
    ) -> impl Iterator<Item = &NormalizationDecision> {
        self.by_class
            .get(&class)
            .into_iter()
            .flat_map(|rows| rows.values())
            .filter(move |d| d.action == action)
    }

    pub fn len(&self) -> usize {
        self.by_class.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(value: &str, action: DecisionAction) -> NormalizationDecision {
        NormalizationDecision {
            class: EntityClass::OriginPort,
            value: value.to_string(),
            frequency: None,
            action,
            target: None,
            notes: None,
        }
    }

    #[test]
    fn test_last_row_wins() {
        let ledger = DecisionLedger::new(vec![
            decision("Oresund", DecisionAction::Error),
            decision("Oresund", DecisionAction::Accept),
        ]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.lookup(EntityClass::OriginPort, "Oresund").map(|d| d.action),
            Some(DecisionAction::Accept)
        );
        assert!(ledger.lookup(EntityClass::DestinationPort, "Oresund").is_none());
        assert!(!ledger.has_rows(EntityClass::Commodity));
    }
}
