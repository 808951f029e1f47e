use serde::{Deserialize, Serialize};

use crate::types::EntityClass;
use crate::vocabulary::looks_like_artifact;

/// One unresolved value awaiting a reviewer's decision.
///
/// `action` and `target` are left blank so the entry can be filled in and
/// appended to the decision ledger as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub class: EntityClass,
    pub value: String,
    pub frequency: u64,
    pub best_candidate: Option<String>,
    pub score: Option<f64>,
    pub suspected_artifact: bool,
    pub action: String,
    pub target: String,
}

impl ReviewEntry {
    pub fn new(class: EntityClass, value: &str, frequency: u64, best: Option<(String, f64)>) -> Self {
        let (best_candidate, score) = match best {
            Some((candidate, score)) => (Some(candidate), Some((score * 1000.0).round() / 1000.0)),
            None => (None, None),
        };
        Self {
            class,
            value: value.to_string(),
            frequency,
            best_candidate,
            score,
            suspected_artifact: looks_like_artifact(value, class),
            action: String::new(),
            target: String::new(),
        }
    }
}

/// Class, then most frequent first, then value
pub fn sort_queue(queue: &mut [ReviewEntry]) {
    queue.sort_by(|a, b| {
        a.class
            .cmp(&b.class)
            .then_with(|| b.frequency.cmp(&a.frequency))
            .then_with(|| a.value.cmp(&b.value))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_order() {
        let mut queue = vec![
            ReviewEntry::new(EntityClass::DestinationPort, "Zed", 9, None),
            ReviewEntry::new(EntityClass::OriginPort, "Bravo", 2, None),
            ReviewEntry::new(EntityClass::OriginPort, "Alpha", 2, None),
            ReviewEntry::new(EntityClass::OriginPort, "Xyzport", 7, Some(("Riga".to_string(), 0.2857))),
        ];
        sort_queue(&mut queue);

        let order: Vec<&str> = queue.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(order, vec!["Xyzport", "Alpha", "Bravo", "Zed"]);
        assert_eq!(queue[0].score, Some(0.286));
        assert!(queue[0].action.is_empty());
    }

    #[test]
    fn test_artifact_hint() {
        assert!(ReviewEntry::new(EntityClass::OriginPort, "&", 3, None).suspected_artifact);
        assert!(!ReviewEntry::new(EntityClass::OriginPort, "Xyzport", 3, None).suspected_artifact);
    }
}
