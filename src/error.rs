use thiserror::Error;

use crate::types::EntityClass;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A MAP decision points at a value that is not canonical for its class.
    /// The run must stop until the ledger or the canonical list is corrected.
    #[error("MAP target '{target}' for {class} value '{value}' is not in the canonical list")]
    UnknownMapTarget {
        class: EntityClass,
        value: String,
        target: String,
    },

    #[error("MAP decision for {class} value '{value}' has no target")]
    MissingMapTarget { class: EntityClass, value: String },

    #[error("Unknown decision action '{action}' for {class} value '{value}'")]
    InvalidDecision {
        class: EntityClass,
        value: String,
        action: String,
    },

    #[error("Unknown entity class: {0}")]
    UnknownEntityClass(String),

    #[error("Unknown decision action: {0}")]
    UnknownDecisionAction(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
