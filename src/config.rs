use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Top-level run configuration. Every section is optional in the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserConfig,
    pub cargo: CargoConfig,
    pub dedup: DedupConfig,
    pub normalize: NormalizeConfig,
    pub run: RunConfig,
}

/// Confidence bookkeeping for the context-carrying parser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Deducted when the destination port comes from a header rather than the line
    pub inherited_destination_penalty: f64,
    /// Deducted when no destination port is known at all
    pub missing_destination_penalty: f64,
    /// Deducted when day or month comes from a date header or an earlier line
    pub inherited_date_penalty: f64,
    /// Deducted when the arrival date falls back to the publication date
    pub publication_date_penalty: f64,
    /// Deducted when the arrival parts do not form a calendar date
    pub invalid_date_penalty: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            inherited_destination_penalty: 0.1,
            missing_destination_penalty: 0.3,
            inherited_date_penalty: 0.1,
            publication_date_penalty: 0.2,
            invalid_date_penalty: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CargoConfig {
    /// Commodities shorter than this are rejected unless whitelisted
    pub min_commodity_len: usize,
    pub max_commodity_len: usize,
}

impl Default for CargoConfig {
    fn default() -> Self {
        Self {
            min_commodity_len: 3,
            max_commodity_len: 40,
        }
    }
}

/// Tunables separating OCR repetition blocks from genuine repeat voyages.
///
/// Occurrences of one signature inside one source file are chained into a
/// block while consecutive line numbers are at most `max_line_gap` apart, so
/// a loop cycling through up to `max_line_gap` distinct lines still chains.
/// A block with at least `min_block_repeats` members is a hallucination.
/// The occurrences a file keeps are flagged for inspection when there are at
/// least `flag_min_repeats` of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub min_block_repeats: usize,
    pub max_line_gap: usize,
    pub flag_min_repeats: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_block_repeats: 10,
            max_line_gap: 8,
            flag_min_repeats: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    SequenceRatio,
    Levenshtein,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Fuzzy score at or above which a value is auto-normalized with high confidence
    pub high_threshold: f64,
    /// Lower bound of the medium-confidence band
    pub medium_threshold: f64,
    /// Best candidates scoring below this are not suggested in the review queue
    pub suggestion_floor: f64,
    pub metric: SimilarityMetric,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.90,
            medium_threshold: 0.85,
            suggestion_floor: 0.6,
            metric: SimilarityMetric::SequenceRatio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Use rayon for the per-group and per-record stages
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, then the file named by `TTJ_CONFIG` (default `config.toml`).
    /// A missing file yields the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = std::env::var("TTJ_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        if Path::new(&path).exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let n = &self.normalize;
        if !(0.0..=1.0).contains(&n.high_threshold) || !(0.0..=1.0).contains(&n.medium_threshold) {
            return Err(PipelineError::Config(
                "normalize thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if n.medium_threshold > n.high_threshold {
            return Err(PipelineError::Config(format!(
                "medium_threshold {:.2} exceeds high_threshold {:.2}",
                n.medium_threshold, n.high_threshold
            )));
        }
        if self.dedup.min_block_repeats < 2 {
            return Err(PipelineError::Config(
                "dedup.min_block_repeats must be at least 2".to_string(),
            ));
        }
        if self.dedup.max_line_gap == 0 {
            return Err(PipelineError::Config(
                "dedup.max_line_gap must be at least 1".to_string(),
            ));
        }
        if self.dedup.flag_min_repeats < 2 {
            return Err(PipelineError::Config(
                "dedup.flag_min_repeats must be at least 2".to_string(),
            ));
        }
        if self.cargo.min_commodity_len > self.cargo.max_commodity_len {
            return Err(PipelineError::Config(
                "cargo.min_commodity_len exceeds cargo.max_commodity_len".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [normalize]
            high_threshold = 0.95

            [dedup]
            min_block_repeats = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.normalize.high_threshold, 0.95);
        assert_eq!(config.normalize.medium_threshold, 0.85);
        assert_eq!(config.dedup.min_block_repeats, 20);
        assert_eq!(config.dedup.max_line_gap, 8);
        assert!(config.run.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let mut config = Config::default();
        config.normalize.medium_threshold = 0.95;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_metric_names_in_toml() {
        let config: Config = toml::from_str("[normalize]\nmetric = \"levenshtein\"\n").unwrap();
        assert_eq!(config.normalize.metric, SimilarityMetric::Levenshtein);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\nparallel = false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.run.parallel);
    }
}
