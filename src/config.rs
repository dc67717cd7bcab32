//! Analysis configuration
//!
//! Optional TOML file; every field has a default, so an empty file (or none at
//! all) yields the standard behavior.

use crate::error::SessionError;
use crate::normalizer::EventNormalizer;
use crate::query::StopWords;
use crate::summary::{DistributionCaps, DEFAULT_QUERY_COUNT_CAP, DEFAULT_TOKENS_PER_QUERY_CAP};
use crate::taxonomy::{FunnelStage, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub taxonomy: TaxonomyConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

/// Session file layout and write policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Extension of session files in a corpus directory
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Pretty-print persisted JSON
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Leave existing output files untouched
    #[serde(default = "default_true")]
    pub skip_existing: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            pretty: true,
            skip_existing: true,
        }
    }
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

/// Caps of the plotted distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_query_count_cap")]
    pub query_count_cap: usize,

    #[serde(default = "default_tokens_per_query_cap")]
    pub tokens_per_query_cap: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            query_count_cap: DEFAULT_QUERY_COUNT_CAP,
            tokens_per_query_cap: DEFAULT_TOKENS_PER_QUERY_CAP,
        }
    }
}

fn default_query_count_cap() -> usize {
    DEFAULT_QUERY_COUNT_CAP
}

fn default_tokens_per_query_cap() -> usize {
    DEFAULT_TOKENS_PER_QUERY_CAP
}

/// Stage overrides for known action labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default)]
    pub overrides: BTreeMap<String, FunnelStage>,
}

/// Query rewriting options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Words dropped in addition to the English stop-word list
    #[serde(default)]
    pub extra_stop_words: Vec<String>,
}

impl AnalysisConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, SessionError> {
        let config: Self = toml::from_str(content)?;
        config.taxonomy()?;
        Ok(config)
    }

    /// The standard taxonomy with configured overrides applied
    pub fn taxonomy(&self) -> Result<Taxonomy, SessionError> {
        Taxonomy::standard().with_overrides(&self.taxonomy.overrides)
    }

    pub fn stop_words(&self) -> StopWords {
        let mut stop_words = StopWords::english();
        stop_words.extend(&self.query.extra_stop_words);
        stop_words
    }

    pub fn normalizer(&self) -> EventNormalizer {
        EventNormalizer::new(self.stop_words())
    }

    pub fn caps(&self) -> DistributionCaps {
        DistributionCaps {
            query_count: self.summary.query_count_cap,
            tokens_per_query: self.summary.tokens_per_query_cap,
        }
    }

    /// Example configuration file content
    pub fn example() -> String {
        r#"# clickflow configuration

[corpus]
# Extension of session files
extension = "json"
pretty = true
# Never overwrite existing output files
skip_existing = true

[summary]
query_count_cap = 10
tokens_per_query_cap = 20

[taxonomy.overrides]
# view_record = "Lookup"

[query]
extra_stop_words = []
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ActionLabel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.corpus.extension, "json");
        assert!(config.corpus.skip_existing);
        assert_eq!(config.caps(), DistributionCaps::default());
    }

    #[test]
    fn test_example_parses() {
        let config = AnalysisConfig::from_toml_str(&AnalysisConfig::example()).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_overrides_and_stop_words() {
        let config = AnalysisConfig::from_toml_str(
            r#"
[summary]
query_count_cap = 5

[taxonomy.overrides]
view_record = "Lookup"
goto_home = "Drop-off"

[query]
extra_stop_words = ["Journal"]
"#,
        )
        .unwrap();

        assert_eq!(config.caps().query_count, 5);
        assert_eq!(config.caps().tokens_per_query, 20);

        let taxonomy = config.taxonomy().unwrap();
        assert_eq!(taxonomy.stage(ActionLabel::ViewRecord), Some(FunnelStage::Lookup));
        assert_eq!(taxonomy.stage(ActionLabel::GotoHome), Some(FunnelStage::DropOff));

        assert!(config.stop_words().contains("journal"));
    }

    #[test]
    fn test_unknown_override_label_is_an_error() {
        let result = AnalysisConfig::from_toml_str(
            r#"
[taxonomy.overrides]
view_recrod = "Lookup"
"#,
        );
        assert!(matches!(result, Err(SessionError::UnknownActionLabel(_))));
    }

    #[test]
    fn test_invalid_stage_is_a_config_error() {
        let result = AnalysisConfig::from_toml_str(
            r#"
[taxonomy.overrides]
view_record = "Somewhere"
"#,
        );
        assert!(matches!(result, Err(SessionError::ConfigError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clickflow.toml");
        std::fs::write(&path, "[corpus]\nextension = \"ndjson\"\n").unwrap();
        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.corpus.extension, "ndjson");
    }
}
