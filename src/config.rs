use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::aggregate::AggregateRules;
use crate::pipeline::processing::classify::{
    default_alarm_patterns, default_category_rules, CategoryRule, ClassifyRules,
};
use crate::pipeline::processing::normalize::NormalizeRules;

/// Environment variable naming the config file used when `--config` is not given
pub const CONFIG_ENV_VAR: &str = "COMPLAINT_PIPELINE_CONFIG";

/// Pipeline configuration as written in TOML. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalize: NormalizeRules,
    pub classify: ClassifyConfig,
    pub aggregate: AggregateRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub default_category: String,
    /// Regex sources, tried in order
    pub alarm_patterns: Vec<String>,
    /// Ordered; the first category with a matching keyword wins
    pub rules: Vec<CategoryRule>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            default_category: constants::OTHER.to_string(),
            alarm_patterns: default_alarm_patterns(),
            rules: default_category_rules(),
        }
    }
}

/// Compiled rule tables handed to every pipeline stage by reference
#[derive(Debug, Clone)]
pub struct PipelineRules {
    pub normalize: NormalizeRules,
    pub classify: ClassifyRules,
    pub aggregate: AggregateRules,
}

impl Default for PipelineRules {
    fn default() -> Self {
        Self {
            normalize: NormalizeRules::default(),
            classify: ClassifyRules::default(),
            aggregate: AggregateRules::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: PipelineConfig = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Load from an explicit path, else from `COMPLAINT_PIPELINE_CONFIG`, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Validate and compile into immutable rule tables
    pub fn into_rules(self) -> Result<PipelineRules> {
        if self.normalize.separators.is_empty() {
            return Err(PipelineError::Config("normalize.separators must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.aggregate.concentration_ratio) {
            return Err(PipelineError::Config(format!(
                "aggregate.concentration_ratio must be within 0..=1, got {}",
                self.aggregate.concentration_ratio
            )));
        }

        let classify = ClassifyRules::new(
            self.classify.rules,
            self.classify.default_category,
            &self.classify.alarm_patterns,
        )?;

        Ok(PipelineRules {
            normalize: self.normalize,
            classify,
            aggregate: self.aggregate,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_section_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[aggregate]
concentration_min_count = 5

[classify]
default_category = "Unclassified"

[[classify.rules]]
category = "Battery"
keywords = ["battery", "电池"]
"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.aggregate.concentration_min_count, 5);
        assert_eq!(config.aggregate.max_case_samples, 10);
        assert_eq!(config.classify.rules.len(), 1);
        assert_eq!(config.classify.alarm_patterns, default_alarm_patterns());
        assert_eq!(config.normalize, NormalizeRules::default());

        let rules = config.into_rules().unwrap();
        assert_eq!(rules.classify.default_category, "Unclassified");
        assert_eq!(rules.classify.alarm_patterns.len(), default_alarm_patterns().len());
    }

    #[test]
    fn test_defaults_survive_toml_roundtrip() {
        let text = PipelineConfig::default().to_toml().unwrap();
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }

    #[test]
    fn test_bad_alarm_pattern_is_rejected() {
        let mut config = PipelineConfig::default();
        config.classify.alarm_patterns.push("(unclosed".to_string());
        assert!(matches!(config.into_rules(), Err(PipelineError::Regex(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::load("/nonexistent/pipeline.toml").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
