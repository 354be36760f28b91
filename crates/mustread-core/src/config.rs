//! Analysis configuration.
//!
//! Loaded once from TOML and passed explicitly into role constructors and
//! the coordinator; nothing here is process-global. Every field has a
//! default, so an empty file is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictPolicy;
use crate::error::ConfigError;

/// Research areas papers are classified into by default.
pub const DEFAULT_CATEGORIES: [&str; 5] = [
    "LLM Optimization & Efficiency",
    "Multimodal AI Systems",
    "AI Safety & Alignment",
    "Reinforcement Learning Methods",
    "Generative AI Applications",
];

/// Settings for the OpenAI-compatible chat backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.2,
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey {
                var: self.api_key_env.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Papers analysed concurrently. `1` is strictly sequential.
    pub max_concurrent: usize,
    /// Upper bound on the role phase of a single paper.
    pub item_timeout_secs: Option<u64>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            item_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Categories the classifier chooses from ("Other" is always allowed).
    pub categories: Vec<String>,
    pub llm: LlmSettings,
    pub coordinator: CoordinatorSettings,
    pub conflict: ConflictPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            llm: LlmSettings::default(),
            coordinator: CoordinatorSettings::default(),
            conflict: ConflictPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.coordinator.item_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "coordinator.item_timeout_secs must be positive when set".to_string(),
            ));
        }

        let policy = &self.conflict;
        for (name, range) in [
            ("score_range", policy.score_range),
            ("confidence_range", policy.confidence_range),
        ] {
            if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
                return Err(ConfigError::Invalid(format!(
                    "conflict.{name} {range} is not a valid range"
                )));
            }
        }
        for (name, threshold) in [
            ("high_score_threshold", policy.high_score_threshold),
            ("low_score_threshold", policy.low_score_threshold),
        ] {
            if !policy.score_range.contains(threshold) {
                return Err(ConfigError::Invalid(format!(
                    "conflict.{name} {threshold} lies outside score_range {}",
                    policy.score_range
                )));
            }
        }
        if policy.low_score_threshold >= policy.high_score_threshold {
            return Err(ConfigError::Invalid(
                "conflict.low_score_threshold must be below high_score_threshold".to_string(),
            ));
        }

        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "categories must not contain blank entries".to_string(),
            ));
        }
        Ok(())
    }
}
