use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the chunking engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Target embedding model; `None` uses the default budget
    pub model: Option<String>,

    /// Replace every strategy's max tokens (must not exceed the model budget)
    pub max_tokens_override: Option<usize>,

    /// Replace every strategy's overlap
    pub overlap_tokens_override: Option<usize>,

    /// Route code to the tree-sitter splitter
    pub syntax_enabled: bool,

    /// Route prose to the semantic-boundary splitter
    pub semantic_enabled: bool,

    /// Grammar assumed for code without an extension or fence hint
    pub fallback_language: String,

    /// Emit module-level code between definitions as its own chunks
    pub include_module_code: bool,

    pub metadata: MetadataConfig,

    pub quality: QualityGateConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens_override: None,
            overlap_tokens_override: None,
            syntax_enabled: true,
            semantic_enabled: true,
            fallback_language: "python".to_string(),
            include_module_code: true,
            metadata: MetadataConfig::default(),
            quality: QualityGateConfig::default(),
        }
    }
}

/// Toggles for derived lexical metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetadataConfig {
    pub sparse_features: bool,
    pub keywords: bool,
    /// Number of terms kept in sparse features
    pub top_terms: usize,
    pub max_keywords: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            sparse_features: true,
            keywords: true,
            top_terms: 20,
            max_keywords: 12,
        }
    }
}

/// Acceptance thresholds and fallback-promotion policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityGateConfig {
    /// When disabled every scored chunk is accepted
    pub enabled: bool,
    pub semantic_threshold: f32,
    pub structural_threshold: f32,
    pub retrieval_threshold: f32,
    /// Fraction of rejected chunks promoted when nothing passes
    pub fallback_ratio: f32,
    pub fallback_cap: usize,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            semantic_threshold: 0.55,
            structural_threshold: 0.60,
            retrieval_threshold: 0.50,
            fallback_ratio: 0.25,
            fallback_cap: 40,
        }
    }
}

impl EngineConfig {
    /// Smaller chunks and a stricter gate
    pub fn for_precision() -> Self {
        Self {
            quality: QualityGateConfig {
                semantic_threshold: 0.6,
                structural_threshold: 0.65,
                retrieval_threshold: 0.55,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Keep as much content as possible
    pub fn for_recall() -> Self {
        Self {
            quality: QualityGateConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Structural splitting only, no derived lexical metadata
    pub fn for_speed() -> Self {
        Self {
            semantic_enabled: false,
            metadata: MetadataConfig {
                sparse_features: false,
                keywords: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config: Self = if is_toml {
            toml::from_str(&raw)?
        } else {
            serde_json::from_str(&raw)?
        };
        config.validate().map_err(ChunkerError::InvalidConfig)?;
        Ok(config)
    }

    /// Apply `DOCPREP_MODEL`, `DOCPREP_MAX_TOKENS` and `DOCPREP_OVERLAP_TOKENS`
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(model) = std::env::var("DOCPREP_MODEL") {
            let model = model.trim();
            if !model.is_empty() {
                self.model = Some(model.to_string());
            }
        }
        if let Some(max) = env_usize("DOCPREP_MAX_TOKENS")? {
            self.max_tokens_override = Some(max);
        }
        if let Some(overlap) = env_usize("DOCPREP_OVERLAP_TOKENS")? {
            self.overlap_tokens_override = Some(overlap);
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_tokens_override == Some(0) {
            return Err("max_tokens_override must be > 0".to_string());
        }

        if let (Some(max), Some(overlap)) = (self.max_tokens_override, self.overlap_tokens_override)
        {
            if overlap >= max {
                return Err(format!(
                    "overlap_tokens_override ({overlap}) must be smaller than max_tokens_override ({max})"
                ));
            }
        }

        if self.fallback_language.trim().is_empty() {
            return Err("fallback_language must not be empty".to_string());
        }

        if self.metadata.sparse_features && self.metadata.top_terms == 0 {
            return Err("metadata.top_terms must be > 0 when sparse features are enabled".to_string());
        }

        self.quality.validate()
    }
}

impl QualityGateConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("semantic_threshold", self.semantic_threshold),
            ("structural_threshold", self.structural_threshold),
            ("retrieval_threshold", self.retrieval_threshold),
            ("fallback_ratio", self.fallback_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("quality.{name} ({value}) must be within [0, 1]"));
            }
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ChunkerError::invalid_config(format!("{key}='{raw}': {e}"))),
        _ => Ok(None),
    }
}
