//! Pipeline configuration
//!
//! Every section carries `#[serde(default)]`, so a TOML file only needs the
//! values it changes:
//!
//! ```toml
//! [matcher]
//! similarity_threshold = 0.8
//!
//! [mapper]
//! top_k = 5
//!
//! [accreditor_overrides.HLC]
//! domain_penalty_factor = 0.1
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub matcher: MatcherConfig,
    pub mapper: MapperConfig,
    pub narrator: NarratorConfig,
    pub concurrency: ConcurrencyConfig,
    pub embedding: EmbeddingConfig,
    pub narrative: NarrativeConfig,
    /// Matcher settings replacing `matcher` for standards of one accreditor
    pub accreditor_overrides: BTreeMap<String, MatcherConfig>,
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn with_matcher(mut self, matcher: MatcherConfig) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_mapper(mut self, mapper: MapperConfig) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.concurrency.workers = workers;
        self
    }

    pub fn with_embedding_backend(mut self, backend: EmbeddingBackend) -> Self {
        self.embedding.backend = backend;
        self
    }

    pub fn with_narrative_backend(mut self, backend: NarrativeBackend) -> Self {
        self.narrative.backend = backend;
        self
    }

    pub fn with_accreditor_override(
        mut self,
        accreditor: impl Into<String>,
        matcher: MatcherConfig,
    ) -> Self {
        self.accreditor_overrides.insert(accreditor.into(), matcher);
        self
    }

    /// Matcher settings that apply to standards of `accreditor`
    pub fn matcher_for(&self, accreditor: &str) -> &MatcherConfig {
        self.accreditor_overrides
            .get(accreditor)
            .unwrap_or(&self.matcher)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.matcher.validate("matcher")?;
        for (accreditor, matcher) in &self.accreditor_overrides {
            matcher.validate(&format!("accreditor_overrides.{accreditor}"))?;
        }
        unit_range("mapper.strong_evidence_threshold", self.mapper.strong_evidence_threshold)?;
        if self.mapper.top_k == 0 {
            return Err(ConfigError::Zero("mapper.top_k".to_string()));
        }
        if self.concurrency.workers == 0 {
            return Err(ConfigError::Zero("concurrency.workers".to_string()));
        }
        if self.narrator.max_attempts == 0 {
            return Err(ConfigError::Zero("narrator.max_attempts".to_string()));
        }
        if self.narrator.timeout_secs == 0 {
            return Err(ConfigError::Zero("narrator.timeout_secs".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Zero("embedding.dimensions".to_string()));
        }
        Ok(())
    }
}

fn unit_range(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

/// Vector matcher thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum raw similarity for a candidate
    pub similarity_threshold: f64,

    /// Minimum confidence after the domain penalty
    pub min_confidence: f64,

    /// Fraction removed from similarity for out-of-domain evidence
    pub domain_penalty_factor: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            min_confidence: 0.7,
            domain_penalty_factor: 0.2,
        }
    }
}

impl MatcherConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        unit_range(&format!("{section}.similarity_threshold"), self.similarity_threshold)?;
        unit_range(&format!("{section}.min_confidence"), self.min_confidence)?;
        unit_range(&format!("{section}.domain_penalty_factor"), self.domain_penalty_factor)
    }
}

/// Mapper selection policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Matches cited per standard
    pub top_k: usize,

    /// Matches at or above this confidence are always cited, even past `top_k`
    pub strong_evidence_threshold: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            strong_evidence_threshold: 0.9,
        }
    }
}

/// Narrative call policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Total draft attempts, the first try included, before a standard's
    /// narrative is declared failed
    pub max_attempts: u32,

    /// Backoff before retry `n` is `backoff_base_ms * 2^(n-1)`
    pub backoff_base_ms: u64,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

impl NarratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before the given retry attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Concurrent per-standard tasks in the matcher and narrator stages
    pub workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Deterministic feature-hashing embedder, no network
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
    /// No embeddings; the keyword-overlap scorer is used throughout
    Disabled,
}

/// Embedding backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub dimensions: usize,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            dimensions: 384,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "EVIDENTIA_EMBEDDING_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeBackend {
    /// Deterministic template prose, no network
    Template,
    /// OpenAI-compatible `/chat/completions` endpoint
    ChatCompletion,
}

/// Narrative backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub backend: NarrativeBackend,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            backend: NarrativeBackend::Template,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "EVIDENTIA_NARRATIVE_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 1200,
        }
    }
}
