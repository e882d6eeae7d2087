//! Error types for Evidentia Core
//!
//! This module defines all error types used throughout the matching and
//! narrative pipeline. We use `thiserror` for ergonomic error definitions
//! with automatic Display/Error implementations.
//!
//! Per-standard failures (a gap, a rejected narrative, an exhausted LLM
//! retry budget) are recorded as data on the run report. Only the errors
//! below escape a pipeline run, and only corpus-level structural problems
//! abort one.

use thiserror::Error;

/// Result type alias for Evidentia operations
pub type Result<T> = std::result::Result<T, EvidentiaError>;

/// Main error type for Evidentia operations
#[derive(Error, Debug)]
pub enum EvidentiaError {
    /// Standards or evidence corpus failed structural validation
    #[error("Corpus integrity error: {0}")]
    Corpus(#[from] CorpusError),

    /// Evidence document failed construction-time validation
    #[error("Evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    /// Embedding backend errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Narrative backend errors
    #[error("Narrative error: {0}")]
    Narrative(#[from] NarrativeError),

    /// Audit trail errors
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid pipeline stage transition
    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<EvidentiaError>,
    },
}

/// Structural problems with a standards or evidence corpus.
///
/// Any of these rejects a corpus reload entirely; the previously active
/// corpus stays in place.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorpusError {
    #[error("Cycle detected in standards tree through: {0:?}")]
    Cycle(Vec<String>),

    #[error("Duplicate standard code '{code}' for accreditor '{accreditor}'")]
    DuplicateCode { accreditor: String, code: String },

    #[error("Duplicate standard id: {0}")]
    DuplicateId(String),

    #[error("Standard {child} references unknown parent {parent}")]
    UnknownParent { child: String, parent: String },

    #[error("Duplicate evidence document id: {0}")]
    DuplicateEvidence(String),

    #[error("Evidence {document} supersedes unknown document {superseded}")]
    UnknownSupersededDocument { document: String, superseded: String },

    #[error("Standard is missing required field '{0}'")]
    MissingStandardField(&'static str),
}

/// Errors raised while constructing an evidence document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvidenceError {
    #[error("Page markers in {document} must increase monotonically: page {page} follows {previous}")]
    NonMonotonicPageMarkers {
        document: String,
        previous: u32,
        page: u32,
    },

    #[error("Page markers in {0} are 1-indexed, found page 0")]
    ZeroPageMarker(String),

    #[error("Page marker {page} in {document} exceeds page count {page_count}")]
    PageBeyondCount {
        document: String,
        page: u32,
        page_count: u32,
    },
}

/// Embedding backend errors.
///
/// `Unavailable` is the `MatchingUnavailable` condition: the matcher logs it
/// and switches to the keyword-overlap scorer.
#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    #[error("Embedding backend unavailable: {provider}: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding backend returned {actual} vectors for {expected} inputs")]
    BatchSizeMismatch { expected: usize, actual: usize },
}

/// Narrative backend errors
#[derive(Error, Debug, Clone)]
pub enum NarrativeError {
    #[error("Narrative generation failed for {standard_id} after {attempts} attempts: {reason}")]
    GenerationFailed {
        standard_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("Narrative backend request failed: {0}")]
    Backend(String),

    #[error("Narrative backend timed out after {0}s")]
    Timeout(u64),

    #[error("Narrative backend returned an empty draft")]
    EmptyDraft,
}

/// Audit trail errors
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit chain broken at sequence {sequence}: {reason}")]
    ChainBroken { sequence: u64, reason: String },

    #[error("No audit trail recorded for run {0}")]
    RunNotFound(String),

    #[error("Audit storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        AuditError::Storage(e.to_string())
    }
}

impl From<rusqlite::Error> for EvidentiaError {
    fn from(e: rusqlite::Error) -> Self {
        EvidentiaError::Audit(e.into())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("{field} must be within [0.0, 1.0], got {value}")]
    OutOfRange { field: String, value: f64 },

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl EvidentiaError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error must abort an entire run
    pub fn is_fatal(&self) -> bool {
        match self {
            EvidentiaError::Corpus(_) | EvidentiaError::Config(_) | EvidentiaError::Audit(_) => {
                true
            }
            EvidentiaError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = CorpusError::DuplicateId("std-1".to_string());
        let err = EvidentiaError::from(err);
        let err = err.context("Failed to reload standards");

        assert!(err.to_string().contains("Failed to reload standards"));
        assert!(err.to_string().contains("std-1"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(ConfigError::Zero("workers".to_string()).into());
        let result = result.context("Config validation failed");

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Config validation failed"));
    }

    #[test]
    fn corpus_errors_are_fatal_embedding_errors_are_not() {
        let corpus: EvidentiaError = CorpusError::Cycle(vec!["a".into(), "b".into()]).into();
        assert!(corpus.is_fatal());
        assert!(corpus.context("reload").is_fatal());

        let embedding: EvidentiaError = EmbeddingError::Unavailable {
            provider: "http".into(),
            reason: "connection refused".into(),
        }
        .into();
        assert!(!embedding.is_fatal());
    }
}
