//! Evidentia Core - Evidence-to-standard matching and narrative pipeline
//!
//! Evidentia maps institutional evidence to accreditation standards, finds
//! the standards that lack evidence, drafts cited compliance narratives and
//! keeps a tamper-evident record of every decision along the way.
//!
//! # Architecture
//!
//! 1. **Data model** (`model`, `corpus`): evidence documents, hierarchical
//!    standards and scored matches, held in hot-swappable corpora
//! 2. **Vector matcher** (`matcher`, `embeddings`): embedding similarity with
//!    a keyword-overlap fallback, domain penalty and deterministic ranking
//! 3. **Citation generator** (`citation`): page extraction and citation strings
//! 4. **Pipeline** (`pipeline`): Mapper, GapFinder, Narrator and Verifier as
//!    an explicit state machine
//! 5. **Audit trail** (`audit`): hash-chained, append-only decision log
//!
//! # Quick Start
//!
//! ```
//! use chrono::NaiveDate;
//! use evidentia_core::model::{EvidenceDocument, EvidenceType, Standard};
//! use evidentia_core::{EvidencePipeline, PipelineConfig, RunRequest, StandardStatus};
//!
//! let pipeline = EvidencePipeline::new(PipelineConfig::default()).unwrap();
//!
//! pipeline
//!     .reload_standards(vec![Standard::builder()
//!         .code("3.3.1")
//!         .title("Institutional Effectiveness")
//!         .keyword("assessment")
//!         .build()
//!         .unwrap()])
//!     .unwrap();
//!
//! pipeline
//!     .reload_evidence(vec![EvidenceDocument::new(
//!         "ie-2023",
//!         "IE Annual Report",
//!         EvidenceType::AssessmentData,
//!         "--- Page 4 ---\ninstitutional effectiveness assessment",
//!         10,
//!         NaiveDate::from_ymd_opt(2023, 9, 15).unwrap(),
//!     )
//!     .unwrap()])
//!     .unwrap();
//!
//! let report = pipeline.run_blocking(RunRequest::new(["3.3.1"])).unwrap();
//! assert_eq!(report.status("3.3.1"), Some(StandardStatus::Done));
//!
//! let citation = &report.narratives["3.3.1"].citations[0];
//! assert_eq!(citation.text, "IE Annual Report (assessment_data, 2023-09-15, p. 4)");
//!
//! let trail = pipeline.get_audit_trail(&report.audit_chain_id, Some("3.3.1")).unwrap();
//! assert!(!trail.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod audit;
pub mod citation;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod text;
pub mod types;

// Re-export commonly used types for convenience
pub use audit::{AuditActor, AuditRecord, AuditStore, AuditTrail, ChainVerification, MemoryAuditStore, SqliteAuditStore};
pub use citation::{format_citation, format_pages, Citation};
pub use config::PipelineConfig;
pub use corpus::{CorpusRegistry, EvidenceCorpus, StandardsCorpus};
pub use embeddings::{EmbeddingCache, EmbeddingProvider};
pub use error::{EvidentiaError, Result, ResultExt};
pub use matcher::VectorMatcher;
pub use model::{Domain, EvidenceDocument, EvidenceType, ScorerKind, Standard, StandardMatch};
pub use pipeline::{
    EvidencePipeline, NarrativeProvider, PipelineContext, PipelineStage, RunReport, RunRequest,
    StandardStatus,
};
pub use types::{Blake3Hash, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
