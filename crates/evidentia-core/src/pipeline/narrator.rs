//! Narrator agent
//!
//! Drafts one narrative per non-gap standard through a `NarrativeProvider`.
//! Providers write prose that refers to evidence only by `[n]` markers; the
//! narrator attaches the citation list afterwards, so citation strings never
//! enter the text itself.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::{EvidenceAssignment, Narrative};
use crate::citation::Citation;
use crate::config::{NarrativeBackend, NarrativeConfig, NarratorConfig};
use crate::corpus::EvidenceCorpus;
use crate::error::NarrativeError;
use crate::matcher::chunk_document;
use crate::model::{EvidenceDocument, Standard, StandardMatch};
use crate::text;

const EXCERPT_CHARS: usize = 800;

/// One piece of evidence offered to a narrative provider
#[derive(Debug, Clone, PartialEq)]
pub struct CitedEvidence {
    pub citation: Citation,
    pub title: String,
    pub evidence_type: String,
    pub excerpt: String,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub strong: bool,
}

/// Everything a provider may draw on for one standard
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeRequest {
    pub standard: Standard,
    pub evidence: Vec<CitedEvidence>,
}

impl NarrativeRequest {
    /// Build the request from the Mapper's assignment. Matches whose
    /// evidence is missing from the corpus are skipped.
    pub fn build(
        standard: &Standard,
        assignment: &EvidenceAssignment,
        corpus: &EvidenceCorpus,
    ) -> Self {
        let evidence = assignment
            .selected
            .iter()
            .filter_map(|m| corpus.get(&m.evidence_id).map(|doc| (m, doc)))
            .enumerate()
            .map(|(i, (m, doc))| CitedEvidence {
                citation: Citation::for_match(i + 1, m, doc),
                title: doc.title.clone(),
                evidence_type: doc.evidence_type.to_string(),
                excerpt: excerpt(doc, m),
                confidence: m.confidence,
                matched_keywords: m.matched_keywords.iter().cloned().collect(),
                strong: assignment.strong.contains(&m.evidence_id),
            })
            .collect();

        Self {
            standard: standard.clone(),
            evidence,
        }
    }
}

/// Text from the matched pages. Without pages, the paragraphs that mention
/// a matched keyword, or the start of the document when none do.
fn excerpt(doc: &EvidenceDocument, m: &StandardMatch) -> String {
    let chunks = chunk_document(doc);
    let text: Vec<&str> = if m.page_numbers.is_empty() {
        let relevant: Vec<&str> = chunks
            .iter()
            .filter(|c| !m.matched_keywords.is_disjoint(&text::terms(&c.text)))
            .map(|c| c.text.as_str())
            .collect();
        if relevant.is_empty() {
            chunks.iter().map(|c| c.text.as_str()).collect()
        } else {
            relevant
        }
    } else {
        chunks
            .iter()
            .filter(|c| c.page.map(|p| m.page_numbers.contains(&p)).unwrap_or(false))
            .map(|c| c.text.as_str())
            .collect()
    };
    text.join("\n").chars().take(EXCERPT_CHARS).collect()
}

/// Narrative generation backend
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Draft narrative text for `request`, citing evidence by `[n]` marker
    async fn draft(&self, request: &NarrativeRequest) -> Result<String, NarrativeError>;
}

/// Build the provider selected by configuration
pub fn build_provider(config: &NarrativeConfig) -> Arc<dyn NarrativeProvider> {
    match config.backend {
        NarrativeBackend::Template => Arc::new(TemplateNarrator),
        NarrativeBackend::ChatCompletion => {
            let api_key = std::env::var(&config.api_key_env).ok();
            if api_key.is_none() {
                warn!(
                    env = %config.api_key_env,
                    "narrative API key not set, requests will be unauthenticated"
                );
            }
            info!(base_url = %config.base_url, model = %config.model, "using chat completion narratives");
            Arc::new(
                super::chat::ChatCompletionNarrator::new(&config.base_url, &config.model, api_key)
                    .with_temperature(config.temperature)
                    .with_max_tokens(config.max_tokens),
            )
        }
    }
}

/// Deterministic, offline narrative writer
#[derive(Debug, Clone, Default)]
pub struct TemplateNarrator;

#[async_trait]
impl NarrativeProvider for TemplateNarrator {
    fn name(&self) -> &str {
        "template"
    }

    async fn draft(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        if request.evidence.is_empty() {
            return Err(NarrativeError::EmptyDraft);
        }

        let standard = &request.standard;
        let mut text = format!(
            "The institution addresses {} through {} evidence item{}.",
            standard.label(),
            request.evidence.len(),
            if request.evidence.len() == 1 { "" } else { "s" }
        );

        for item in &request.evidence {
            let subject = item.evidence_type.replace('_', " ");
            let topic = if item.matched_keywords.is_empty() {
                "the requirements of this standard".to_string()
            } else {
                item.matched_keywords.join(", ")
            };
            text.push_str(&format!(
                " The {subject} documents {topic} {}.",
                item.citation.marker_label()
            ));
            if item.strong {
                text.push_str(&format!(
                    " It is among the strongest evidence for this standard {}.",
                    item.citation.marker_label()
                ));
            }
        }

        Ok(text)
    }
}

/// Retrying, time-bounded front for a provider
pub struct Narrator {
    provider: Arc<dyn NarrativeProvider>,
    config: NarratorConfig,
}

impl Narrator {
    pub fn new(provider: Arc<dyn NarrativeProvider>, config: NarratorConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Draft with timeout and bounded exponential backoff
    pub async fn draft_with_retry(
        &self,
        request: &NarrativeRequest,
    ) -> Result<String, NarrativeError> {
        let standard_id = &request.standard.id;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result =
                match tokio::time::timeout(self.config.timeout(), self.provider.draft(request))
                    .await
                {
                    Ok(Ok(text)) if text.trim().is_empty() => Err(NarrativeError::EmptyDraft),
                    Ok(result) => result,
                    Err(_) => Err(NarrativeError::Timeout(self.config.timeout_secs)),
                };

            let error = match result {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if attempts >= max_attempts {
                return Err(NarrativeError::GenerationFailed {
                    standard_id: standard_id.clone(),
                    attempts,
                    reason: error.to_string(),
                });
            }

            let backoff = self.config.backoff(attempts);
            warn!(
                standard_id = %standard_id,
                provider = self.provider.name(),
                attempt = attempts,
                max_attempts,
                ?backoff,
                error = %error,
                "narrative draft failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// Draft the narrative and attach citations for every marker used
    pub async fn narrate(&self, request: &NarrativeRequest) -> Result<Narrative, NarrativeError> {
        let text = self.draft_with_retry(request).await?;
        let citations: Vec<Citation> = request
            .evidence
            .iter()
            .filter(|e| text.contains(&e.citation.marker_label()))
            .map(|e| e.citation.clone())
            .collect();

        debug!(
            standard_id = %request.standard.id,
            citations = citations.len(),
            "narrative drafted"
        );
        Ok(Narrative {
            text,
            citations,
            insufficient_evidence: false,
        })
    }
}
