//! Vector matcher
//!
//! Scores every active evidence document against one standard and returns
//! ranked `StandardMatch` candidates. Scoring runs on embeddings when a
//! provider is configured; when the provider fails, the matcher degrades to
//! keyword overlap for the rest of the run and logs the switch. Both paths
//! feed the same thresholding, page extraction and ranking code.

pub mod chunk;
pub mod keyword;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub use chunk::{chunk_document, Chunk};

use crate::config::MatcherConfig;
use crate::embeddings::{cosine_similarity, embed_cached, EmbeddingCache, EmbeddingProvider};
use crate::error::EmbeddingError;
use crate::model::{rank_matches, EvidenceDocument, ScorerKind, Standard, StandardMatch};

/// Ranked candidates for one standard and the scorer that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub matches: Vec<StandardMatch>,
    pub scorer: ScorerKind,
}

/// Run-scoped matcher.
///
/// Holds the shared embedding cache and provider; the degraded flag is per
/// instance, so build one matcher per run.
pub struct VectorMatcher {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    cache: Arc<EmbeddingCache>,
    degraded: AtomicBool,
}

impl VectorMatcher {
    pub fn new(embedder: Option<Arc<dyn EmbeddingProvider>>, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            embedder,
            cache,
            degraded: AtomicBool::new(false),
        }
    }

    /// Matcher that always scores by keyword overlap
    pub fn keyword_only() -> Self {
        Self::new(None, Arc::new(EmbeddingCache::new()))
    }

    /// Whether the embedding path has been abandoned for this run
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Scorer the next call will use
    pub fn active_scorer(&self) -> ScorerKind {
        if self.embedder.is_some() && !self.is_degraded() {
            ScorerKind::Embedding
        } else {
            ScorerKind::KeywordOverlap
        }
    }

    /// Score `standard` against `documents` and return ranked matches.
    ///
    /// Never fails: an embedding error switches this matcher to keyword
    /// overlap and the standard is rescored.
    pub async fn match_standard(
        &self,
        standard: &Standard,
        documents: &[&EvidenceDocument],
        config: &MatcherConfig,
    ) -> MatchOutcome {
        let chunked: Vec<(&EvidenceDocument, Vec<Chunk>)> = documents
            .iter()
            .map(|doc| (*doc, chunk_document(doc)))
            .collect();
        let standard_terms = standard.match_terms();

        if let (Some(embedder), false) = (&self.embedder, self.is_degraded()) {
            match self.embedding_scores(embedder.as_ref(), standard, &chunked).await {
                Ok(scores) => {
                    let matches = assemble(standard, &standard_terms, &chunked, &scores, config);
                    return MatchOutcome {
                        matches,
                        scorer: ScorerKind::Embedding,
                    };
                }
                Err(e) => {
                    if !self.degraded.swap(true, Ordering::AcqRel) {
                        warn!(
                            provider = embedder.name(),
                            standard_id = %standard.id,
                            error = %e,
                            "embedding backend unavailable, falling back to keyword overlap"
                        );
                    }
                }
            }
        }

        let scores: Vec<Vec<f64>> = chunked
            .iter()
            .map(|(_, chunks)| keyword::score_chunks(&standard_terms, chunks))
            .collect();
        MatchOutcome {
            matches: assemble(standard, &standard_terms, &chunked, &scores, config),
            scorer: ScorerKind::KeywordOverlap,
        }
    }

    async fn embedding_scores(
        &self,
        embedder: &dyn EmbeddingProvider,
        standard: &Standard,
        chunked: &[(&EvidenceDocument, Vec<Chunk>)],
    ) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        let mut texts = vec![standard.embedding_text()];
        for (_, chunks) in chunked {
            texts.extend(chunks.iter().map(|c| c.text.clone()));
        }

        let vectors = embed_cached(embedder, &self.cache, &texts).await?;
        let (standard_vec, chunk_vecs) = vectors.split_first().ok_or(
            EmbeddingError::BatchSizeMismatch {
                expected: texts.len(),
                actual: 0,
            },
        )?;

        let mut offset = 0;
        let mut scores = Vec::with_capacity(chunked.len());
        for (_, chunks) in chunked {
            let doc_scores = chunk_vecs[offset..offset + chunks.len()]
                .iter()
                .map(|v| cosine_similarity(standard_vec, v))
                .collect();
            offset += chunks.len();
            scores.push(doc_scores);
        }
        Ok(scores)
    }
}

/// Apply thresholds and the domain penalty to per-chunk scores, then rank.
///
/// A document's similarity is its best chunk's; its pages are those of
/// every chunk clearing both thresholds.
fn assemble(
    standard: &Standard,
    standard_terms: &BTreeSet<String>,
    chunked: &[(&EvidenceDocument, Vec<Chunk>)],
    scores: &[Vec<f64>],
    config: &MatcherConfig,
) -> Vec<StandardMatch> {
    let mut matches = Vec::new();

    for ((doc, chunks), chunk_scores) in chunked.iter().zip(scores) {
        let penalized = standard
            .domain
            .map(|d| !doc.domains().contains(&d))
            .unwrap_or(false);
        let factor = if penalized {
            1.0 - config.domain_penalty_factor
        } else {
            1.0
        };

        let qualifying: Vec<(&Chunk, f64)> = chunks
            .iter()
            .zip(chunk_scores.iter().copied())
            .filter(|(_, sim)| *sim >= config.similarity_threshold && sim * factor >= config.min_confidence)
            .collect();

        let Some(best) = qualifying.iter().map(|(_, sim)| *sim).reduce(f64::max) else {
            continue;
        };

        let pages = qualifying.iter().filter_map(|(chunk, _)| chunk.page);
        let keywords = keyword::matched_terms(standard_terms, qualifying.iter().map(|(c, _)| *c));

        debug!(
            standard_id = %standard.id,
            evidence_id = %doc.id,
            similarity = best,
            penalized,
            "candidate cleared thresholds"
        );
        matches.push(StandardMatch::new(
            standard.id.clone(),
            doc.id.clone(),
            best,
            best * factor,
            pages,
            keywords,
        ));
    }

    rank_matches(&mut matches);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedTermEmbedder;
    use crate::model::{Domain, EvidenceType};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct DownProvider;

    #[async_trait]
    impl EmbeddingProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }
        fn dimensions(&self) -> usize {
            8
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Unavailable {
                provider: "down".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn standard() -> Standard {
        Standard::builder()
            .code("3.3.1")
            .title("Institutional Effectiveness")
            .keyword("assessment")
            .domain(Domain::InstitutionalEffectiveness)
            .build()
            .unwrap()
    }

    fn doc(id: &str, ty: EvidenceType, content: &str) -> EvidenceDocument {
        EvidenceDocument::new(
            id,
            id.to_uppercase(),
            ty,
            content,
            10,
            NaiveDate::from_ymd_opt(2023, 9, 15).unwrap(),
        )
        .unwrap()
    }

    fn corpus() -> Vec<EvidenceDocument> {
        vec![
            doc(
                "ie-report",
                EvidenceType::AssessmentData,
                "--- Page 3 ---\nbudget tables\n--- Page 4 ---\ninstitutional effectiveness assessment",
            ),
            doc(
                "parking",
                EvidenceType::Report,
                "Campus parking permits and shuttle schedules.",
            ),
        ]
    }

    #[tokio::test]
    async fn embedding_path_finds_marked_page() {
        let matcher = VectorMatcher::new(
            Some(Arc::new(HashedTermEmbedder::new(384))),
            Arc::new(EmbeddingCache::new()),
        );
        let docs = corpus();
        let refs: Vec<&EvidenceDocument> = docs.iter().collect();

        let outcome = matcher
            .match_standard(&standard(), &refs, &MatcherConfig::default())
            .await;

        assert_eq!(outcome.scorer, ScorerKind::Embedding);
        assert_eq!(outcome.matches.len(), 1);
        let m = &outcome.matches[0];
        assert_eq!(m.evidence_id, "ie-report");
        assert_eq!(m.page_numbers, vec![4]);
        assert!(m.confidence >= 0.7);
        assert!(m.matched_keywords.contains("assessment"));
    }

    #[tokio::test]
    async fn matchers_of_different_dimensions_share_a_cache() {
        let cache = Arc::new(EmbeddingCache::new());
        let docs = corpus();
        let refs: Vec<&EvidenceDocument> = docs.iter().collect();

        for dims in [384, 128] {
            let matcher = VectorMatcher::new(Some(Arc::new(HashedTermEmbedder::new(dims))), cache.clone());
            let outcome = matcher
                .match_standard(&standard(), &refs, &MatcherConfig::default())
                .await;
            assert_eq!(outcome.scorer, ScorerKind::Embedding);
            assert_eq!(outcome.matches.len(), 1, "{dims}-d matcher");
        }
    }

    #[tokio::test]
    async fn unavailable_backend_degrades_to_keywords() {
        let matcher = VectorMatcher::new(Some(Arc::new(DownProvider)), Arc::new(EmbeddingCache::new()));
        let docs = corpus();
        let refs: Vec<&EvidenceDocument> = docs.iter().collect();

        let outcome = matcher
            .match_standard(&standard(), &refs, &MatcherConfig::default())
            .await;

        assert!(matcher.is_degraded());
        assert_eq!(matcher.active_scorer(), ScorerKind::KeywordOverlap);
        assert_eq!(outcome.scorer, ScorerKind::KeywordOverlap);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].page_numbers, vec![4]);
        assert_eq!(outcome.matches[0].similarity_score, 1.0);
    }

    #[tokio::test]
    async fn keyword_scorer_matches_ordinary_prose() {
        let matcher = VectorMatcher::keyword_only();
        let docs = vec![doc(
            "ie-summary",
            EvidenceType::AssessmentData,
            "--- Page 2 ---\nThe institutional effectiveness office completed its annual \
             assessment cycle for every academic program.\n--- Page 3 ---\nParking permits \
             are renewed each August.",
        )];
        let refs: Vec<&EvidenceDocument> = docs.iter().collect();

        let outcome = matcher
            .match_standard(&standard(), &refs, &MatcherConfig::default())
            .await;

        assert_eq!(outcome.scorer, ScorerKind::KeywordOverlap);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].page_numbers, vec![2]);
        assert_eq!(outcome.matches[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn out_of_domain_evidence_is_penalized() {
        let matcher = VectorMatcher::keyword_only();
        let docs = vec![doc(
            "minutes",
            EvidenceType::MeetingMinutes,
            "institutional effectiveness assessment",
        )];
        let refs: Vec<&EvidenceDocument> = docs.iter().collect();

        let outcome = matcher
            .match_standard(&standard(), &refs, &MatcherConfig::default())
            .await;
        let m = &outcome.matches[0];
        assert_eq!(m.similarity_score, 1.0);
        assert!((m.confidence - 0.8).abs() < 1e-9);
        assert!(m.page_numbers.is_empty());

        let strict = MatcherConfig {
            min_confidence: 0.85,
            ..MatcherConfig::default()
        };
        let outcome = matcher.match_standard(&standard(), &refs, &strict).await;
        assert!(outcome.matches.is_empty());
    }

    #[tokio::test]
    async fn ties_rank_by_evidence_id() {
        let matcher = VectorMatcher::keyword_only();
        let docs = vec![
            doc("b-doc", EvidenceType::AssessmentData, "institutional effectiveness assessment"),
            doc("a-doc", EvidenceType::AssessmentData, "institutional effectiveness assessment"),
        ];
        let refs: Vec<&EvidenceDocument> = docs.iter().collect();

        let outcome = matcher
            .match_standard(&standard(), &refs, &MatcherConfig::default())
            .await;
        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.evidence_id.as_str()).collect();
        assert_eq!(ids, vec!["a-doc", "b-doc"]);
    }
}
