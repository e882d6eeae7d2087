//! Pipeline orchestrator
//!
//! `EvidencePipeline` owns the corpus registry, providers, embedding cache
//! and audit store; every `run` works on its own context and audit trail,
//! so independent runs can proceed concurrently.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::{ContextDelta, Narrative, PipelineContext};
use super::gap_finder::GapFinder;
use super::mapper::Mapper;
use super::narrator::{self, NarrativeProvider, NarrativeRequest, Narrator};
use super::report::RunReport;
use super::verifier::Verifier;
use super::{PipelineStage, StandardStatus};
use crate::audit::{AuditActor, AuditRecord, AuditStore, AuditTrail, ChainVerification, MemoryAuditStore};
use crate::config::PipelineConfig;
use crate::corpus::{CorpusRegistry, EvidenceCorpus};
use crate::embeddings::{self, EmbeddingCache, EmbeddingProvider};
use crate::error::{AuditError, EvidentiaError, Result};
use crate::matcher::{MatchOutcome, VectorMatcher};
use crate::model::{EvidenceDocument, ScorerKind, Standard};

/// Parameters of one run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Standard ids to process, in order
    pub standards_scope: Vec<String>,
    /// Also process every descendant of the scoped standards
    pub include_descendants: bool,
    /// Evidence to match against instead of the registry's active corpus
    pub evidence: Option<Arc<EvidenceCorpus>>,
    /// Configuration replacing the pipeline's own for this run
    pub config: Option<PipelineConfig>,
    pub cancellation: Option<CancellationToken>,
}

impl RunRequest {
    pub fn new<I, S>(scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            standards_scope: scope.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_descendants(mut self) -> Self {
        self.include_descendants = true;
        self
    }

    pub fn with_evidence(mut self, evidence: Arc<EvidenceCorpus>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Mutable bookkeeping for one run
struct RunState {
    stage: PipelineStage,
    trail: AuditTrail,
    statuses: BTreeMap<String, StandardStatus>,
    reasons: BTreeMap<String, Vec<String>>,
}

impl RunState {
    fn new(run_id: &str) -> Self {
        Self {
            stage: PipelineStage::Matching,
            trail: AuditTrail::new(run_id),
            statuses: BTreeMap::new(),
            reasons: BTreeMap::new(),
        }
    }

    fn set_status(&mut self, standard_id: &str, status: StandardStatus, reason: Option<String>) {
        self.statuses.insert(standard_id.to_string(), status);
        if let Some(reason) = reason {
            self.reasons
                .entry(standard_id.to_string())
                .or_default()
                .push(reason);
        }
    }

    fn record(
        &mut self,
        actor: AuditActor,
        action: impl Into<String>,
        input_refs: Vec<String>,
        output_refs: Vec<String>,
    ) {
        self.trail.append(actor, action, input_refs, output_refs);
    }

    /// Move to `next`, writing the transition record
    fn advance(
        &mut self,
        next: PipelineStage,
        input_refs: Vec<String>,
        output_refs: Vec<String>,
    ) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(EvidentiaError::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        let actor = self.stage.actor();
        let action = format!("stage {} -> {}", self.stage, next);
        info!(run_id = self.trail.run_id(), from = %self.stage, to = %next, "pipeline stage transition");
        self.record(actor, action, input_refs, output_refs);
        self.stage = next;
        Ok(())
    }

    /// Standards still in play: attempted and not yet settled as gap,
    /// failure or not-attempted.
    fn pending<'a>(&self, ids: &'a [String]) -> Vec<&'a String> {
        ids.iter().filter(|id| !self.statuses.contains_key(*id)).collect()
    }
}

pub struct EvidencePipeline {
    registry: CorpusRegistry,
    config: PipelineConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    narrative_provider: Arc<dyn NarrativeProvider>,
    cache: Arc<EmbeddingCache>,
    audit_store: Arc<dyn AuditStore>,
}

impl EvidencePipeline {
    /// Build a pipeline with providers selected by `config`, an empty
    /// registry and an in-memory audit store.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: CorpusRegistry::default(),
            embedder: embeddings::build_provider(&config.embedding),
            narrative_provider: narrator::build_provider(&config.narrative),
            cache: Arc::new(EmbeddingCache::new()),
            audit_store: Arc::new(MemoryAuditStore::new()),
            config,
        })
    }

    pub fn with_registry(mut self, registry: CorpusRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_embedding_provider(mut self, provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        self.embedder = provider;
        self
    }

    pub fn with_narrative_provider(mut self, provider: Arc<dyn NarrativeProvider>) -> Self {
        self.narrative_provider = provider;
        self
    }

    pub fn with_embedding_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = store;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &CorpusRegistry {
        &self.registry
    }

    pub fn embedding_cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Hot-swap the standards corpus; takes effect for runs started later
    pub fn reload_standards(&self, standards: Vec<Standard>) -> Result<u64> {
        self.registry.reload_standards(standards)
    }

    /// Hot-swap the evidence corpus; takes effect for runs started later
    pub fn reload_evidence(&self, documents: Vec<EvidenceDocument>) -> Result<u64> {
        self.registry.reload_evidence(documents)
    }

    /// Audit records of a run, optionally restricted to one standard.
    ///
    /// # Errors
    ///
    /// `AuditError::RunNotFound` for unknown runs and
    /// `AuditError::ChainBroken` if the stored chain fails verification.
    pub fn get_audit_trail(&self, run_id: &str, standard_id: Option<&str>) -> Result<Vec<AuditRecord>> {
        let trail = self.audit_store.load(run_id)?;
        let verification = trail.verify();
        if let Some(issue) = verification.issues.first() {
            return Err(AuditError::ChainBroken {
                sequence: issue.sequence(),
                reason: issue.to_string(),
            }
            .into());
        }
        Ok(match standard_id {
            Some(id) => trail.for_standard(id),
            None => trail.into_records(),
        })
    }

    /// Recompute a stored run's hash chain
    pub fn verify_audit_trail(&self, run_id: &str) -> Result<ChainVerification> {
        Ok(self.audit_store.load(run_id)?.verify())
    }

    /// Run the pipeline on a fresh current-thread runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn run_blocking(&self, request: RunRequest) -> Result<RunReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(request))
    }

    /// Execute one run.
    ///
    /// Per-standard problems are reported as statuses; only invalid
    /// configuration or a failing audit store return `Err`.
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let config = request.config.as_ref().unwrap_or(&self.config);
        config.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let cancel = request.cancellation.clone().unwrap_or_default();
        let snapshot = self.registry.snapshot();
        let standards = snapshot.standards.clone();
        let evidence = request
            .evidence
            .clone()
            .unwrap_or_else(|| snapshot.evidence.clone());

        let scope = if request.include_descendants {
            standards.expand_scope(&request.standards_scope)
        } else {
            request.standards_scope.clone()
        };
        let mut ctx = PipelineContext::new(scope);
        let mut state = RunState::new(&run_id);

        info!(
            run_id = %run_id,
            standards = ctx.standards_scope.len(),
            generation = snapshot.generation,
            "pipeline run started"
        );

        // Unknown ids fail up front; the rest are matched.
        let mut known: Vec<&Standard> = Vec::new();
        for id in ctx.standards_scope.clone() {
            match standards.get(&id) {
                Some(standard) => known.push(standard),
                None => {
                    warn!(run_id = %run_id, standard_id = %id, "standard not found");
                    state.set_status(&id, StandardStatus::Failed, Some("standard not found".to_string()));
                    state.record(AuditActor::Matcher, "standard not found", vec![], vec![id]);
                }
            }
        }
        known.sort_by(|a, b| a.id.cmp(&b.id));

        let scope_codes: BTreeSet<String> = known.iter().map(|s| s.code.clone()).collect();
        let verifier = Verifier::new(&standards.codes(), &scope_codes);
        let workers = config.concurrency.workers.max(1);

        // Matching
        let documents = evidence.active_documents();
        let document_ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let matcher = VectorMatcher::new(self.embedder.clone(), self.cache.clone());
        let outcomes = match_all(&matcher, &known, &documents, config, &cancel, workers).await;

        let mut delta = ContextDelta::default();
        let mut scorer_used = matcher.active_scorer();
        let mut attempted: Vec<String> = Vec::new();
        for standard in &known {
            match outcomes.get(&standard.id) {
                Some(Some(outcome)) => {
                    if outcome.scorer == ScorerKind::KeywordOverlap {
                        scorer_used = ScorerKind::KeywordOverlap;
                    }
                    let mut outputs = vec![standard.id.clone()];
                    outputs.extend(outcome.matches.iter().map(|m| m.reference()));
                    state.record(
                        AuditActor::Matcher,
                        format!(
                            "matched {} candidate(s) via {}",
                            outcome.matches.len(),
                            outcome.scorer
                        ),
                        outcome.matches.iter().map(|m| m.evidence_id.clone()).collect(),
                        outputs,
                    );
                    delta
                        .candidates
                        .insert(standard.id.clone(), outcome.matches.clone());
                    attempted.push(standard.id.clone());
                }
                _ => not_attempted(&mut state, AuditActor::Matcher, &standard.id),
            }
        }
        ctx.merge(delta);
        state.advance(PipelineStage::Mapping, document_ids, attempted.clone())?;
        self.persist(&state.trail)?;

        // Mapping
        let mapper = Mapper::new(config.mapper.clone());
        let delta = mapper.run(&attempted, &ctx.candidates);
        for (id, assignment) in &delta.matches {
            let mut outputs = vec![id.clone()];
            outputs.extend(assignment.evidence_ids());
            state.record(
                AuditActor::Mapper,
                format!(
                    "selected {} evidence item(s), {} strong",
                    assignment.selected.len(),
                    assignment.strong.len()
                ),
                ctx.candidates
                    .get(id)
                    .map(|c| c.iter().map(|m| m.reference()).collect())
                    .unwrap_or_default(),
                outputs,
            );
        }
        ctx.merge(delta);
        state.advance(PipelineStage::GapAnalysis, vec![], attempted.clone())?;
        self.persist(&state.trail)?;

        // Gap analysis
        let thresholds: BTreeMap<String, (f64, String)> = known
            .iter()
            .filter(|s| attempted.contains(&s.id))
            .map(|s| {
                let min_confidence = config.matcher_for(&s.accreditor).min_confidence;
                (s.id.clone(), (min_confidence, s.label()))
            })
            .collect();
        let delta = GapFinder::new().run(&ctx.matches, &thresholds);
        for id in &attempted {
            let evidence_ids = ctx.matches.get(id).map(|a| a.evidence_ids()).unwrap_or_default();
            if delta.gaps.contains(id) {
                state.set_status(id, StandardStatus::Gap, None);
                state.record(
                    AuditActor::GapFinder,
                    "gap: insufficient evidence",
                    evidence_ids,
                    vec![id.clone()],
                );
            } else {
                state.record(
                    AuditActor::GapFinder,
                    "evidence sufficient",
                    evidence_ids,
                    vec![id.clone()],
                );
            }
        }
        ctx.merge(delta);
        let gaps: Vec<String> = ctx.gaps.iter().cloned().collect();
        state.advance(PipelineStage::Narrating, vec![], gaps)?;
        self.persist(&state.trail)?;

        // Narrating
        let pending: BTreeSet<&String> = state.pending(&attempted).into_iter().collect();
        let to_narrate: Vec<&Standard> = known
            .iter()
            .filter(|s| pending.contains(&s.id))
            .copied()
            .collect();
        let requests: Vec<NarrativeRequest> = to_narrate
            .iter()
            .map(|s| {
                let assignment = ctx.matches.get(&s.id).cloned().unwrap_or_default();
                NarrativeRequest::build(s, &assignment, &evidence)
            })
            .collect();
        let narrator = Narrator::new(self.narrative_provider.clone(), config.narrator.clone());
        let drafts = narrate_all(&narrator, &requests, &cancel, workers).await;

        let mut delta = ContextDelta::default();
        let mut drafted: BTreeSet<String> = BTreeSet::new();
        for standard in &to_narrate {
            match drafts.get(&standard.id) {
                Some(Some(Ok(narrative))) => {
                    let cited: Vec<String> = narrative
                        .citations
                        .iter()
                        .map(|c| c.evidence_id.clone())
                        .collect();
                    state.record(
                        AuditActor::Narrator,
                        format!(
                            "drafted narrative with {} citation(s) via {}",
                            narrative.citations.len(),
                            narrator.provider_name()
                        ),
                        cited.clone(),
                        std::iter::once(standard.id.clone()).chain(cited).collect(),
                    );
                    delta.narratives.insert(standard.id.clone(), narrative.clone());
                    drafted.insert(standard.id.clone());
                }
                Some(Some(Err(e))) => {
                    warn!(run_id = %run_id, standard_id = %standard.id, error = %e, "narrative generation failed");
                    state.set_status(&standard.id, StandardStatus::Failed, Some(e.to_string()));
                    state.record(
                        AuditActor::Narrator,
                        "narrative generation failed",
                        vec![],
                        vec![standard.id.clone()],
                    );
                    delta.narratives.insert(
                        standard.id.clone(),
                        Narrative::insufficient_evidence(&standard.label()),
                    );
                }
                _ => not_attempted(&mut state, AuditActor::Narrator, &standard.id),
            }
        }
        ctx.merge(delta);
        state.advance(
            PipelineStage::Verifying,
            vec![],
            drafted.iter().cloned().collect(),
        )?;
        self.persist(&state.trail)?;

        // Verifying
        let delta = verifier.run(&ctx, &drafted);
        for (id, result) in &delta.verification_results {
            if result.passed {
                state.set_status(id, StandardStatus::Done, None);
                state.record(AuditActor::Verifier, "narrative verified", vec![], vec![id.clone()]);
            } else {
                for issue in &result.issues {
                    state.set_status(id, StandardStatus::Failed, Some(issue.to_string()));
                }
                state.record(
                    AuditActor::Verifier,
                    format!("narrative rejected: {} issue(s)", result.issues.len()),
                    vec![],
                    vec![id.clone()],
                );
            }
        }
        ctx.merge(delta);

        let attempted_statuses: Vec<StandardStatus> = state
            .statuses
            .values()
            .copied()
            .filter(|s| *s != StandardStatus::NotAttempted)
            .collect();
        let terminal = if !attempted_statuses.is_empty()
            && attempted_statuses.iter().all(|s| *s == StandardStatus::Failed)
        {
            PipelineStage::Failed
        } else {
            PipelineStage::Done
        };
        state.advance(terminal, vec![], ctx.standards_scope.clone())?;
        self.persist(&state.trail)?;

        let error = cancel
            .is_cancelled()
            .then(|| "run cancelled before every standard was processed".to_string());
        info!(
            run_id = %run_id,
            stage = %terminal,
            gaps = ctx.gaps.len(),
            audit_records = state.trail.len(),
            "pipeline run finished"
        );

        let audit_head = state.trail.head_hash();
        Ok(RunReport::from_context(
            run_id,
            terminal,
            ctx,
            state.statuses,
            state.reasons,
            audit_head,
            scorer_used,
            snapshot.generation,
            error,
        ))
    }

    fn persist(&self, trail: &AuditTrail) -> Result<()> {
        self.audit_store.save(trail)?;
        debug!(run_id = trail.run_id(), records = trail.len(), "audit trail persisted");
        Ok(())
    }
}

fn not_attempted(state: &mut RunState, actor: AuditActor, standard_id: &str) {
    state.set_status(
        standard_id,
        StandardStatus::NotAttempted,
        Some("run cancelled".to_string()),
    );
    state.record(actor, "not attempted: run cancelled", vec![], vec![standard_id.to_string()]);
}

/// Match every standard on a bounded pool; `None` marks a standard skipped
/// after cancellation.
async fn match_all(
    matcher: &VectorMatcher,
    standards: &[&Standard],
    documents: &[&EvidenceDocument],
    config: &PipelineConfig,
    cancel: &CancellationToken,
    workers: usize,
) -> BTreeMap<String, Option<MatchOutcome>> {
    stream::iter(standards.iter().copied())
        .map(|standard| async move {
            if cancel.is_cancelled() {
                return (standard.id.clone(), None);
            }
            let matcher_config = config.matcher_for(&standard.accreditor);
            let outcome = matcher.match_standard(standard, documents, matcher_config).await;
            debug!(standard_id = %standard.id, candidates = outcome.matches.len(), "standard matched");
            (standard.id.clone(), Some(outcome))
        })
        .buffer_unordered(workers)
        .collect()
        .await
}

type DraftResult = Option<std::result::Result<Narrative, crate::error::NarrativeError>>;

async fn narrate_all(
    narrator: &Narrator,
    requests: &[NarrativeRequest],
    cancel: &CancellationToken,
    workers: usize,
) -> BTreeMap<String, DraftResult> {
    stream::iter(requests.iter())
        .map(|request| async move {
            if cancel.is_cancelled() {
                return (request.standard.id.clone(), None);
            }
            (request.standard.id.clone(), Some(narrator.narrate(request).await))
        })
        .buffer_unordered(workers)
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingBackend;
    use crate::model::{Domain, EvidenceType};
    use chrono::NaiveDate;

    fn pipeline() -> EvidencePipeline {
        let pipeline = EvidencePipeline::new(PipelineConfig::default()).unwrap();
        pipeline
            .reload_standards(vec![
                Standard::builder()
                    .code("3.3.1")
                    .title("Institutional Effectiveness")
                    .keyword("assessment")
                    .domain(Domain::InstitutionalEffectiveness)
                    .build()
                    .unwrap(),
                Standard::builder()
                    .code("9.9")
                    .title("Athletics Compliance")
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        pipeline
            .reload_evidence(vec![EvidenceDocument::new(
                "ie-report",
                "IE Annual Report",
                EvidenceType::AssessmentData,
                "--- Page 4 ---\ninstitutional effectiveness assessment",
                8,
                NaiveDate::from_ymd_opt(2023, 9, 15).unwrap(),
            )
            .unwrap()])
            .unwrap();
        pipeline
    }

    #[tokio::test]
    async fn statuses_cover_every_scoped_id() {
        let pipeline = pipeline();
        let report = pipeline
            .run(RunRequest::new(["3.3.1", "9.9", "missing"]))
            .await
            .unwrap();

        assert_eq!(report.stage, PipelineStage::Done);
        assert_eq!(report.status("3.3.1"), Some(StandardStatus::Done));
        assert_eq!(report.status("9.9"), Some(StandardStatus::Gap));
        assert_eq!(report.status("missing"), Some(StandardStatus::Failed));
        assert_eq!(report.reasons["missing"], vec!["standard not found".to_string()]);
        assert!(report.narratives["9.9"].insufficient_evidence);
        assert!(!report.verification_results.contains_key("9.9"));
    }

    #[tokio::test]
    async fn only_unknown_standards_fail_the_run() {
        let report = pipeline().run(RunRequest::new(["nope"])).await.unwrap();
        assert_eq!(report.stage, PipelineStage::Failed);
    }

    #[tokio::test]
    async fn cancelled_run_marks_not_attempted() {
        let token = CancellationToken::new();
        token.cancel();
        let report = pipeline()
            .run(RunRequest::new(["3.3.1", "9.9"]).with_cancellation(token))
            .await
            .unwrap();

        assert_eq!(report.stage, PipelineStage::Done);
        assert_eq!(report.counts().not_attempted, 2);
        assert!(report.error.is_some());
        assert!(report.gaps.is_empty());
    }

    /// Drafts with the template writer, then cancels the run
    struct CancelAfterDraft(CancellationToken);

    #[async_trait::async_trait]
    impl NarrativeProvider for CancelAfterDraft {
        fn name(&self) -> &str {
            "cancel-after-draft"
        }

        async fn draft(
            &self,
            request: &NarrativeRequest,
        ) -> std::result::Result<String, crate::error::NarrativeError> {
            let text = narrator::TemplateNarrator.draft(request).await;
            self.0.cancel();
            text
        }
    }

    #[tokio::test]
    async fn cancellation_during_narration_keeps_finished_standards() {
        let token = CancellationToken::new();
        let pipeline = pipeline()
            .with_narrative_provider(Arc::new(CancelAfterDraft(token.clone())));
        pipeline
            .reload_standards(vec![
                Standard::builder()
                    .code("3.3.1")
                    .title("Institutional Effectiveness")
                    .keyword("assessment")
                    .build()
                    .unwrap(),
                Standard::builder()
                    .code("3.3.2")
                    .title("Institutional Effectiveness")
                    .keyword("assessment")
                    .build()
                    .unwrap(),
                Standard::builder()
                    .code("3.3.3")
                    .title("Institutional Effectiveness")
                    .keyword("assessment")
                    .build()
                    .unwrap(),
            ])
            .unwrap();

        let config = PipelineConfig::default().with_workers(1);
        let report = pipeline
            .run(
                RunRequest::new(["3.3.1", "3.3.2", "3.3.3"])
                    .with_config(config)
                    .with_cancellation(token),
            )
            .await
            .unwrap();

        assert_eq!(report.status("3.3.1"), Some(StandardStatus::Done));
        assert_eq!(report.status("3.3.2"), Some(StandardStatus::NotAttempted));
        assert_eq!(report.status("3.3.3"), Some(StandardStatus::NotAttempted));
        let counts = report.counts();
        assert_eq!((counts.done, counts.gap, counts.failed, counts.not_attempted), (1, 0, 0, 2));
        assert!(report.gaps.is_empty());
        assert_eq!(report.stage, PipelineStage::Done);
        assert!(report.error.is_some());
        assert!(report.verification_results["3.3.1"].passed);
        assert!(!report.narratives.contains_key("3.3.2"));
    }

    #[tokio::test]
    async fn audit_trail_is_stored_and_filterable() {
        let pipeline = pipeline();
        let report = pipeline.run(RunRequest::new(["3.3.1", "9.9"])).await.unwrap();

        let all = pipeline.get_audit_trail(&report.audit_chain_id, None).unwrap();
        assert_eq!(all.last().map(|r| r.record_hash), Some(report.audit_head));
        let transitions = all.iter().filter(|r| r.action.starts_with("stage ")).count();
        assert_eq!(transitions, 5);

        let sub = pipeline
            .get_audit_trail(&report.audit_chain_id, Some("3.3.1"))
            .unwrap();
        assert!(sub.iter().all(|r| r.concerns("3.3.1")));
        assert!(sub.iter().any(|r| r.actor == AuditActor::Matcher));
        assert!(sub.iter().any(|r| r.actor == AuditActor::Verifier));
        assert!(pipeline.verify_audit_trail(&report.run_id).unwrap().valid);
    }

    #[tokio::test]
    async fn invalid_run_config_is_rejected() {
        let config = PipelineConfig::default()
            .with_workers(0)
            .with_embedding_backend(EmbeddingBackend::Disabled);
        let err = pipeline()
            .run(RunRequest::new(["3.3.1"]).with_config(config))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
