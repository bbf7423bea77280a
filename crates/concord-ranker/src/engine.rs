//! Reconciliation engine: runs the configured stages, collates their output
//! into feature vectors, scores and ranks the candidates.

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use concord_common::{CandidateKey, CandidateRecord, ConcordError, QueryIdentity, Result};
use concord_sources::{IdentityStore, SearchIndex};
use crate::registry::{StageDeps, StageRegistry};
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::{FeatureVector, ScoredCandidate};
use crate::weights::{SumWeighting, WeightingFunction};

/// Default length of the ranked list.
pub const DEFAULT_NUM_RESULTS: usize = 25;

/// Default limit on each collaborator call made by a stage.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(5);

// ── Builder ─────────────────────────────────────────────────────────────────

/// Assembles a `ReconciliationEngine`.
///
/// Collaborators must be supplied before the stages that need them are
/// configured: `configure_stage` builds the stage immediately, so unknown
/// names, bad arguments and missing collaborators all surface here.
pub struct EngineBuilder {
    registry: StageRegistry,
    deps: StageDeps,
    stages: Vec<Arc<dyn Stage>>,
    weighting: Arc<dyn WeightingFunction>,
    num_results: usize,
    stage_timeout: Duration,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: StageRegistry::with_builtin_stages(),
            deps: StageDeps::new(),
            stages: Vec::new(),
            weighting: Arc::new(SumWeighting),
            num_results: DEFAULT_NUM_RESULTS,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.deps.index = Some(index);
        self
    }

    pub fn identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.deps.store = Some(store);
        self
    }

    /// Build the named stage from the registry and append it.
    pub fn configure_stage(self, name: &str, args: &Value) -> Result<Self> {
        let stage = self.registry.build(name, args, &self.deps)?;
        self.add_stage(stage)
    }

    /// Append an already-built stage. Stage names are feature-vector keys,
    /// so a name may appear only once per engine.
    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Result<Self> {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            return Err(ConcordError::DuplicateStage(stage.name().to_string()));
        }
        if stage.pool_mode() == PoolMode::Upstream {
            warn!(
                stage = stage.name(),
                "Re-ranking stage configured at top level gets no pool and will contribute nothing; wrap it in a chain"
            );
        }
        debug!(stage = stage.name(), position = self.stages.len(), "Stage configured");
        self.stages.push(stage);
        Ok(self)
    }

    pub fn weighting(mut self, weighting: Arc<dyn WeightingFunction>) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ReconciliationEngine> {
        if self.num_results == 0 {
            return Err(ConcordError::Config("num_results must be at least 1".into()));
        }
        if self.stage_timeout.is_zero() {
            return Err(ConcordError::Config("stage timeout must be non-zero".into()));
        }
        if self.stages.is_empty() {
            warn!("Engine built with no stages; every reconciliation will be empty");
        }
        info!(
            stages = self.stages.len(),
            weighting = self.weighting.name(),
            num_results = self.num_results,
            "Reconciliation engine ready"
        );
        Ok(ReconciliationEngine {
            stages: self.stages,
            weighting: self.weighting,
            num_results: self.num_results,
            stage_timeout: self.stage_timeout,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Immutable pipeline configuration. Safe to share across tasks; every call
/// to `reconcile` owns its own state.
#[derive(Clone)]
pub struct ReconciliationEngine {
    stages: Vec<Arc<dyn Stage>>,
    weighting: Arc<dyn WeightingFunction>,
    num_results: usize,
    stage_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn num_results(&self) -> usize {
        self.num_results
    }

    pub fn weighting(&self) -> &dyn WeightingFunction {
        self.weighting.as_ref()
    }

    pub async fn reconcile(&self, query: &QueryIdentity) -> Reconciliation {
        self.reconcile_with_cancel(query, CancellationToken::new()).await
    }

    /// Run every stage against `query` and rank what they found.
    ///
    /// Never fails. A stage that errors, times out or is cancelled simply
    /// contributes nothing; cancelling `cancel` before or during the call
    /// yields whatever the remaining stages produced (usually nothing).
    #[instrument(skip(self, query, cancel), fields(query = %query.match_string()))]
    pub async fn reconcile_with_cancel(
        &self,
        query: &QueryIdentity,
        cancel: CancellationToken,
    ) -> Reconciliation {
        let t0 = Instant::now();
        let ctx = StageContext::new(self.stage_timeout, cancel);

        let ctx_ref = &ctx;
        let runs = self.stages.iter().map(|stage| async move {
            let started = Instant::now();
            let results = tokio::select! {
                biased;
                _ = ctx_ref.cancelled() => {
                    warn!(stage = stage.name(), "Stage cancelled");
                    Vec::new()
                }
                results = stage.run(query, None, ctx_ref) => results,
            };
            debug!(
                stage = stage.name(),
                results = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage finished"
            );
            (stage.name().to_string(), results)
        });
        let raw: Vec<(String, Vec<RawResult>)> = join_all(runs).await;

        let mut candidates = collate(&raw);
        for candidate in &mut candidates {
            candidate.score = self.weighting.compute(&candidate.vector);
        }
        rank(&mut candidates);

        let candidate_count = candidates.len();
        candidates.truncate(self.num_results);

        info!(
            candidates = candidate_count,
            returned = candidates.len(),
            top = candidates.first().map(|c| c.score).unwrap_or(0.0),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Reconciliation complete"
        );

        Reconciliation { results: candidates, raw, candidate_count }
    }
}

/// Merge per-stage raw results into one vector per distinct candidate.
///
/// Vectors appear in first-seen order: configured stage order, then the
/// order each stage reported in. Global modifiers are written into every
/// vector after all scoped results are in and never create a vector.
pub fn collate(raw: &[(String, Vec<RawResult>)]) -> Vec<ScoredCandidate> {
    let mut slots: HashMap<CandidateKey, usize> = HashMap::new();
    let mut candidates: Vec<ScoredCandidate> = Vec::new();
    let mut globals: Vec<(&str, f64)> = Vec::new();

    for (stage, results) in raw {
        for result in results {
            match &result.candidate {
                None => globals.push((stage.as_str(), result.strength)),
                Some(record) => {
                    let slot = *slots.entry(record.key()).or_insert_with(|| {
                        candidates.push(ScoredCandidate::new(record.clone()));
                        candidates.len() - 1
                    });
                    candidates[slot].vector.set(stage, result.strength);
                }
            }
        }
    }

    for candidate in &mut candidates {
        for (stage, strength) in &globals {
            candidate.vector.set(stage, *strength);
        }
    }
    candidates
}

/// Stable sort, highest score first. NaN scores go last.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| descending(a.score, b.score));
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Outcome of one `reconcile` call.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    results: Vec<ScoredCandidate>,
    #[serde(skip)]
    raw: Vec<(String, Vec<RawResult>)>,
    candidate_count: usize,
}

impl Reconciliation {
    /// Ranked candidates, best first.
    pub fn results(&self) -> &[ScoredCandidate] {
        &self.results
    }

    pub fn top_result(&self) -> Option<&CandidateRecord> {
        self.results.first().map(|c| &c.record)
    }

    pub fn top_vector(&self) -> Option<&FeatureVector> {
        self.results.first().map(|c| &c.vector)
    }

    /// Score of the best candidate, 0 when nothing matched.
    pub fn top_value(&self) -> f64 {
        self.results.first().map(|c| c.score).unwrap_or(0.0)
    }

    /// What one stage reported before collation.
    pub fn raw_results(&self, stage: &str) -> Option<&[RawResult]> {
        self.raw
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, results)| results.as_slice())
    }

    /// Distinct candidates found, before truncation.
    pub fn candidate_count(&self) -> usize {
        self.candidate_count
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.raw.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
