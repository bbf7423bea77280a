//! The stage contract shared by every scoring and filtering unit.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use concord_common::{CandidateRecord, ConcordError, QueryIdentity, Result};
use crate::vector::ScoredCandidate;

/// One strength reported by a stage.
///
/// `candidate == None` marks a global modifier: the strength is applied to
/// every candidate that some other stage identified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResult {
    pub candidate: Option<CandidateRecord>,
    pub strength: f64,
}

impl RawResult {
    pub fn scoped(candidate: CandidateRecord, strength: f64) -> Self {
        Self { candidate: Some(candidate), strength }
    }

    pub fn global(strength: f64) -> Self {
        Self { candidate: None, strength }
    }

    pub fn is_global(&self) -> bool {
        self.candidate.is_none()
    }
}

/// Where a stage gets the candidates it scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    /// Finds its own candidates from a collaborator; the upstream pool, when
    /// given, only narrows the output.
    Own,
    /// Re-ranks an upstream pool and returns nothing without one.
    Upstream,
    /// Emits a single global modifier.
    Global,
    /// Threads sub-stages; see `ChainStage`.
    Chain,
}

/// A pluggable scoring or filtering unit.
///
/// # Contract
/// - `name()` is the feature-vector key and must be unique within an engine.
/// - `run()` never fails. Collaborator errors, timeouts and cancellation are
///   logged and turn into an empty result list.
/// - Stages hold only constructor-time configuration.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn pool_mode(&self) -> PoolMode;

    /// True when scoring reads candidate relation counts (`degree`).
    fn needs_relations(&self) -> bool {
        false
    }

    async fn run(
        &self,
        query: &QueryIdentity,
        pool: Option<&[ScoredCandidate]>,
        ctx: &StageContext,
    ) -> Vec<RawResult>;
}

/// Whether records handed to `stages[0]` as a pool reach a stage that reads
/// relation counts. Upstream stages pass pool records through; any other
/// mode replaces them, so the walk stops there.
pub fn pool_needs_relations(stages: &[Arc<dyn Stage>]) -> bool {
    for stage in stages {
        if stage.needs_relations() {
            return true;
        }
        if stage.pool_mode() != PoolMode::Upstream {
            return false;
        }
    }
    false
}

/// Per-call limits handed to every stage: a timeout for each collaborator
/// call and the cancellation signal of the enclosing reconciliation.
#[derive(Debug, Clone)]
pub struct StageContext {
    timeout: Duration,
    cancel: CancellationToken,
}

impl StageContext {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Run one collaborator call under the timeout and cancellation signal.
    /// Every failure is logged against `stage` and returned as `None`.
    pub async fn call<T, F>(&self, stage: &str, what: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.try_call(fut).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(stage, call = what, error = %e, "Collaborator call failed; stage contributes nothing");
                None
            }
        }
    }

    async fn try_call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ConcordError::Cancelled);
        }
        let t0 = Instant::now();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ConcordError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(ConcordError::Timeout(t0.elapsed().as_millis() as u64)),
            },
        }
    }
}

impl Default for StageContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), CancellationToken::new())
    }
}
