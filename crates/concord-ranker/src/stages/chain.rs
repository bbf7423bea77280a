//! Composite stage that threads candidates through sub-stages.
//!
//! Sub-stage 1 runs against the incoming pool. The candidates it returns
//! (strengths dropped) become the pool of sub-stage 2, and so on. The last
//! sub-stage's results are returned unchanged. This lets broad recall (an
//! index search) feed a re-ranking stage that has no recall of its own.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use concord_common::{ConcordError, QueryIdentity, Result};
use crate::stage::{pool_needs_relations, PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub const CHAIN_STAGE: &str = "chain";

/// Separator between sub-stage names in the composite's vector key.
pub const CHAIN_NAME_SEPARATOR: &str = ":";

pub struct ChainStage {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl ChainStage {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Result<Self> {
        if stages.is_empty() {
            return Err(ConcordError::invalid_args(CHAIN_STAGE, "a chain needs at least one sub-stage"));
        }
        let name = stages
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(CHAIN_NAME_SEPARATOR);
        Ok(Self { name, stages })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }
}

/// Candidates of one step, deduplicated by key (first report wins). Global
/// entries carry no candidate and are dropped.
fn pool_from(results: &[RawResult]) -> Vec<ScoredCandidate> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter_map(|r| r.candidate.as_ref())
        .filter(|c| seen.insert(c.key()))
        .map(|c| ScoredCandidate::new(c.clone()))
        .collect()
}

#[async_trait]
impl Stage for ChainStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Chain }

    fn needs_relations(&self) -> bool {
        pool_needs_relations(&self.stages)
    }

    async fn run(
        &self,
        query: &QueryIdentity,
        pool: Option<&[ScoredCandidate]>,
        ctx: &StageContext,
    ) -> Vec<RawResult> {
        let mut current: Option<Vec<ScoredCandidate>> = pool.map(|p| p.to_vec());
        let mut last = Vec::new();

        for (step, stage) in self.stages.iter().enumerate() {
            if ctx.is_cancelled() {
                return vec![];
            }
            last = stage.run(query, current.as_deref(), ctx).await;
            debug!(chain = %self.name, step, stage = stage.name(), count = last.len(), "Chain step done");

            if step + 1 < self.stages.len() {
                current = Some(pool_from(&last));
            }
        }

        last
    }
}
