//! Connectivity bonus: well-connected records are more likely to be the
//! canonical identity. Re-ranks an upstream pool only.

use async_trait::async_trait;

use concord_common::QueryIdentity;
use crate::normalise::scaled_ln;
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub const DEGREE_STAGE: &str = "degree";

pub const DEGREE_SCALE: f64 = 5.0;

pub struct DegreeStage {
    name: String,
}

impl DegreeStage {
    pub fn new() -> Self {
        Self { name: DEGREE_STAGE.to_string() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }
}

impl Default for DegreeStage {
    fn default() -> Self {
        Self::new()
    }
}

/// `5 ln(degree)` for a positive degree, otherwise 0.
pub fn degree_strength(degree: Option<u32>) -> f64 {
    match degree {
        Some(d) if d > 0 => scaled_ln(DEGREE_SCALE, d as f64),
        _ => 0.0,
    }
}

#[async_trait]
impl Stage for DegreeStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Upstream }

    fn needs_relations(&self) -> bool { true }

    async fn run(
        &self,
        _query: &QueryIdentity,
        pool: Option<&[ScoredCandidate]>,
        _ctx: &StageContext,
    ) -> Vec<RawResult> {
        let Some(pool) = pool else { return vec![] };
        pool.iter()
            .map(|c| RawResult::scoped(c.record.clone(), degree_strength(c.record.degree)))
            .collect()
    }
}
