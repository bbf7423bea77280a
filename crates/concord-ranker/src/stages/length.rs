//! String-length heuristics.

use async_trait::async_trait;

use concord_common::QueryIdentity;
use crate::normalise::{char_len, scaled_ln};
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub const ORIGINAL_LENGTH_STAGE: &str = "original_length";
pub const LENGTH_DIFFERENCE_STAGE: &str = "length_difference";

/// Penalty multiplier applied to `ln(|Δlength|)`.
pub const LENGTH_DIFFERENCE_SCALE: f64 = -4.0;

/// Global bonus `ln(len(query string))`. Longer inputs carry more evidence,
/// so every identified candidate is lifted by the same amount.
pub struct OriginalLengthStage {
    name: String,
}

impl OriginalLengthStage {
    pub fn new() -> Self {
        Self { name: ORIGINAL_LENGTH_STAGE.to_string() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }
}

impl Default for OriginalLengthStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for OriginalLengthStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Global }

    async fn run(
        &self,
        query: &QueryIdentity,
        _pool: Option<&[ScoredCandidate]>,
        _ctx: &StageContext,
    ) -> Vec<RawResult> {
        let len = char_len(query.match_string());
        if len == 0 {
            return vec![];
        }
        vec![RawResult::global(scaled_ln(1.0, len as f64))]
    }
}

/// Penalises candidates whose string length differs from the query's:
/// 0 for equal lengths, `-4 ln(|Δ|)` otherwise. Re-ranks an upstream pool only.
pub struct LengthDifferenceStage {
    name: String,
}

impl LengthDifferenceStage {
    pub fn new() -> Self {
        Self { name: LENGTH_DIFFERENCE_STAGE.to_string() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }
}

impl Default for LengthDifferenceStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for LengthDifferenceStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Upstream }

    async fn run(
        &self,
        query: &QueryIdentity,
        pool: Option<&[ScoredCandidate]>,
        _ctx: &StageContext,
    ) -> Vec<RawResult> {
        let Some(pool) = pool else { return vec![] };
        let query_len = char_len(query.match_string());
        if query_len == 0 {
            return vec![];
        }

        pool.iter()
            .map(|c| {
                let diff = query_len.abs_diff(char_len(c.record.match_string()));
                let strength = if diff == 0 {
                    0.0
                } else {
                    scaled_ln(LENGTH_DIFFERENCE_SCALE, diff as f64)
                };
                RawResult::scoped(c.record.clone(), strength)
            })
            .collect()
    }
}
