//! Stage that replays a fixed result list, ignoring the query.
//!
//! Used to replay recorded stage output and to drive the engine in tests
//! without collaborators.

use async_trait::async_trait;

use concord_common::QueryIdentity;
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub struct FixedStage {
    name: String,
    results: Vec<RawResult>,
}

impl FixedStage {
    pub fn new(name: impl Into<String>, results: Vec<RawResult>) -> Self {
        Self { name: name.into(), results }
    }
}

#[async_trait]
impl Stage for FixedStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Own }

    async fn run(
        &self,
        _query: &QueryIdentity,
        _pool: Option<&[ScoredCandidate]>,
        _ctx: &StageContext,
    ) -> Vec<RawResult> {
        self.results.clone()
    }
}
