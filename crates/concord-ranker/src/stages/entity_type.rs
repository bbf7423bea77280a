//! Entity-type discount. Re-ranks an upstream pool only.

use async_trait::async_trait;

use concord_common::QueryIdentity;
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub const ENTITY_TYPE_STAGE: &str = "entity_type";

/// Applied when query and candidate both declare a type and they differ.
pub const ENTITY_TYPE_DISCOUNT: f64 = -50.0;

pub struct EntityTypeFilter {
    name: String,
}

impl EntityTypeFilter {
    pub fn new() -> Self {
        Self { name: ENTITY_TYPE_STAGE.to_string() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }
}

impl Default for EntityTypeFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for EntityTypeFilter {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Upstream }

    async fn run(
        &self,
        query: &QueryIdentity,
        pool: Option<&[ScoredCandidate]>,
        _ctx: &StageContext,
    ) -> Vec<RawResult> {
        let Some(pool) = pool else { return vec![] };

        pool.iter()
            .map(|c| {
                let strength = match (query.entity_type, c.record.entity_type) {
                    (Some(q), Some(r)) if q != r => ENTITY_TYPE_DISCOUNT,
                    _ => 0.0,
                };
                RawResult::scoped(c.record.clone(), strength)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_common::{CandidateRecord, EntityType};

    fn pool() -> Vec<ScoredCandidate> {
        vec![
            ScoredCandidate::new(CandidateRecord::new("1", "Washington, George")
                .with_entity_type(EntityType::Person)),
            ScoredCandidate::new(CandidateRecord::new("2", "George Washington Bridge Authority")
                .with_entity_type(EntityType::CorporateBody)),
            ScoredCandidate::new(CandidateRecord::new("3", "Washington")),
        ]
    }

    fn strengths(results: &[RawResult]) -> Vec<f64> {
        results.iter().map(|r| r.strength).collect()
    }

    #[tokio::test]
    async fn test_discounts_mismatched_type() {
        let query = QueryIdentity::new("George Washington").with_entity_type(EntityType::Person);
        let results = EntityTypeFilter::new().run(&query, Some(&pool()), &StageContext::default()).await;
        assert_eq!(strengths(&results), vec![0.0, ENTITY_TYPE_DISCOUNT, 0.0]);
    }

    #[tokio::test]
    async fn test_untyped_query_has_no_opinion() {
        let query = QueryIdentity::new("George Washington");
        let results = EntityTypeFilter::new().run(&query, Some(&pool()), &StageContext::default()).await;
        assert_eq!(strengths(&results), vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_no_pool_no_results() {
        let query = QueryIdentity::new("x").with_entity_type(EntityType::Family);
        assert!(EntityTypeFilter::new().run(&query, None, &StageContext::default()).await.is_empty());
    }
}
