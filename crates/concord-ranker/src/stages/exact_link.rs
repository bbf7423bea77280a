//! Exact alternate-identifier match.
//!
//! Follows every link on the query to the store records declaring the same
//! URI. A shared externally asserted identifier is treated as near-certain.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use concord_common::QueryIdentity;
use concord_sources::{FieldMask, IdentityStore};
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub const EXACT_LINK_STAGE: &str = "exact_link";

/// Strength emitted for every exact match.
pub const EXACT_MATCH_STRENGTH: f64 = 100.0;

pub struct ExactLinkStage {
    name: String,
    store: Arc<dyn IdentityStore>,
    mask: FieldMask,
}

impl ExactLinkStage {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            name: EXACT_LINK_STAGE.to_string(),
            store,
            mask: FieldMask::Summary,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }

    /// Read matched records with relation counts. Needed only when a later
    /// stage consumes them.
    pub fn with_mask(mut self, mask: FieldMask) -> Self {
        self.mask = mask;
        self
    }
}

#[async_trait]
impl Stage for ExactLinkStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Own }

    /// Ignores the upstream pool: matches come only from the store.
    async fn run(
        &self,
        query: &QueryIdentity,
        _pool: Option<&[ScoredCandidate]>,
        ctx: &StageContext,
    ) -> Vec<RawResult> {
        let mut seen_uris = HashSet::new();
        let uris: Vec<&str> = query.links
            .iter()
            .map(|l| l.uri.trim())
            .filter(|u| !u.is_empty() && seen_uris.insert(*u))
            .collect();
        if uris.is_empty() {
            return vec![];
        }

        // One lookup per link, all in flight together.
        let lookups = uris.iter().map(|uri| {
            ctx.call(&self.name, "lookup_by_alternate_id", self.store.lookup_by_alternate_id(uri))
        });
        let mut seen_ids = HashSet::new();
        let ids: Vec<String> = join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .flatten()
            .filter(|id| seen_ids.insert(id.clone()))
            .collect();

        let reads = ids.iter().map(|id| {
            ctx.call(&self.name, "read_by_id", self.store.read_by_id(id, self.mask))
        });
        let results: Vec<RawResult> = join_all(reads)
            .await
            .into_iter()
            .flatten()
            .flatten()
            .map(|record| RawResult::scoped(record, EXACT_MATCH_STRENGTH))
            .collect();

        debug!(stage = %self.name, links = uris.len(), matches = results.len(), "Exact link lookup done");
        results
    }
}
