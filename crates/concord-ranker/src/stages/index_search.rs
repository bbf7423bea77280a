//! Index-backed recall stages.
//!
//! Three registered flavours share this implementation:
//!   `original_name`  unparsed original string vs official name, all tokens
//!   `preferred_name` parsed name entry, all tokens
//!   `fuzzy_name`     parsed name entry, 75% of tokens

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use concord_common::QueryIdentity;
use concord_sources::{MatchMode, SearchField, SearchIndex, SearchRequest};
use crate::stage::{PoolMode, RawResult, Stage, StageContext};
use crate::vector::ScoredCandidate;

pub const ORIGINAL_NAME_STAGE: &str = "original_name";
pub const PREFERRED_NAME_STAGE: &str = "preferred_name";
pub const FUZZY_NAME_STAGE: &str = "fuzzy_name";

/// Minimum share of query tokens the fuzzy flavour requires.
pub const FUZZY_MINIMUM_MATCH: u8 = 75;

pub const DEFAULT_SEARCH_LIMIT: usize = 25;

pub struct IndexSearchStage {
    name: String,
    index: Arc<dyn SearchIndex>,
    field: SearchField,
    mode: MatchMode,
    limit: usize,
    restrict_entity_type: bool,
    include_degree: bool,
}

impl IndexSearchStage {
    fn new(name: &str, index: Arc<dyn SearchIndex>, field: SearchField, mode: MatchMode) -> Self {
        Self {
            name: name.to_string(),
            index,
            field,
            mode,
            limit: DEFAULT_SEARCH_LIMIT,
            restrict_entity_type: false,
            include_degree: true,
        }
    }

    pub fn original_name(index: Arc<dyn SearchIndex>) -> Self {
        Self::new(ORIGINAL_NAME_STAGE, index, SearchField::OfficialName, MatchMode::AllTokens)
    }

    pub fn preferred_name(index: Arc<dyn SearchIndex>) -> Self {
        Self::new(PREFERRED_NAME_STAGE, index, SearchField::NameEntry, MatchMode::AllTokens)
    }

    pub fn fuzzy_name(index: Arc<dyn SearchIndex>) -> Self {
        Self::new(
            FUZZY_NAME_STAGE,
            index,
            SearchField::NameEntry,
            MatchMode::MinimumMatch(FUZZY_MINIMUM_MATCH),
        )
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.name = label.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Pass the query's entity type to the index as a filter.
    pub fn restrict_entity_type(mut self, restrict: bool) -> Self {
        self.restrict_entity_type = restrict;
        self
    }

    pub fn include_degree(mut self, include: bool) -> Self {
        self.include_degree = include;
        self
    }

    fn query_text<'q>(&self, query: &'q QueryIdentity) -> &'q str {
        match self.field {
            SearchField::OfficialName => query.match_string(),
            SearchField::NameEntry => query.name_entry.trim(),
        }
    }
}

#[async_trait]
impl Stage for IndexSearchStage {
    fn name(&self) -> &str { &self.name }

    fn pool_mode(&self) -> PoolMode { PoolMode::Own }

    /// With an upstream pool, hits outside the pool are dropped.
    async fn run(
        &self,
        query: &QueryIdentity,
        pool: Option<&[ScoredCandidate]>,
        ctx: &StageContext,
    ) -> Vec<RawResult> {
        let text = self.query_text(query);
        if text.is_empty() {
            return vec![];
        }

        let request = SearchRequest {
            query: text.to_string(),
            field: self.field,
            mode: self.mode,
            entity_type: if self.restrict_entity_type { query.entity_type } else { None },
            limit: self.limit,
            include_degree: self.include_degree,
        };

        let Some(hits) = ctx.call(&self.name, "search", self.index.search(&request)).await else {
            return vec![];
        };

        let allowed: Option<HashSet<_>> = pool.map(|p| p.iter().map(|c| c.key()).collect());
        let results: Vec<RawResult> = hits
            .into_iter()
            .filter(|h| h.relevance.is_finite())
            .map(|h| {
                let relevance = h.relevance;
                RawResult::scoped(h.into_candidate(), relevance)
            })
            .filter(|r| match (&allowed, &r.candidate) {
                (Some(keys), Some(c)) => keys.contains(&c.key()),
                _ => true,
            })
            .collect();

        debug!(stage = %self.name, count = results.len(), "Index search done");
        results
    }
}
