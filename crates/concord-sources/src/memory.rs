//! In-memory collaborators for tests and offline runs.
//!
//! Both can be switched off to simulate an outage and given an artificial
//! latency to exercise stage timeouts.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use concord_common::{CandidateRecord, ConcordError, Result};
use crate::search::{MatchMode, SearchField, SearchHit, SearchIndex, SearchRequest};
use crate::store::{FieldMask, IdentityStore};

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[derive(Debug, Default)]
struct Availability {
    down: AtomicBool,
    delay: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl Availability {
    async fn enter(&self, what: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(ConcordError::Collaborator(format!("{what} unavailable")));
        }
        Ok(())
    }

    fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().unwrap_or_else(|e| e.into_inner()) = delay;
    }
}

// ── Search index ─────────────────────────────────────────────────────────────

/// Token-matching index over a fixed set of records.
///
/// Each record carries a boost; a hit's relevance is
/// `boost × matched_tokens / query_tokens`, so a full match scores exactly
/// the boost.
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    entries: Vec<(CandidateRecord, f64)>,
    health: Availability,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record with boost 1.0.
    pub fn with(self, record: CandidateRecord) -> Self {
        self.with_boost(record, 1.0)
    }

    pub fn with_boost(mut self, record: CandidateRecord, boost: f64) -> Self {
        self.entries.push((record, boost));
        self
    }

    pub fn set_available(&self, available: bool) {
        self.health.down.store(!available, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.health.set_delay(delay);
    }

    /// Number of `search` calls served so far.
    pub fn calls(&self) -> usize {
        self.health.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.health.enter("search index").await?;

        let query_tokens = tokens(&request.query);
        if query_tokens.is_empty() {
            return Ok(vec![]);
        }
        let required = match request.mode {
            MatchMode::AllTokens => query_tokens.len(),
            MatchMode::MinimumMatch(pct) => {
                ((query_tokens.len() * pct.min(100) as usize) / 100).max(1)
            }
        };

        let mut hits: Vec<SearchHit> = self.entries
            .iter()
            .filter(|(rec, _)| match (request.entity_type, rec.entity_type) {
                (Some(wanted), Some(actual)) => wanted == actual,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter_map(|(rec, boost)| {
                let text = match request.field {
                    SearchField::OfficialName => rec.match_string(),
                    SearchField::NameEntry => rec.name_entry.as_str(),
                };
                let have: HashSet<String> = tokens(text).into_iter().collect();
                let matched = query_tokens.iter().filter(|t| have.contains(*t)).count();
                if matched < required {
                    return None;
                }
                Some(SearchHit {
                    id: rec.id.clone()?,
                    original_name: rec.match_string().to_string(),
                    name_entry: Some(rec.name_entry.clone()),
                    ark_id: None,
                    entity_type: rec.entity_type,
                    relevance: boost * matched as f64 / query_tokens.len() as f64,
                    degree: if request.include_degree { rec.degree } else { None },
                })
            })
            .collect();

        hits.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(request.limit);
        Ok(hits)
    }
}

// ── Identity store ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: BTreeMap<String, CandidateRecord>,
    health: Availability,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Records without an id are ignored: the store assigns ids.
    pub fn with(mut self, record: CandidateRecord) -> Self {
        if let Some(id) = record.id.clone() {
            self.records.insert(id, record);
        }
        self
    }

    pub fn set_available(&self, available: bool) {
        self.health.down.store(!available, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.health.set_delay(delay);
    }

    pub fn calls(&self) -> usize {
        self.health.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn lookup_by_alternate_id(&self, uri: &str) -> Result<Vec<String>> {
        self.health.enter("identity store").await?;
        Ok(self.records
            .iter()
            .filter(|(_, rec)| rec.links.iter().any(|l| l.uri == uri))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn read_by_id(&self, id: &str, mask: FieldMask) -> Result<Option<CandidateRecord>> {
        self.health.enter("identity store").await?;
        Ok(self.records.get(id).cloned().map(|mut rec| {
            if mask == FieldMask::Summary {
                rec.degree = None;
            }
            rec
        }))
    }
}
