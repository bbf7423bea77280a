//! Search index collaborator interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use concord_common::{CandidateRecord, EntityType, Result};

/// Which indexed field a query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    /// The official (original, unparsed) name.
    OfficialName,
    /// The parsed preferred name entry.
    NameEntry,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::OfficialName => "official_name",
            SearchField::NameEntry    => "name_entry",
        }
    }
}

/// How query tokens must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every token must match (logical AND).
    AllTokens,
    /// At least this percentage of tokens must match.
    MinimumMatch(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub field: SearchField,
    pub mode: MatchMode,
    pub entity_type: Option<EntityType>,
    pub limit: usize,
    pub include_degree: bool,
}

/// One scored hit returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub original_name: String,
    #[serde(default)]
    pub name_entry: Option<String>,
    #[serde(default)]
    pub ark_id: Option<String>,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    /// Index-native relevance; unbounded positive.
    pub relevance: f64,
    #[serde(default)]
    pub degree: Option<u32>,
}

impl SearchHit {
    pub fn into_candidate(self) -> CandidateRecord {
        let name_entry = self.name_entry.unwrap_or_else(|| self.original_name.clone());
        let mut record = CandidateRecord::new(self.id, name_entry).with_original(self.original_name);
        record.entity_type = self.entity_type;
        record.degree = self.degree;
        if let Some(ark) = self.ark_id {
            record.links.push(concord_common::AltIdLink { kind: "ark".to_string(), uri: ark });
        }
        record
    }
}

/// Fielded full-text index over recorded identities.
///
/// Implementations:
/// - `ElasticSearchIndex` (remote, HTTP)
/// - `MemorySearchIndex` (tests, offline runs)
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Run one query. Hits come back ordered by descending relevance.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hit_into_candidate() {
        let hit = SearchHit {
            id: "7".into(),
            original_name: "Washington, George, 1732-1799".into(),
            name_entry: None,
            ark_id: Some("ark:/99166/w6029tk7".into()),
            entity_type: Some(EntityType::Person),
            relevance: 3.2,
            degree: Some(12),
        };
        let rec = hit.into_candidate();
        assert_eq!(rec.id.as_deref(), Some("7"));
        assert_eq!(rec.name_entry, "Washington, George, 1732-1799");
        assert_eq!(rec.degree, Some(12));
        assert_eq!(rec.links[0].kind, "ark");
    }
}
