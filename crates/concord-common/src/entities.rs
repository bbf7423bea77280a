/// Identity types shared by the engine, its stages and the collaborator clients.
/// A `QueryIdentity` is what the caller submits; a `CandidateRecord` is what the
/// store or index hands back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConcordError;
use crate::fingerprint::fingerprint;

// ---------------------------------------------------------------------------
// Entity type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Person,
    CorporateBody,
    Family,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person        => "person",
            EntityType::CorporateBody => "corporateBody",
            EntityType::Family        => "family",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "person"        => Ok(EntityType::Person),
            "corporatebody" => Ok(EntityType::CorporateBody),
            "family"        => Ok(EntityType::Family),
            other => Err(ConcordError::Config(format!("unknown entity type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Alternate-identifier link
// ---------------------------------------------------------------------------

/// A typed URI reference to an external vocabulary (VIAF, LCNAF, Wikidata, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AltIdLink {
    /// Link type, e.g. `sameAs`.
    #[serde(default = "default_link_kind")]
    pub kind: String,
    pub uri: String,
}

fn default_link_kind() -> String { "sameAs".to_string() }

impl AltIdLink {
    pub fn same_as(uri: impl Into<String>) -> Self {
        Self { kind: default_link_kind(), uri: uri.into() }
    }
}

// ---------------------------------------------------------------------------
// Query identity
// ---------------------------------------------------------------------------

/// The identity being resolved. Never mutated while a reconciliation runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryIdentity {
    /// Parsed preferred display name.
    #[serde(default)]
    pub name_entry: String,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub links: Vec<AltIdLink>,
    /// Relation count; `None` when the submitter did not supply one.
    #[serde(default)]
    pub degree: Option<u32>,
    /// Unparsed input as submitted.
    #[serde(default)]
    pub original: String,
}

impl QueryIdentity {
    pub fn new(name_entry: impl Into<String>) -> Self {
        let name_entry = name_entry.into();
        Self {
            original: name_entry.clone(),
            name_entry,
            ..Default::default()
        }
    }

    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original = original.into();
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_link(mut self, link: AltIdLink) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_degree(mut self, degree: u32) -> Self {
        self.degree = Some(degree);
        self
    }

    /// String used for text comparison: the original input, or the preferred
    /// name when the original is blank. Surrounding whitespace is dropped.
    pub fn match_string(&self) -> &str {
        pick_match_string(&self.original, &self.name_entry)
    }

    /// True when there is nothing to search for.
    pub fn is_blank(&self) -> bool {
        self.match_string().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Candidate record
// ---------------------------------------------------------------------------

/// A previously recorded identity that can be scored against a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    /// Stable identifier assigned by the backing store.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name_entry: String,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub links: Vec<AltIdLink>,
    #[serde(default)]
    pub degree: Option<u32>,
    #[serde(default)]
    pub original: String,
}

impl CandidateRecord {
    pub fn new(id: impl Into<String>, name_entry: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name_entry: name_entry.into(),
            ..Default::default()
        }
    }

    /// A record that has not been assigned a store identifier yet.
    pub fn unsaved(name_entry: impl Into<String>) -> Self {
        Self {
            name_entry: name_entry.into(),
            ..Default::default()
        }
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_degree(mut self, degree: u32) -> Self {
        self.degree = Some(degree);
        self
    }

    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original = original.into();
        self
    }

    pub fn with_link(mut self, link: AltIdLink) -> Self {
        self.links.push(link);
        self
    }

    pub fn match_string(&self) -> &str {
        pick_match_string(&self.original, &self.name_entry)
    }

    /// Identity of this record for collation. Store ids win; records without
    /// one fall back to a content fingerprint.
    pub fn key(&self) -> CandidateKey {
        match &self.id {
            Some(id) => CandidateKey::Id(id.clone()),
            None => CandidateKey::Fingerprint(fingerprint(self.match_string())),
        }
    }
}

fn pick_match_string<'a>(original: &'a str, name_entry: &'a str) -> &'a str {
    let original = original.trim();
    if original.is_empty() { name_entry.trim() } else { original }
}

// ---------------------------------------------------------------------------
// Candidate key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CandidateKey {
    Id(String),
    Fingerprint(String),
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKey::Id(id) => write!(f, "{id}"),
            CandidateKey::Fingerprint(fp) => write!(f, "fp:{}", &fp[..fp.len().min(12)]),
        }
    }
}
