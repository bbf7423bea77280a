//! Feature vectors and scored candidates.

use serde::Serialize;
use std::collections::BTreeMap;

use concord_common::{CandidateKey, CandidateRecord};

/// Stage name -> strength for one candidate.
///
/// Keys are unique. Writing a key twice replaces the earlier value; repeated
/// reports from one stage are never summed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector {
    entries: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, stage: &str, strength: f64) {
        self.entries.insert(stage.to_string(), strength);
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.entries.get(stage).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.values().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        let mut v = FeatureVector::new();
        for (k, s) in iter {
            v.set(k, s);
        }
        v
    }
}

/// A candidate with its vector and score for one reconciliation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    pub vector: FeatureVector,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(record: CandidateRecord) -> Self {
        Self { record, vector: FeatureVector::new(), score: 0.0 }
    }

    pub fn key(&self) -> CandidateKey {
        self.record.key()
    }
}
