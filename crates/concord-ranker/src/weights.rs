//! Weighting functions: reduce a feature vector to one score.

use std::fmt::Debug;

use crate::normalise::stable_sum;
use crate::stages::exact_link::{EXACT_LINK_STAGE, EXACT_MATCH_STRENGTH};
use crate::vector::FeatureVector;

/// Pluggable scoring model. One instance per engine, shared across calls.
pub trait WeightingFunction: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn compute(&self, vector: &FeatureVector) -> f64;
}

/// Score = sum of every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumWeighting;

impl WeightingFunction for SumWeighting {
    fn name(&self) -> &str { "sum" }

    fn compute(&self, vector: &FeatureVector) -> f64 {
        stable_sum(vector.values())
    }
}

/// Sum, except that an exact alternate-identifier match wins outright.
///
/// If the vector holds `exact_key` with exactly `EXACT_MATCH_STRENGTH`, the
/// score is `EXACT_MATCH_STRENGTH` regardless of every other entry.
#[derive(Debug, Clone)]
pub struct ExactOverrideWeighting {
    exact_key: String,
}

impl ExactOverrideWeighting {
    pub fn new() -> Self {
        Self::with_key(EXACT_LINK_STAGE)
    }

    /// Use when the exact-link stage was configured under a custom label.
    pub fn with_key(exact_key: impl Into<String>) -> Self {
        Self { exact_key: exact_key.into() }
    }

    pub fn exact_key(&self) -> &str {
        &self.exact_key
    }
}

impl Default for ExactOverrideWeighting {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightingFunction for ExactOverrideWeighting {
    fn name(&self) -> &str { "sum_with_override" }

    fn compute(&self, vector: &FeatureVector) -> f64 {
        if vector.get(&self.exact_key) == Some(EXACT_MATCH_STRENGTH) {
            return EXACT_MATCH_STRENGTH;
        }
        SumWeighting.compute(vector)
    }
}
