//! concord-ranker — Identity reconciliation engine.
//!
//! A query identity is run through an ordered list of scoring stages. Their
//! per-candidate strengths are collated into feature vectors, each vector is
//! reduced to one score by a weighting function, and the candidates come back
//! ranked.

pub mod stage;
pub mod vector;
pub mod normalise;
pub mod weights;
pub mod stages;
pub mod registry;
pub mod engine;

pub use engine::{EngineBuilder, Reconciliation, ReconciliationEngine, DEFAULT_NUM_RESULTS};
pub use registry::{StageDeps, StageRegistry};
pub use stage::{pool_needs_relations, PoolMode, RawResult, Stage, StageContext};
pub use vector::{FeatureVector, ScoredCandidate};
pub use weights::{ExactOverrideWeighting, SumWeighting, WeightingFunction};
