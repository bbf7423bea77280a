//! concord-common — Shared identity types and errors used across all Concord crates.

pub mod error;
pub mod entities;
pub mod fingerprint;

// Re-export commonly used types
pub use entities::{AltIdLink, CandidateKey, CandidateRecord, EntityType, QueryIdentity};
pub use error::{ConcordError, Result};
