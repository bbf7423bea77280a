//! Fixtures shared by the Concord test suites.
//!
//! The Washington fixture set mirrors a small authority file: two people
//! called George Washington, the university named after one of them, and a
//! family. Ids are stable so tests can assert on ranking by id.

use concord_common::{AltIdLink, CandidateRecord, EntityType, QueryIdentity};
use concord_sources::{MemoryIdentityStore, MemorySearchIndex};

pub use pretty_assertions;

/// The `sameAs` URI carried by the first president's record.
pub const WASHINGTON_VIAF: &str = "http://viaf.org/viaf/31432428";

/// Install a test subscriber once. Honours `RUST_LOG`, silent by default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_test_writer()
        .try_init();
}

/// Float comparison for scores built from logarithms.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

// ── Washington fixtures ─────────────────────────────────────────────────────

pub fn george_washington_query() -> QueryIdentity {
    QueryIdentity::new("Washington, George, 1732-1799")
        .with_original("George Washington")
        .with_entity_type(EntityType::Person)
}

pub fn president() -> CandidateRecord {
    CandidateRecord::new("1", "Washington, George, 1732-1799")
        .with_original("George Washington")
        .with_entity_type(EntityType::Person)
        .with_degree(12)
        .with_link(AltIdLink::same_as(WASHINGTON_VIAF))
}

pub fn university() -> CandidateRecord {
    CandidateRecord::new("2", "George Washington University")
        .with_original("George Washington University")
        .with_entity_type(EntityType::CorporateBody)
        .with_degree(3)
}

pub fn namesake() -> CandidateRecord {
    CandidateRecord::new("3", "Washington, George, 1817-1905")
        .with_original("George Washington")
        .with_entity_type(EntityType::Person)
        .with_degree(1)
}

pub fn family() -> CandidateRecord {
    CandidateRecord::new("4", "Washington family")
        .with_original("Washington family")
        .with_entity_type(EntityType::Family)
}

pub fn washington_records() -> Vec<CandidateRecord> {
    vec![president(), university(), namesake(), family()]
}

/// Index over the Washington records. The president ranks highest on
/// relevance, the namesake slightly lower.
pub fn washington_index() -> MemorySearchIndex {
    MemorySearchIndex::new()
        .with_boost(president(), 12.4)
        .with_boost(university(), 8.1)
        .with_boost(namesake(), 9.0)
        .with_boost(family(), 2.0)
}

pub fn washington_store() -> MemoryIdentityStore {
    washington_records()
        .into_iter()
        .fold(MemoryIdentityStore::new(), MemoryIdentityStore::with)
}

/// `count` distinct people sharing the same name, ids "p0".."p{count-1}".
pub fn crowd(count: usize, name: &str) -> Vec<CandidateRecord> {
    (0..count)
        .map(|i| {
            CandidateRecord::new(format!("p{i}"), name)
                .with_entity_type(EntityType::Person)
                .with_degree(i as u32)
        })
        .collect()
}
