//! concord-sources — External collaborators consumed by the reconciliation engine.
//!
//! The engine only ever talks to two things outside itself: a fielded search
//! index (recall by name) and the identity store (lookup by alternate
//! identifier, hydration by id). Both are traits here so stages can be driven
//! by HTTP clients in production and by in-memory fixtures in tests.

pub mod http;
pub mod search;
pub mod store;
pub mod elastic;
pub mod rest_store;
pub mod memory;

pub use search::{MatchMode, SearchField, SearchHit, SearchIndex, SearchRequest};
pub use store::{FieldMask, IdentityStore};
pub use elastic::ElasticSearchIndex;
pub use rest_store::RestIdentityStore;
pub use memory::{MemoryIdentityStore, MemorySearchIndex};
