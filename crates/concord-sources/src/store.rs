//! Identity store collaborator interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use concord_common::{CandidateRecord, Result};

/// How much of a record to hydrate on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMask {
    /// Name, type and links only. Relation counts are left empty.
    #[default]
    Summary,
    /// Everything, including relation counts.
    Full,
}

impl FieldMask {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMask::Summary => "summary",
            FieldMask::Full    => "full",
        }
    }
}

/// Durable store of recorded identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Internal ids of every record declaring `uri` as an alternate identifier.
    async fn lookup_by_alternate_id(&self, uri: &str) -> Result<Vec<String>>;

    /// Read one record. `Ok(None)` when the id is unknown.
    async fn read_by_id(&self, id: &str, mask: FieldMask) -> Result<Option<CandidateRecord>>;
}
