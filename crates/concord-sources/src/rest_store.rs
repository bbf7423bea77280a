//! REST client for the identity store.
//!
//! Endpoints:
//!   `GET {base_url}/identities?same_as={uri}`        -> `{"ids": [..]}`
//!   `GET {base_url}/identities/{id}?fields={mask}`   -> identity JSON, 404 when unknown

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use concord_common::{CandidateRecord, ConcordError, Result};
use crate::http::HttpClient;
use crate::store::{FieldMask, IdentityStore};

pub struct RestIdentityStore {
    client: HttpClient,
}

impl RestIdentityStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { client: HttpClient::new(base_url, timeout)? })
    }
}

/// Ids may come back as strings or numbers depending on the store backend.
pub fn parse_ids(resp: &Value) -> Vec<String> {
    let list = match resp {
        Value::Array(_) => resp,
        _ => &resp["ids"],
    };
    list.as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Decode one identity, forcing the id to the one that was requested when the
/// payload omits it.
pub fn parse_record(id: &str, resp: Value) -> Result<CandidateRecord> {
    let mut record: CandidateRecord = serde_json::from_value(resp)?;
    if record.id.is_none() {
        record.id = Some(id.to_string());
    }
    Ok(record)
}

#[async_trait]
impl IdentityStore for RestIdentityStore {
    #[instrument(skip(self))]
    async fn lookup_by_alternate_id(&self, uri: &str) -> Result<Vec<String>> {
        let url = self.client.url(&["identities"])?;
        let resp = self.client
            .get(url)
            .query(&[("same_as", uri)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ConcordError::Collaborator(format!(
                "identity store returned HTTP {} for alternate id lookup",
                resp.status().as_u16()
            )));
        }

        let ids = parse_ids(&resp.json::<Value>().await?);
        debug!(count = ids.len(), "Alternate id lookup returned ids");
        Ok(ids)
    }

    #[instrument(skip(self))]
    async fn read_by_id(&self, id: &str, mask: FieldMask) -> Result<Option<CandidateRecord>> {
        let url = self.client.url(&["identities", id])?;
        let resp = self.client
            .get(url)
            .query(&[("fields", mask.as_str())])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ConcordError::Collaborator(format!(
                "identity store returned HTTP {} reading {id}",
                resp.status().as_u16()
            )));
        }

        let record = parse_record(id, resp.json::<Value>().await?)?;
        Ok(Some(record))
    }
}
