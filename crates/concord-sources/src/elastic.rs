//! Elasticsearch-backed search index client.
//!
//! Endpoint: `POST {base_url}/{index}/_search`

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use concord_common::{ConcordError, Result};
use crate::http::HttpClient;
use crate::search::{MatchMode, SearchHit, SearchIndex, SearchRequest};

const SOURCE_FIELDS: &[&str] = &["original_name", "name_entry", "ark_id", "entity_type"];

pub struct ElasticSearchIndex {
    client: HttpClient,
    index: String,
}

impl ElasticSearchIndex {
    pub fn new(base_url: &str, index: impl Into<String>, timeout: Duration) -> Result<Self> {
        let index = index.into();
        if index.trim().is_empty() {
            return Err(ConcordError::Config("search index name must not be empty".into()));
        }
        Ok(Self { client: HttpClient::new(base_url, timeout)?, index })
    }
}

/// Build the `_search` request body for one query.
pub fn build_query_body(request: &SearchRequest) -> Value {
    let mut matcher = json!({ "query": request.query });
    match request.mode {
        MatchMode::AllTokens => {
            matcher["operator"] = json!("and");
        }
        MatchMode::MinimumMatch(pct) => {
            matcher["minimum_should_match"] = json!(format!("{}%", pct.min(100)));
        }
    }

    let mut bool_query = json!({
        "must": [ { "match": { (request.field.as_str()): matcher } } ]
    });
    if let Some(entity_type) = request.entity_type {
        bool_query["filter"] = json!([ { "term": { "entity_type": entity_type.as_str() } } ]);
    }

    let mut source: Vec<&str> = SOURCE_FIELDS.to_vec();
    if request.include_degree {
        source.push("degree");
    }

    json!({
        "size": request.limit,
        "_source": source,
        "query": { "bool": bool_query },
    })
}

/// Pull hits out of an Elasticsearch response. Hits with no id are skipped.
pub fn parse_hits(resp: &Value) -> Vec<SearchHit> {
    resp["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|h| {
                    let id = match &h["_id"] {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    let src = &h["_source"];
                    Some(SearchHit {
                        id,
                        original_name: src["original_name"].as_str().unwrap_or("").to_string(),
                        name_entry: src["name_entry"].as_str().map(String::from),
                        ark_id: src["ark_id"].as_str().map(String::from),
                        entity_type: src["entity_type"].as_str().and_then(|t| t.parse().ok()),
                        relevance: h["_score"].as_f64().unwrap_or(0.0),
                        degree: src["degree"].as_u64().map(|d| d.min(u32::MAX as u64) as u32),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SearchIndex for ElasticSearchIndex {
    #[instrument(skip(self), fields(index = %self.index))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let url = self.client.url(&[&self.index, "_search"])?;
        let body = build_query_body(request);

        let resp = self.client
            .post(url)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ConcordError::Collaborator(format!(
                "search index returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let json = resp.json::<Value>().await?;
        let hits = parse_hits(&json);
        debug!(count = hits.len(), "Search index returned hits");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchField;
    use concord_common::EntityType;
    use pretty_assertions::assert_eq;

    fn request(mode: MatchMode) -> SearchRequest {
        SearchRequest {
            query: "George Washington".into(),
            field: SearchField::NameEntry,
            mode,
            entity_type: None,
            limit: 10,
            include_degree: false,
        }
    }

    #[test]
    fn test_and_query_body() {
        let body = build_query_body(&request(MatchMode::AllTokens));
        assert_eq!(
            body["query"]["bool"]["must"][0]["match"]["name_entry"]["operator"],
            json!("and")
        );
        assert_eq!(body["size"], json!(10));
        assert!(body["query"]["bool"].get("filter").is_none());
        assert!(!body["_source"].as_array().unwrap().contains(&json!("degree")));
    }

    #[test]
    fn test_minimum_match_body_with_filter_and_degree() {
        let mut req = request(MatchMode::MinimumMatch(75));
        req.entity_type = Some(EntityType::Person);
        req.include_degree = true;
        let body = build_query_body(&req);
        assert_eq!(
            body["query"]["bool"]["must"][0]["match"]["name_entry"]["minimum_should_match"],
            json!("75%")
        );
        assert_eq!(
            body["query"]["bool"]["filter"][0]["term"]["entity_type"],
            json!("person")
        );
        assert!(body["_source"].as_array().unwrap().contains(&json!("degree")));
    }

    #[test]
    fn test_parse_hits() {
        let resp = json!({
            "hits": { "hits": [
                { "_id": "1", "_score": 12.4,
                  "_source": { "original_name": "Washington, George", "entity_type": "person", "degree": 4 } },
                { "_id": 2, "_score": 8.1,
                  "_source": { "original_name": "Washington, George (Mrs.)" } },
                { "_score": 1.0, "_source": {} }
            ] }
        });
        let hits = parse_hits(&resp);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "1");
        assert_eq!(hits[0].entity_type, Some(EntityType::Person));
        assert_eq!(hits[0].degree, Some(4));
        assert_eq!(hits[1].id, "2");
        assert_eq!(hits[1].degree, None);
    }

    #[test]
    fn test_parse_hits_on_malformed_response() {
        assert!(parse_hits(&json!({ "error": "index_not_found" })).is_empty());
    }

    #[test]
    fn test_empty_index_name_is_rejected() {
        let err = ElasticSearchIndex::new("http://localhost:9200", " ", Duration::from_secs(1));
        assert!(err.is_err());
    }
}
