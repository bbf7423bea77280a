//! Wires configuration into a running engine.

use anyhow::{bail, Context};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use concord_common::QueryIdentity;
use concord_config::{ConcordConfig, EngineConfig, WeightingKind};
use concord_ranker::{
    EngineBuilder, ExactOverrideWeighting, ReconciliationEngine, StageRegistry, SumWeighting,
    WeightingFunction,
};
use concord_sources::{ElasticSearchIndex, RestIdentityStore};

pub fn stage_names() -> Vec<String> {
    StageRegistry::with_builtin_stages()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn weighting_for(engine: &EngineConfig) -> Arc<dyn WeightingFunction> {
    match engine.weighting {
        WeightingKind::Sum => Arc::new(SumWeighting),
        WeightingKind::SumWithOverride => {
            Arc::new(ExactOverrideWeighting::with_key(engine.exact_link_key.clone()))
        }
    }
}

pub fn build_engine(config: &ConcordConfig) -> anyhow::Result<ReconciliationEngine> {
    let mut builder = EngineBuilder::new()
        .num_results(config.engine.num_results)
        .stage_timeout(config.engine.stage_timeout())
        .weighting(weighting_for(&config.engine));

    if let Some(search) = &config.search {
        let index = ElasticSearchIndex::new(
            &search.base_url,
            search.index.clone(),
            Duration::from_secs(search.timeout_secs),
        )?;
        info!(url = %search.base_url, index = %search.index, "Search index configured");
        builder = builder.search_index(Arc::new(index));
    }

    if let Some(store) = &config.store {
        let client = RestIdentityStore::new(&store.base_url, Duration::from_secs(store.timeout_secs))?;
        info!(url = %store.base_url, "Identity store configured");
        builder = builder.identity_store(Arc::new(client));
    }

    for spec in &config.engine.stages {
        builder = builder
            .configure_stage(&spec.name, &spec.args)
            .with_context(|| format!("configuring stage '{}'", spec.name))?;
    }

    Ok(builder.build()?)
}

/// Read a query identity from a JSON file, or stdin when `source` is `-`.
/// A bare JSON string is taken as the name.
pub fn read_query(source: &str) -> anyhow::Result<QueryIdentity> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading query from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading query file {source}"))?
    };
    parse_query(&text)
}

pub fn parse_query(text: &str) -> anyhow::Result<QueryIdentity> {
    let value: serde_json::Value = serde_json::from_str(text).context("query is not valid JSON")?;
    let query = match value {
        serde_json::Value::String(name) => QueryIdentity::new(name),
        other => serde_json::from_value(other).context("query does not describe an identity")?,
    };
    if query.is_blank() {
        bail!("query identity has neither a name nor an original string");
    }
    Ok(query)
}
