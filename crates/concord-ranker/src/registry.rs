//! Stage registry: maps a configuration name to a factory.
//!
//! Registry lifecycle:
//!   1. `StageRegistry::with_builtin_stages()` at startup (or `new()` + `register`).
//!   2. `EngineBuilder::configure_stage(name, args)` calls `build`.
//!   3. Unknown names and malformed arguments fail there, never during `reconcile`.

use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use concord_common::{ConcordError, Result};
use concord_sources::{FieldMask, IdentityStore, SearchIndex};
use crate::stage::{pool_needs_relations, Stage};
use crate::stages::chain::CHAIN_STAGE;
use crate::stages::degree::DEGREE_STAGE;
use crate::stages::entity_type::ENTITY_TYPE_STAGE;
use crate::stages::exact_link::EXACT_LINK_STAGE;
use crate::stages::index_search::{FUZZY_NAME_STAGE, ORIGINAL_NAME_STAGE, PREFERRED_NAME_STAGE};
use crate::stages::length::{LENGTH_DIFFERENCE_STAGE, ORIGINAL_LENGTH_STAGE};
use crate::stages::{
    ChainStage, DegreeStage, EntityTypeFilter, ExactLinkStage, IndexSearchStage,
    LengthDifferenceStage, OriginalLengthStage,
};

/// Collaborators available to stage factories.
#[derive(Clone, Default)]
pub struct StageDeps {
    pub index: Option<Arc<dyn SearchIndex>>,
    pub store: Option<Arc<dyn IdentityStore>>,
}

impl StageDeps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn require_index(&self, stage: &str) -> Result<Arc<dyn SearchIndex>> {
        self.index.clone().ok_or_else(|| ConcordError::MissingCollaborator {
            stage: stage.to_string(),
            collaborator: "search index",
        })
    }

    fn require_store(&self, stage: &str) -> Result<Arc<dyn IdentityStore>> {
        self.store.clone().ok_or_else(|| ConcordError::MissingCollaborator {
            stage: stage.to_string(),
            collaborator: "identity store",
        })
    }
}

/// Validated view over a stage's constructor arguments.
///
/// `null` means "no arguments". Anything other than a table, and any key the
/// stage does not declare, is a configuration error. Every stage accepts
/// `label`, which overrides its feature-vector key.
pub struct StageArgs<'a> {
    stage: &'a str,
    map: Option<&'a Map<String, Value>>,
}

impl<'a> StageArgs<'a> {
    pub fn parse(stage: &'a str, args: &'a Value, allowed: &[&str]) -> Result<Self> {
        let map = match args {
            Value::Null => None,
            Value::Object(map) => Some(map),
            other => {
                return Err(ConcordError::invalid_args(
                    stage,
                    format!("arguments must be a table, got {other}"),
                ))
            }
        };
        if let Some(map) = map {
            if let Some(unknown) = map.keys().find(|k| k.as_str() != "label" && !allowed.contains(&k.as_str())) {
                return Err(ConcordError::invalid_args(stage, format!("unknown argument '{unknown}'")));
            }
        }
        Ok(Self { stage, map })
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(key))
    }

    pub fn usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| ConcordError::invalid_args(self.stage, format!("'{key}' must be a non-negative integer"))),
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| ConcordError::invalid_args(self.stage, format!("'{key}' must be a boolean"))),
        }
    }

    pub fn label(&self) -> Result<Option<String>> {
        match self.get("label") {
            None => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.trim().to_string())),
            Some(_) => Err(ConcordError::invalid_args(self.stage, "'label' must be a non-empty string")),
        }
    }

    pub fn array(&self, key: &str) -> Result<&'a Vec<Value>> {
        match self.get(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(ConcordError::invalid_args(self.stage, format!("'{key}' must be a list"))),
            None => Err(ConcordError::invalid_args(self.stage, format!("missing required argument '{key}'"))),
        }
    }
}

/// Builds one stage instance from its arguments.
pub type StageFactory =
    Arc<dyn Fn(&StageRegistry, &Value, &StageDeps) -> Result<Arc<dyn Stage>> + Send + Sync>;

/// Central registry mapping stage names → factories.
/// Build once at startup, then share.
#[derive(Clone, Default)]
pub struct StageRegistry {
    factories: HashMap<String, StageFactory>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Registry holding every built-in stage.
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();

        registry.register(EXACT_LINK_STAGE, |_, args, deps| {
            let args = StageArgs::parse(EXACT_LINK_STAGE, args, &["hydrate_relations"])?;
            let mask = if args.bool("hydrate_relations", false)? { FieldMask::Full } else { FieldMask::Summary };
            let mut stage = ExactLinkStage::new(deps.require_store(EXACT_LINK_STAGE)?).with_mask(mask);
            if let Some(label) = args.label()? {
                stage = stage.with_label(label);
            }
            Ok(Arc::new(stage) as Arc<dyn Stage>)
        });

        for name in [ORIGINAL_NAME_STAGE, PREFERRED_NAME_STAGE, FUZZY_NAME_STAGE] {
            registry.register(name, move |_, args, deps| build_index_stage(name, args, deps));
        }

        registry.register(ENTITY_TYPE_STAGE, |_, args, _| {
            let args = StageArgs::parse(ENTITY_TYPE_STAGE, args, &[])?;
            let mut stage = EntityTypeFilter::new();
            if let Some(label) = args.label()? {
                stage = stage.with_label(label);
            }
            Ok(Arc::new(stage) as Arc<dyn Stage>)
        });

        registry.register(ORIGINAL_LENGTH_STAGE, |_, args, _| {
            let args = StageArgs::parse(ORIGINAL_LENGTH_STAGE, args, &[])?;
            let mut stage = OriginalLengthStage::new();
            if let Some(label) = args.label()? {
                stage = stage.with_label(label);
            }
            Ok(Arc::new(stage) as Arc<dyn Stage>)
        });

        registry.register(LENGTH_DIFFERENCE_STAGE, |_, args, _| {
            let args = StageArgs::parse(LENGTH_DIFFERENCE_STAGE, args, &[])?;
            let mut stage = LengthDifferenceStage::new();
            if let Some(label) = args.label()? {
                stage = stage.with_label(label);
            }
            Ok(Arc::new(stage) as Arc<dyn Stage>)
        });

        registry.register(DEGREE_STAGE, |_, args, _| {
            let args = StageArgs::parse(DEGREE_STAGE, args, &[])?;
            let mut stage = DegreeStage::new();
            if let Some(label) = args.label()? {
                stage = stage.with_label(label);
            }
            Ok(Arc::new(stage) as Arc<dyn Stage>)
        });

        registry.register(CHAIN_STAGE, build_chain_stage);

        registry
    }

    /// Register a factory. Panics if the name is already registered.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&StageRegistry, &Value, &StageDeps) -> Result<Arc<dyn Stage>> + Send + Sync + 'static,
    {
        assert!(
            !self.factories.contains_key(name),
            "Duplicate stage name: {name}"
        );
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Construct a stage by registered name.
    pub fn build(&self, name: &str, args: &Value, deps: &StageDeps) -> Result<Arc<dyn Stage>> {
        let factory = self.factories
            .get(name)
            .ok_or_else(|| ConcordError::UnknownStage(name.to_string()))?;
        factory(self, args, deps)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn build_index_stage(name: &str, args: &Value, deps: &StageDeps) -> Result<Arc<dyn Stage>> {
    let args = StageArgs::parse(name, args, &["limit", "restrict_entity_type", "include_degree"])?;
    let index = deps.require_index(name)?;
    let limit = args.usize("limit", crate::stages::index_search::DEFAULT_SEARCH_LIMIT)?;
    if limit == 0 {
        return Err(ConcordError::invalid_args(name, "'limit' must be at least 1"));
    }

    let stage = match name {
        ORIGINAL_NAME_STAGE => IndexSearchStage::original_name(index),
        PREFERRED_NAME_STAGE => IndexSearchStage::preferred_name(index),
        _ => IndexSearchStage::fuzzy_name(index),
    };
    let mut stage = stage
        .with_limit(limit)
        .restrict_entity_type(args.bool("restrict_entity_type", false)?)
        .include_degree(args.bool("include_degree", true)?);
    if let Some(label) = args.label()? {
        stage = stage.with_label(label);
    }
    Ok(Arc::new(stage))
}

/// `stages` entries are either a bare name or `{ name, args }`.
///
/// Sub-stages are built last to first so that an `exact_link` step knows
/// whether the records it hands on will reach a stage reading relation
/// counts. If so, and `hydrate_relations` was not set explicitly, it reads
/// full records.
fn build_chain_stage(registry: &StageRegistry, args: &Value, deps: &StageDeps) -> Result<Arc<dyn Stage>> {
    let parsed = StageArgs::parse(CHAIN_STAGE, args, &["stages"])?;

    let mut entries: Vec<(&str, Value)> = Vec::new();
    for entry in parsed.array("stages")? {
        match entry {
            Value::String(name) => entries.push((name.as_str(), Value::Null)),
            Value::Object(spec) => {
                let name = spec.get("name").and_then(Value::as_str).ok_or_else(|| {
                    ConcordError::invalid_args(CHAIN_STAGE, "sub-stage entry is missing 'name'")
                })?;
                entries.push((name, spec.get("args").cloned().unwrap_or(Value::Null)));
            }
            other => {
                return Err(ConcordError::invalid_args(
                    CHAIN_STAGE,
                    format!("sub-stage entry must be a name or a table, got {other}"),
                ))
            }
        }
    }

    let mut stages: VecDeque<Arc<dyn Stage>> = VecDeque::with_capacity(entries.len());
    for (name, mut sub_args) in entries.into_iter().rev() {
        if name == EXACT_LINK_STAGE && pool_needs_relations(stages.make_contiguous()) {
            hydrate_by_default(&mut sub_args);
        }
        stages.push_front(registry.build(name, &sub_args, deps)?);
    }

    let mut chain = ChainStage::new(stages.into())?;
    if let Some(label) = parsed.label()? {
        chain = chain.with_label(label);
    }
    Ok(Arc::new(chain))
}

fn hydrate_by_default(args: &mut Value) {
    match args {
        Value::Null => *args = serde_json::json!({ "hydrate_relations": true }),
        Value::Object(map) => {
            if !map.contains_key("hydrate_relations") {
                debug!("exact_link feeds a relation-count stage; reading full records");
                map.insert("hydrate_relations".to_string(), Value::Bool(true));
            }
        }
        // Rejected by the exact_link factory.
        _ => {}
    }
}
