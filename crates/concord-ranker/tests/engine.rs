//! End-to-end behaviour of the reconciliation engine over fixed stages and
//! the in-memory collaborators.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use concord_common::{AltIdLink, CandidateRecord, ConcordError, EntityType, QueryIdentity};
use concord_ranker::stages::FixedStage;
use concord_ranker::{
    EngineBuilder, ExactOverrideWeighting, RawResult, ReconciliationEngine, Stage, SumWeighting,
};
use concord_sources::{MemoryIdentityStore, MemorySearchIndex};
use pretty_assertions::assert_eq;
use concord_test_utils::{
    assert_close, crowd, george_washington_query, init_tracing, washington_index,
    washington_store, WASHINGTON_VIAF,
};

fn rec(id: &str) -> CandidateRecord {
    CandidateRecord::new(id, format!("Candidate {id}"))
}

fn fixed(name: &str, results: Vec<RawResult>) -> Arc<dyn Stage> {
    Arc::new(FixedStage::new(name, results))
}

fn engine_of(stages: Vec<Arc<dyn Stage>>) -> ReconciliationEngine {
    stages
        .into_iter()
        .try_fold(EngineBuilder::new(), EngineBuilder::add_stage)
        .and_then(EngineBuilder::build)
        .unwrap()
}

fn ranked_ids(out: &concord_ranker::Reconciliation) -> Vec<String> {
    out.results()
        .iter()
        .map(|c| c.record.id.clone().unwrap_or_default())
        .collect()
}

fn query() -> QueryIdentity {
    QueryIdentity::new("Anyone")
}

// ── Worked scenario ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_george_washington_scenario() {
    init_tracing();
    let engine = engine_of(vec![
        fixed("A", vec![RawResult::scoped(rec("1"), 12.4), RawResult::scoped(rec("2"), 8.1)]),
        fixed("B", vec![RawResult::global(2.89)]),
        fixed("C", vec![RawResult::scoped(rec("1"), 6.93), RawResult::scoped(rec("2"), 0.0)]),
    ]);

    let out = engine.reconcile(&george_washington_query()).await;

    assert_eq!(ranked_ids(&out), vec!["1", "2"]);
    assert_close(out.results()[0].score, 22.22, 1e-9);
    assert_close(out.results()[1].score, 10.99, 1e-9);
    assert_close(out.top_value(), 22.22, 1e-9);
    assert_eq!(out.top_result().and_then(|r| r.id.as_deref()), Some("1"));

    let top = out.top_vector().unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(top.get("B"), Some(2.89));
    assert_eq!(out.results()[1].vector.get("C"), Some(0.0));
}

// ── Ranking properties ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconcile_is_deterministic() {
    let engine = engine_of(vec![
        fixed("a", vec![RawResult::scoped(rec("1"), 3.0), RawResult::scoped(rec("2"), 7.0)]),
        fixed("g", vec![RawResult::global(1.0)]),
        fixed("b", vec![RawResult::scoped(rec("3"), 7.0)]),
    ]);
    let first = engine.reconcile(&query()).await;
    let second = engine.reconcile(&query()).await;
    assert_eq!(first.results(), second.results());
}

#[tokio::test]
async fn test_ties_keep_first_seen_order() {
    let engine = engine_of(vec![
        fixed("a", vec![
            RawResult::scoped(rec("x"), 1.0),
            RawResult::scoped(rec("y"), 5.0),
            RawResult::scoped(rec("z"), 1.0),
        ]),
        fixed("b", vec![RawResult::scoped(rec("w"), 1.0)]),
    ]);
    let out = engine.reconcile(&query()).await;
    assert_eq!(ranked_ids(&out), vec!["y", "x", "z", "w"]);
}

#[tokio::test]
async fn test_global_modifier_amplifies_without_creating_candidates() {
    let engine = engine_of(vec![
        fixed("g", vec![RawResult::global(4.0)]),
        fixed("a", vec![RawResult::scoped(rec("1"), 1.0), RawResult::scoped(rec("2"), 2.0)]),
    ]);
    let out = engine.reconcile(&query()).await;
    assert_eq!(out.candidate_count(), 2);
    assert_eq!(out.results()[0].score, 6.0);
    assert_eq!(out.results()[1].score, 5.0);

    let globals_only = engine_of(vec![fixed("g", vec![RawResult::global(4.0)])]);
    let out = globals_only.reconcile(&query()).await;
    assert!(out.is_empty());
    assert_eq!(out.top_value(), 0.0);
}

#[tokio::test]
async fn test_exact_match_dominates_under_override() {
    let stages = vec![
        fixed("exact_link", vec![RawResult::scoped(rec("2"), 100.0)]),
        fixed("name", vec![RawResult::scoped(rec("1"), 150.0), RawResult::scoped(rec("2"), -80.0)]),
    ];
    let engine = stages
        .clone()
        .into_iter()
        .try_fold(EngineBuilder::new(), EngineBuilder::add_stage)
        .unwrap()
        .weighting(Arc::new(ExactOverrideWeighting::new()))
        .build()
        .unwrap();
    let out = engine.reconcile(&query()).await;
    assert_eq!(ranked_ids(&out), vec!["1", "2"]);
    assert_eq!(out.results()[1].score, 100.0);

    // Plain sum lets the penalty through.
    let summed = stages
        .into_iter()
        .try_fold(EngineBuilder::new(), EngineBuilder::add_stage)
        .unwrap()
        .weighting(Arc::new(SumWeighting))
        .build()
        .unwrap();
    let out = summed.reconcile(&query()).await;
    assert_eq!(out.results()[1].score, 20.0);
}

#[tokio::test]
async fn test_duplicate_reports_last_write_wins() {
    let engine = engine_of(vec![fixed("a", vec![
        RawResult::scoped(rec("1"), 2.0),
        RawResult::scoped(rec("1"), 9.0),
    ])]);
    let out = engine.reconcile(&query()).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out.top_value(), 9.0);
}

#[tokio::test]
async fn test_result_cap() {
    let index = crowd(100, "John Smith")
        .into_iter()
        .fold(MemorySearchIndex::new(), MemorySearchIndex::with);
    let engine = EngineBuilder::new()
        .search_index(Arc::new(index))
        .configure_stage("preferred_name", &json!({ "limit": 100 }))
        .and_then(EngineBuilder::build)
        .unwrap();

    let out = engine.reconcile(&QueryIdentity::new("John Smith")).await;
    assert_eq!(out.candidate_count(), 100);
    assert_eq!(out.len(), 25);
    let expected: Vec<String> = (0..25).map(|i| format!("p{i}")).collect();
    assert_eq!(ranked_ids(&out), expected);

    let narrow = EngineBuilder::new()
        .search_index(Arc::new(crowd(10, "John Smith").into_iter().fold(MemorySearchIndex::new(), MemorySearchIndex::with)))
        .configure_stage("preferred_name", &Value::Null)
        .map(|b| b.num_results(3))
        .and_then(EngineBuilder::build)
        .unwrap();
    assert_eq!(narrow.reconcile(&QueryIdentity::new("John Smith")).await.len(), 3);
}

// ── Built-in stages over in-memory collaborators ────────────────────────────

fn washington_engine(index: Arc<MemorySearchIndex>, store: Arc<MemoryIdentityStore>) -> ReconciliationEngine {
    EngineBuilder::new()
        .search_index(index)
        .identity_store(store)
        .configure_stage("exact_link", &Value::Null)
        .and_then(|b| b.configure_stage("original_name", &Value::Null))
        .and_then(|b| b.configure_stage("chain", &json!({ "stages": ["original_name", "entity_type"] })))
        .map(|b| b.weighting(Arc::new(ExactOverrideWeighting::new())))
        .and_then(EngineBuilder::build)
        .unwrap()
}

#[tokio::test]
async fn test_entity_type_discount_in_chain() {
    init_tracing();
    let engine = washington_engine(Arc::new(washington_index()), Arc::new(washington_store()));
    let out = engine.reconcile(&george_washington_query()).await;

    // president, namesake, then the university pushed down by the -50 discount.
    assert_eq!(ranked_ids(&out), vec!["1", "3", "2"]);
    assert_close(out.results()[1].score, 9.0, 1e-9);
    assert_close(out.results()[2].score, 8.1 - 50.0, 1e-9);
    assert_eq!(out.results()[2].vector.get("original_name:entity_type"), Some(-50.0));
}

#[tokio::test]
async fn test_untyped_query_gets_no_discount() {
    let engine = washington_engine(Arc::new(washington_index()), Arc::new(washington_store()));
    let untyped = QueryIdentity::new("Washington, George").with_original("George Washington");
    let out = engine.reconcile(&untyped).await;
    assert_eq!(ranked_ids(&out), vec!["1", "3", "2"]);
    assert!(out.results().iter().all(|c| c.vector.get("original_name:entity_type") == Some(0.0)));
}

#[tokio::test]
async fn test_exact_link_match_scores_override() {
    let engine = washington_engine(Arc::new(washington_index()), Arc::new(washington_store()));
    let linked = george_washington_query().with_link(AltIdLink::same_as(WASHINGTON_VIAF));
    let out = engine.reconcile(&linked).await;
    assert_eq!(ranked_ids(&out), vec!["1", "3", "2"]);
    assert_eq!(out.top_value(), 100.0);
    assert_eq!(out.top_vector().and_then(|v| v.get("exact_link")), Some(100.0));
}

#[tokio::test]
async fn test_chain_only_scores_upstream_candidates() {
    let engine = EngineBuilder::new()
        .search_index(Arc::new(washington_index()))
        .configure_stage("chain", &json!({ "stages": [
            { "name": "preferred_name" },
            { "name": "degree" }
        ] }))
        .and_then(EngineBuilder::build)
        .unwrap();
    let out = engine.reconcile(&george_washington_query()).await;

    // Only the exact name-entry match survives the first step.
    assert_eq!(ranked_ids(&out), vec!["1"]);
    assert_close(out.top_value(), 5.0 * 12f64.ln(), 1e-9);
    assert_eq!(out.stage_names(), vec!["preferred_name:degree"]);
}

#[tokio::test]
async fn test_length_global_with_index_and_degree_chain() {
    let engine = EngineBuilder::new()
        .search_index(Arc::new(washington_index()))
        .configure_stage("original_length", &Value::Null)
        .and_then(|b| b.configure_stage("original_name", &Value::Null))
        .and_then(|b| b.configure_stage("chain", &json!({ "stages": ["original_name", "degree"] })))
        .and_then(EngineBuilder::build)
        .unwrap();
    let out = engine.reconcile(&george_washington_query()).await;

    // "George Washington" is 17 characters.
    let length = 17f64.ln();
    assert_eq!(ranked_ids(&out), vec!["1", "2", "3"]);
    let top = out.top_vector().unwrap();
    assert_close(top.get("original_length").unwrap(), length, 1e-12);
    assert_eq!(top.get("original_name"), Some(12.4));
    assert_close(top.get("original_name:degree").unwrap(), 5.0 * 12f64.ln(), 1e-12);
    assert_close(out.top_value(), 12.4 + length + 5.0 * 12f64.ln(), 1e-9);
    assert_close(out.results()[1].score, 8.1 + length + 5.0 * 3f64.ln(), 1e-9);
    assert_close(out.results()[2].score, 9.0 + length, 1e-9);
}

#[tokio::test]
async fn test_exact_link_chain_reads_relation_counts() {
    let engine = EngineBuilder::new()
        .identity_store(Arc::new(washington_store()))
        .configure_stage("chain", &json!({ "stages": ["exact_link", "degree"] }))
        .and_then(EngineBuilder::build)
        .unwrap();
    let linked = george_washington_query().with_link(AltIdLink::same_as(WASHINGTON_VIAF));
    let out = engine.reconcile(&linked).await;

    assert_eq!(ranked_ids(&out), vec!["1"]);
    assert_close(
        out.top_vector().and_then(|v| v.get("exact_link:degree")).unwrap(),
        5.0 * 12f64.ln(),
        1e-12,
    );
}

#[tokio::test]
async fn test_index_outage_degrades_to_remaining_stages() {
    let index = Arc::new(washington_index());
    let store = Arc::new(washington_store());
    let engine = washington_engine(index.clone(), store);
    index.set_available(false);

    let linked = george_washington_query().with_link(AltIdLink::same_as(WASHINGTON_VIAF));
    let out = engine.reconcile(&linked).await;
    assert_eq!(ranked_ids(&out), vec!["1"]);
    assert_eq!(out.raw_results("original_name").map(|r| r.len()), Some(0));

    let unlinked = engine.reconcile(&george_washington_query()).await;
    assert!(unlinked.is_empty());
}

#[tokio::test]
async fn test_slow_index_times_out() {
    let index = Arc::new(washington_index());
    index.set_delay(Some(Duration::from_secs(2)));
    let engine = EngineBuilder::new()
        .search_index(index.clone())
        .identity_store(Arc::new(washington_store()))
        .configure_stage("exact_link", &Value::Null)
        .and_then(|b| b.configure_stage("original_name", &Value::Null))
        .map(|b| b.stage_timeout(Duration::from_millis(50)))
        .and_then(EngineBuilder::build)
        .unwrap();

    let t0 = Instant::now();
    let linked = george_washington_query().with_link(AltIdLink::same_as(WASHINGTON_VIAF));
    let out = engine.reconcile(&linked).await;
    assert!(t0.elapsed() < Duration::from_secs(1));
    assert_eq!(ranked_ids(&out), vec!["1"]);
    assert_eq!(out.top_vector().map(|v| v.len()), Some(1));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let engine = engine_of(vec![fixed("a", vec![RawResult::scoped(rec("1"), 1.0)])]);
    let token = CancellationToken::new();
    token.cancel();
    let out = engine.reconcile_with_cancel(&query(), token).await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_cancelled_mid_call() {
    let index = Arc::new(washington_index());
    index.set_delay(Some(Duration::from_secs(5)));
    let engine = EngineBuilder::new()
        .search_index(index)
        .configure_stage("original_name", &Value::Null)
        .map(|b| b.stage_timeout(Duration::from_secs(30)))
        .and_then(EngineBuilder::build)
        .unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let t0 = Instant::now();
    let out = engine.reconcile_with_cancel(&george_washington_query(), token).await;
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_engine_is_shared_across_tasks() {
    let engine = Arc::new(washington_engine(Arc::new(washington_index()), Arc::new(washington_store())));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reconcile(&george_washington_query()).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for h in handles {
        outcomes.push(ranked_ids(&h.await.unwrap()));
    }
    assert!(outcomes.iter().all(|ids| ids == &outcomes[0]));
}

// ── Configuration-time failures ─────────────────────────────────────────────

#[test]
fn test_unknown_stage_fails_at_configuration() {
    let err = EngineBuilder::new()
        .configure_stage("soundex", &Value::Null)
        .err()
        .unwrap();
    assert!(matches!(err, ConcordError::UnknownStage(ref n) if n == "soundex"));
}

#[test]
fn test_index_stage_without_index_fails_at_configuration() {
    let err = EngineBuilder::new()
        .configure_stage("fuzzy_name", &Value::Null)
        .err()
        .unwrap();
    assert!(err.is_configuration());
}

#[test]
fn test_entity_type_fixture_sanity() {
    let q = george_washington_query();
    assert_eq!(q.entity_type, Some(EntityType::Person));
    assert_eq!(q.match_string(), "George Washington");
}
