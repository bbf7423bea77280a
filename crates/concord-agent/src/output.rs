use serde::Serialize;
use std::fmt::Write;

use concord_ranker::{FeatureVector, Reconciliation};

#[derive(Debug, Serialize)]
pub struct ResultRow<'a> {
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub score: f64,
    pub vector: &'a FeatureVector,
}

pub fn rows(outcome: &Reconciliation, top: Option<usize>) -> Vec<ResultRow<'_>> {
    outcome
        .results()
        .iter()
        .take(top.unwrap_or(usize::MAX))
        .map(|c| ResultRow {
            id: c.record.id.as_deref(),
            name: &c.record.name_entry,
            score: c.score,
            vector: &c.vector,
        })
        .collect()
}

pub fn render_json(rows: &[ResultRow<'_>]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

pub fn render_table(rows: &[ResultRow<'_>]) -> String {
    if rows.is_empty() {
        return "No candidates found.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:>4}  {:>9}  {:<12}  {:<40}  features", "rank", "score", "id", "name");
    for (i, row) in rows.iter().enumerate() {
        let features = row.vector
            .iter()
            .map(|(k, v)| format!("{k}={v:.2}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            "{:>4}  {:>9.2}  {:<12}  {:<40}  {}",
            i + 1,
            row.score,
            row.id.unwrap_or("-"),
            row.name,
            features
        );
    }
    out
}
