use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::coordinator::{BatchSummary, ItemResult, ItemSuccess};

/// Version of the persisted results artifact layout.
pub const SCHEMA_VERSION: &str = "1.0";

/// Canonical batch results artifact written by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub results: Vec<ItemResult>,
}

impl ResultsArtifact {
    pub fn new(results: Vec<ItemResult>, generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at,
            summary: BatchSummary::from_results(&results),
            results,
        }
    }
}

/// Write the results artifact in pretty JSON format.
///
/// JSON has no NaN or infinity. Non-finite scores and confidences are written
/// as `null` and read back as NaN, so the artifact still loads and the value
/// still fails range validation.
pub fn write_results_json(path: &Path, artifact: &ResultsArtifact) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact).context("serialize results artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

fn score_of(item: &ItemSuccess) -> f64 {
    item.bundle.score().map(|s| s.score).unwrap_or(f64::NAN)
}

/// Descending by score; non-finite scores sink to the bottom.
fn by_score_desc(a: &ItemSuccess, b: &ItemSuccess) -> Ordering {
    let (sa, sb) = (score_of(a), score_of(b));
    match (sa.is_finite(), sb.is_finite()) {
        (true, true) => sb.total_cmp(&sa),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

fn render_success(out: &mut String, rank: usize, item: &ItemSuccess) {
    out.push_str(&format!("### {}. {}\n\n", rank, item.title));
    out.push_str(&format!("- id: `{}`\n", item.paper_id));
    match item.bundle.score() {
        Some(score) => out.push_str(&format!("- score: {:.1}/10\n", score.score)),
        None => out.push_str("- score: n/a\n"),
    }
    if let Some(class) = item.bundle.classification() {
        out.push_str(&format!(
            "- category: {} (confidence {:.2})\n",
            class.category, class.confidence
        ));
    }
    if let Some(novelty) = item.bundle.novelty() {
        out.push_str(&format!(
            "- novelty: {} ({:.1}/10)\n",
            novelty.level_label(),
            novelty.score
        ));
    }
    if let Some(summary) = item.bundle.summary() {
        if !summary.innovations.trim().is_empty() {
            out.push_str(&format!("- innovations: {}\n", summary.innovations.trim()));
        }
    }
    if let Some(score) = item.bundle.score() {
        if !score.rationale.trim().is_empty() {
            out.push_str(&format!("- rationale: {}\n", score.rationale.trim()));
        }
    }
    if !item.conflicts.conflicts.is_empty() {
        out.push_str("- conflicts:\n");
        for c in &item.conflicts.conflicts {
            out.push_str(&format!("  - `{}`: {}\n", c.aspect, c.detail));
        }
    }
    if let Some(resolution) = &item.conflicts.resolution {
        out.push_str(&format!("- resolution: {}\n", resolution.trim()));
    }
    out.push('\n');
}

/// Render the ranked markdown digest of a batch.
///
/// Successful papers are listed by score, highest first; ties keep input
/// order. Failures follow with their reasons.
pub fn render_ranked_report(results: &[ItemResult], generated_at: DateTime<Utc>) -> String {
    let summary = BatchSummary::from_results(results);
    let mut out = String::new();
    out.push_str("# Paper Triage Report\n\n");
    out.push_str(&format!("Generated: {}\n\n", generated_at.to_rfc3339()));
    out.push_str("## Summary\n");
    out.push_str(&format!(
        "- papers: {}\n- analysed: {}\n- failed: {}\n- with conflicts: {}\n\n",
        summary.total, summary.succeeded, summary.failed, summary.conflicted
    ));

    let mut ranked: Vec<&ItemSuccess> = results.iter().filter_map(ItemResult::as_success).collect();
    ranked.sort_by(|a, b| by_score_desc(a, b));

    if !ranked.is_empty() {
        out.push_str("## Ranked Papers\n\n");
        for (i, item) in ranked.iter().enumerate() {
            render_success(&mut out, i + 1, item);
        }
    }

    let failures: Vec<_> = results.iter().filter_map(ItemResult::as_failure).collect();
    if !failures.is_empty() {
        out.push_str(&format!("## {} papers failed analysis:\n\n", failures.len()));
        for f in failures {
            out.push_str(&format!("- {} (`{}`): {}\n", f.title, f.paper_id, f.reason));
        }
    }
    out
}

/// Write the ranked markdown report.
pub fn write_ranked_report(
    path: &Path,
    results: &[ItemResult],
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let md = render_ranked_report(results, generated_at);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
