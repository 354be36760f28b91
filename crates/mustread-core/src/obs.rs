//! Structured observability hooks for batch and item lifecycle events.
//!
//! Every event carries an `event` field naming its kind and, where it
//! applies, the `paper_id`. Verbosity is controlled through `MUSTREAD_LOG`
//! (see [`crate::telemetry`]).

use tracing::{debug, info, warn};

use crate::coordinator::BatchSummary;
use crate::roles::RoleKind;

/// Span grouping every event emitted while one paper is analysed.
pub fn item_span(paper_id: &str) -> tracing::Span {
    tracing::info_span!("mustread.item", paper_id = %paper_id)
}

/// Span grouping every event emitted by one batch.
pub fn batch_span(batch_id: &str) -> tracing::Span {
    tracing::info_span!("mustread.batch", batch_id = %batch_id)
}

pub fn emit_batch_started(batch_id: &str, items: usize) {
    info!(event = "batch.started", batch_id = %batch_id, items = items);
}

pub fn emit_batch_finished(batch_id: &str, summary: &BatchSummary, duration_ms: u64) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        conflicted = summary.conflicted,
        duration_ms = duration_ms,
    );
}

pub fn emit_item_started(paper_id: &str, title: &str) {
    info!(event = "item.started", paper_id = %paper_id, title = %title);
}

pub fn emit_role_completed(paper_id: &str, role: RoleKind) {
    debug!(event = "role.completed", paper_id = %paper_id, role = %role);
}

pub fn emit_item_succeeded(paper_id: &str, conflicts: usize) {
    info!(event = "item.succeeded", paper_id = %paper_id, conflicts = conflicts);
}

/// Item failure (warning level).
pub fn emit_item_failed(paper_id: &str, role: Option<RoleKind>, reason: &str) {
    match role {
        Some(role) => {
            warn!(event = "item.failed", paper_id = %paper_id, role = %role, reason = %reason)
        }
        None => warn!(event = "item.failed", paper_id = %paper_id, reason = %reason),
    }
}

pub fn emit_conflict_detected(paper_id: &str, aspects: &[&str]) {
    info!(
        event = "conflict.detected",
        paper_id = %paper_id,
        aspects = %aspects.join(","),
    );
}

/// Arbitration failure (warning level). The item itself still succeeds.
pub fn emit_arbitration_failed(paper_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "arbitration.failed", paper_id = %paper_id, error = %error);
}
