//! Workflow coordinator: runs the role pipeline over a batch of papers.
//!
//! For each paper the four roles run in [`RoleKind::PIPELINE`] order, each
//! seeing the outputs produced before it. The first failing role stops that
//! paper only; its partial bundle is discarded and the batch moves on. A
//! completed bundle is handed to the [`ConflictResolver`], whose failures
//! never downgrade the paper.
//!
//! Results always line up positionally with the input, even when
//! `max_concurrent > 1` lets several papers be in flight at once.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::CoordinatorSettings;
use crate::conflict::{ConflictReport, ConflictResolver};
use crate::domain::Paper;
use crate::error::{ArbitrationError, ConfigError, RoleInvocationError, SetupError};
use crate::obs;
use crate::roles::{OutputBundle, Role, RoleKind, RoleOutput, RoleSet};

/// Caller-owned cancellation signal. Sending `true` aborts in-flight papers.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation pair. Keep the sender; pass the receiver to
/// [`WorkflowCoordinator::run_with_cancel`].
pub fn cancel_channel() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// A paper whose four roles all completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSuccess {
    pub paper_id: String,
    pub title: String,
    pub bundle: OutputBundle,
    pub conflicts: ConflictReport,
}

/// A paper whose analysis stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub paper_id: String,
    pub title: String,
    /// The role that was attempted and did not complete. `None` when the
    /// paper was never started.
    pub failed_role: Option<RoleKind>,
    /// Human-readable cause, e.g. `"Classifier error: backend unavailable: ..."`.
    pub reason: String,
}

impl ItemFailure {
    /// Roles that were never attempted for this paper.
    pub fn skipped_roles(&self) -> Vec<RoleKind> {
        match self.failed_role {
            Some(role) => role.downstream().to_vec(),
            None => RoleKind::PIPELINE.to_vec(),
        }
    }
}

/// Outcome for one input paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Success(ItemSuccess),
    Failure(ItemFailure),
}

impl ItemResult {
    pub fn paper_id(&self) -> &str {
        match self {
            ItemResult::Success(s) => &s.paper_id,
            ItemResult::Failure(f) => &f.paper_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Success(_))
    }

    pub fn as_success(&self) -> Option<&ItemSuccess> {
        match self {
            ItemResult::Success(s) => Some(s),
            ItemResult::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ItemFailure> {
        match self {
            ItemResult::Failure(f) => Some(f),
            ItemResult::Success(_) => None,
        }
    }
}

/// Aggregate counts over a batch's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successes carrying a non-empty conflict report.
    pub conflicted: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ItemResult]) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                ItemResult::Success(s) => {
                    summary.succeeded += 1;
                    if !s.conflicts.is_empty() {
                        summary.conflicted += 1;
                    }
                }
                ItemResult::Failure(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Why the role phase stopped for a paper.
#[derive(Debug)]
enum StopCause {
    Error(RoleInvocationError),
    TimedOut(Duration),
    Cancelled,
}

/// The role that stopped a paper, and why.
#[derive(Debug)]
struct RoleStop {
    role: RoleKind,
    cause: StopCause,
}

impl RoleStop {
    fn reason(&self) -> String {
        match &self.cause {
            StopCause::Error(e) => format!("{} error: {e}", self.role),
            StopCause::TimedOut(limit) => {
                format!("{} timed out after {}s", self.role, limit.as_secs())
            }
            StopCause::Cancelled => format!("{} cancelled", self.role),
        }
    }
}

/// Sequences the role pipeline over batches of papers.
///
/// Holds no state between batches.
pub struct WorkflowCoordinator {
    roles: RoleSet,
    resolver: ConflictResolver,
    max_concurrent: usize,
    item_timeout: Option<Duration>,
}

impl WorkflowCoordinator {
    /// Returns [`SetupError::Config`] when `settings.max_concurrent` is zero.
    pub fn new(
        roles: RoleSet,
        resolver: ConflictResolver,
        settings: &CoordinatorSettings,
    ) -> Result<Self, SetupError> {
        if settings.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.max_concurrent must be at least 1".to_string(),
            )
            .into());
        }
        Ok(Self {
            roles,
            resolver,
            max_concurrent: settings.max_concurrent,
            item_timeout: settings.item_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Analyse `papers` with no cancellation.
    ///
    /// Returns exactly one result per paper, in input order.
    pub async fn run(&self, papers: &[Paper]) -> Vec<ItemResult> {
        // The sender is dropped immediately, so the signal never fires.
        let (_, cancel) = cancel_channel();
        self.run_with_cancel(papers, cancel).await
    }

    /// Analyse `papers`, aborting in-flight papers when `cancel` flips to `true`.
    ///
    /// Papers finished before cancellation keep their results; in-flight and
    /// not-yet-started papers become failures. Returns exactly one result per
    /// paper, in input order.
    pub async fn run_with_cancel(&self, papers: &[Paper], cancel: CancelSignal) -> Vec<ItemResult> {
        let batch_id = Uuid::new_v4().to_string();
        let span = obs::batch_span(&batch_id);

        async {
            obs::emit_batch_started(&batch_id, papers.len());
            let started = std::time::Instant::now();

            let results: Vec<ItemResult> = stream::iter(papers)
                .map(|paper| {
                    let cancel = cancel.clone();
                    self.analyse_item(paper, cancel)
                        .instrument(obs::item_span(&paper.id))
                })
                .buffered(self.max_concurrent)
                .collect()
                .await;

            let summary = BatchSummary::from_results(&results);
            obs::emit_batch_finished(&batch_id, &summary, started.elapsed().as_millis() as u64);
            results
        }
        .instrument(span)
        .await
    }

    async fn analyse_item(&self, paper: &Paper, mut cancel: CancelSignal) -> ItemResult {
        let already_cancelled = *cancel.borrow();
        if already_cancelled {
            let reason = "cancelled before analysis started".to_string();
            obs::emit_item_failed(&paper.id, None, &reason);
            return ItemResult::Failure(ItemFailure {
                paper_id: paper.id.clone(),
                title: paper.title.clone(),
                failed_role: None,
                reason,
            });
        }

        obs::emit_item_started(&paper.id, &paper.title);
        let deadline = self.item_timeout.map(|limit| (Instant::now() + limit, limit));

        match self.run_roles(paper, deadline, &mut cancel).await {
            Ok(bundle) => {
                let conflicts = self
                    .resolve_conflicts(paper, &bundle, deadline, &mut cancel)
                    .await;
                obs::emit_item_succeeded(&paper.id, conflicts.conflicts.len());
                ItemResult::Success(ItemSuccess {
                    paper_id: paper.id.clone(),
                    title: paper.title.clone(),
                    bundle,
                    conflicts,
                })
            }
            Err(stop) => {
                let reason = stop.reason();
                obs::emit_item_failed(&paper.id, Some(stop.role), &reason);
                ItemResult::Failure(ItemFailure {
                    paper_id: paper.id.clone(),
                    title: paper.title.clone(),
                    failed_role: Some(stop.role),
                    reason,
                })
            }
        }
    }

    /// Run every role in order, stopping at the first one that does not complete.
    async fn run_roles(
        &self,
        paper: &Paper,
        deadline: Option<(Instant, Duration)>,
        cancel: &mut CancelSignal,
    ) -> Result<OutputBundle, RoleStop> {
        let mut bundle = OutputBundle::new();

        for role in self.roles.in_order() {
            let kind = role.kind();
            let output = invoke_role(role.as_ref(), paper, &bundle, deadline, cancel)
                .await
                .map_err(|cause| RoleStop { role: kind, cause })?;

            let produced = output.producing_role();
            if produced != kind {
                return Err(RoleStop {
                    role: kind,
                    cause: StopCause::Error(RoleInvocationError::UnexpectedOutput {
                        expected: kind,
                        actual: produced,
                    }),
                });
            }

            bundle.insert(output);
            obs::emit_role_completed(&paper.id, kind);
        }

        Ok(bundle)
    }

    /// Arbitration shares the item deadline with the role phase. Failure,
    /// timeout and cancellation all leave an empty report.
    async fn resolve_conflicts(
        &self,
        paper: &Paper,
        bundle: &OutputBundle,
        deadline: Option<(Instant, Duration)>,
        cancel: &mut CancelSignal,
    ) -> ConflictReport {
        let bounded = async {
            match deadline {
                Some((at, limit)) => {
                    match tokio::time::timeout_at(at, self.resolver.try_resolve(paper, bundle))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ArbitrationError::TimedOut(limit.as_secs())),
                    }
                }
                None => self.resolver.try_resolve(paper, bundle).await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancelled(cancel) => Err(ArbitrationError::Cancelled),
            outcome = bounded => outcome,
        };

        match outcome {
            Ok(report) => report,
            Err(e) => {
                obs::emit_arbitration_failed(&paper.id, &e);
                ConflictReport::default()
            }
        }
    }
}

async fn invoke_role(
    role: &dyn Role,
    paper: &Paper,
    prior: &OutputBundle,
    deadline: Option<(Instant, Duration)>,
    cancel: &mut CancelSignal,
) -> Result<RoleOutput, StopCause> {
    let bounded = async {
        match deadline {
            Some((at, limit)) => match tokio::time::timeout_at(at, role.invoke(paper, prior)).await
            {
                Ok(result) => result.map_err(StopCause::Error),
                Err(_) => Err(StopCause::TimedOut(limit)),
            },
            None => role.invoke(paper, prior).await.map_err(StopCause::Error),
        }
    };

    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(StopCause::Cancelled),
        result = bounded => result,
    }
}

/// Resolves once the signal reads `true`. Pends forever if the sender is
/// gone without having cancelled.
async fn cancelled(cancel: &mut CancelSignal) {
    let sender_gone = cancel.wait_for(|c| *c).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}
