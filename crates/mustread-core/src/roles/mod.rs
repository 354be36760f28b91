//! Analysis roles: vocabulary and the invocation seam.
//!
//! # Module layout
//!
//! - [`output`]: `RoleOutput` and the per-role output structs
//! - [`bundle`]: `OutputBundle`, the outputs collected for one paper
//!
//! A [`Role`] turns a paper (plus the outputs of the roles that ran before
//! it) into exactly one typed [`RoleOutput`]. The coordinator never knows
//! whether a role is rule-based, LLM-backed or a test double.

pub mod bundle;
pub mod output;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Paper;
use crate::error::{RoleInvocationError, SetupError};

pub use bundle::OutputBundle;
pub use output::{
    ClassificationOutput, NoveltyLevel, NoveltyOutput, RoleOutput, ScoreOutput, SummaryOutput,
};

/// The four analysis roles.
///
/// Declaration order is pipeline order, so the derived `Ord` sorts roles the
/// way they execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Summarizer,
    Classifier,
    NoveltyAssessor,
    Scorer,
}

impl RoleKind {
    /// Fixed execution order. Later roles may read earlier outputs.
    pub const PIPELINE: [RoleKind; 4] = [
        RoleKind::Summarizer,
        RoleKind::Classifier,
        RoleKind::NoveltyAssessor,
        RoleKind::Scorer,
    ];

    /// 0-indexed position in [`RoleKind::PIPELINE`].
    pub fn position(self) -> usize {
        match self {
            RoleKind::Summarizer => 0,
            RoleKind::Classifier => 1,
            RoleKind::NoveltyAssessor => 2,
            RoleKind::Scorer => 3,
        }
    }

    /// Roles that run after this one.
    pub fn downstream(self) -> &'static [RoleKind] {
        &Self::PIPELINE[self.position() + 1..]
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoleKind::Summarizer => "Summarizer",
            RoleKind::Classifier => "Classifier",
            RoleKind::NoveltyAssessor => "NoveltyAssessor",
            RoleKind::Scorer => "Scorer",
        };
        write!(f, "{s}")
    }
}

/// An analysis capability.
///
/// Implementations must be safe to call concurrently for different papers.
#[async_trait]
pub trait Role: Send + Sync {
    /// The pipeline slot this role fills.
    fn kind(&self) -> RoleKind;

    /// Analyse `paper`. `prior` holds every output produced so far for it.
    async fn invoke(
        &self,
        paper: &Paper,
        prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError>;
}

/// The four roles, one per pipeline slot.
#[derive(Clone)]
pub struct RoleSet {
    summarizer: Arc<dyn Role>,
    classifier: Arc<dyn Role>,
    novelty_assessor: Arc<dyn Role>,
    scorer: Arc<dyn Role>,
}

impl RoleSet {
    /// Returns [`SetupError::RoleSlotMismatch`] if a role reports a kind other
    /// than the slot it was passed in.
    pub fn new(
        summarizer: Arc<dyn Role>,
        classifier: Arc<dyn Role>,
        novelty_assessor: Arc<dyn Role>,
        scorer: Arc<dyn Role>,
    ) -> Result<Self, SetupError> {
        let set = Self {
            summarizer,
            classifier,
            novelty_assessor,
            scorer,
        };
        for (slot, role) in RoleKind::PIPELINE.iter().zip(set.in_order()) {
            let actual = role.kind();
            if actual != *slot {
                return Err(SetupError::RoleSlotMismatch {
                    slot: *slot,
                    actual,
                });
            }
        }
        Ok(set)
    }

    /// Roles in pipeline order.
    pub fn in_order(&self) -> [&Arc<dyn Role>; 4] {
        [
            &self.summarizer,
            &self.classifier,
            &self.novelty_assessor,
            &self.scorer,
        ]
    }
}

impl std::fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleSet").finish_non_exhaustive()
    }
}
