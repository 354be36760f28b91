//! Per-paper collection of role outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::output::{
    ClassificationOutput, NoveltyOutput, RoleOutput, ScoreOutput, SummaryOutput,
};
use super::RoleKind;

/// Outputs collected for one paper, keyed by producing role.
///
/// Built incrementally while the pipeline runs. A role missing from the
/// bundle has not (successfully) run yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputBundle {
    outputs: BTreeMap<RoleKind, RoleOutput>,
}

impl OutputBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `output` under its producing role, returning any output it replaced.
    pub fn insert(&mut self, output: RoleOutput) -> Option<RoleOutput> {
        self.outputs.insert(output.producing_role(), output)
    }

    pub fn get(&self, role: RoleKind) -> Option<&RoleOutput> {
        self.outputs.get(&role)
    }

    pub fn contains(&self, role: RoleKind) -> bool {
        self.outputs.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// `true` once every pipeline role has contributed.
    pub fn is_complete(&self) -> bool {
        RoleKind::PIPELINE.iter().all(|r| self.contains(*r))
    }

    /// Pipeline roles with no output, in pipeline order.
    pub fn missing(&self) -> Vec<RoleKind> {
        RoleKind::PIPELINE
            .iter()
            .copied()
            .filter(|r| !self.contains(*r))
            .collect()
    }

    /// Outputs in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (&RoleKind, &RoleOutput)> {
        self.outputs.iter()
    }

    pub fn summary(&self) -> Option<&SummaryOutput> {
        match self.get(RoleKind::Summarizer) {
            Some(RoleOutput::Summary(s)) => Some(s),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<&ClassificationOutput> {
        match self.get(RoleKind::Classifier) {
            Some(RoleOutput::Classification(c)) => Some(c),
            _ => None,
        }
    }

    pub fn novelty(&self) -> Option<&NoveltyOutput> {
        match self.get(RoleKind::NoveltyAssessor) {
            Some(RoleOutput::Novelty(n)) => Some(n),
            _ => None,
        }
    }

    pub fn score(&self) -> Option<&ScoreOutput> {
        match self.get(RoleKind::Scorer) {
            Some(RoleOutput::Score(s)) => Some(s),
            _ => None,
        }
    }
}
