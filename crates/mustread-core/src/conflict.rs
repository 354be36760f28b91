//! Conflict detection and arbitration across role outputs.
//!
//! Detection is a pure comparison over the bundle and costs nothing when the
//! roles agree. Only a flagged bundle reaches the [`Arbiter`].
//!
//! **Malformed outputs** (always flagged):
//! - `score_out_of_range`: Scorer score or a breakdown sub-score outside the score range
//! - `novelty_score_out_of_range`: NoveltyAssessor score outside the score range
//! - `novelty_level_unrecognised`: NoveltyAssessor gave no known novelty level
//! - `confidence_out_of_range`: Classifier confidence outside the confidence range
//! - `unknown_category`: Classifier category not in the configured set (or "Other")
//! - `empty_summary`: every Summarizer section is blank
//! - `missing_output`: a role has no output in the bundle
//!
//! **Inconsistencies:**
//! - `category_mismatch`: Summary's implied category differs from the Classifier's
//! - `score_exceeds_novelty`: high score while novelty is judged low
//! - `score_below_novelty`: low score while novelty is judged a breakthrough
//! - `novelty_level_vs_score`: novelty level contradicts the novelty score

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Paper;
use crate::error::{ArbitrationError, MalformedOutput};
use crate::obs;
use crate::roles::{NoveltyLevel, OutputBundle, RoleKind, RoleOutput};

/// Category label every classifier may fall back to.
pub const OTHER_CATEGORY: &str = "Other";

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `false` for NaN and infinities.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

impl std::fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Thresholds for the comparison rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictPolicy {
    pub score_range: ScoreRange,
    pub confidence_range: ScoreRange,
    /// Scores at or above this are "high".
    pub high_score_threshold: f64,
    /// Scores at or below this are "low".
    pub low_score_threshold: f64,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            score_range: ScoreRange::new(0.0, 10.0),
            confidence_range: ScoreRange::new(0.0, 1.0),
            high_score_threshold: 8.0,
            low_score_threshold: 3.0,
        }
    }
}

/// A detected inconsistency between (or within) role outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConflict {
    /// Rule that fired, e.g. `score_exceeds_novelty`.
    pub aspect: String,
    /// Roles whose outputs are involved.
    pub roles: Vec<RoleKind>,
    pub detail: String,
}

impl From<MalformedOutput> for RoleConflict {
    fn from(m: MalformedOutput) -> Self {
        Self {
            aspect: m.aspect.to_string(),
            roles: vec![m.role],
            detail: m.detail,
        }
    }
}

/// Conflict annotation attached to a successful item.
///
/// Empty when the roles agree or when arbitration could not complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<RoleConflict>,
    /// Arbiter's resolution, stored verbatim.
    pub resolution: Option<String>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty() && self.resolution.is_none()
    }

    pub fn aspects(&self) -> Vec<&str> {
        self.conflicts.iter().map(|c| c.aspect.as_str()).collect()
    }
}

/// Secondary reasoning step invoked only for flagged bundles.
#[async_trait]
pub trait Arbiter: Send + Sync {
    /// Explain and resolve the conflicts described in `context`.
    async fn arbitrate(&self, context: &str) -> Result<String, ArbitrationError>;
}

/// Check a single output's shape and ranges.
pub fn validate_output(
    output: &RoleOutput,
    policy: &ConflictPolicy,
    categories: &[String],
) -> Vec<MalformedOutput> {
    let mut issues = Vec::new();
    let role = output.producing_role();

    match output {
        RoleOutput::Summary(summary) => {
            if summary.is_blank() {
                issues.push(MalformedOutput {
                    role,
                    aspect: "empty_summary",
                    detail: "all summary sections are blank".to_string(),
                });
            }
        }
        RoleOutput::Classification(c) => {
            if !policy.confidence_range.contains(c.confidence) {
                issues.push(MalformedOutput {
                    role,
                    aspect: "confidence_out_of_range",
                    detail: format!(
                        "confidence {} not in {}",
                        c.confidence, policy.confidence_range
                    ),
                });
            }
            if !categories.is_empty() && !is_known_category(&c.category, categories) {
                issues.push(MalformedOutput {
                    role,
                    aspect: "unknown_category",
                    detail: format!("category {:?} is not a configured area", c.category),
                });
            }
        }
        RoleOutput::Novelty(n) => {
            if n.level.is_none() {
                issues.push(MalformedOutput {
                    role,
                    aspect: "novelty_level_unrecognised",
                    detail: "novelty level is missing or not a known label".to_string(),
                });
            }
            if !policy.score_range.contains(n.score) {
                issues.push(MalformedOutput {
                    role,
                    aspect: "novelty_score_out_of_range",
                    detail: format!("novelty score {} not in {}", n.score, policy.score_range),
                });
            }
        }
        RoleOutput::Score(s) => {
            if !policy.score_range.contains(s.score) {
                issues.push(MalformedOutput {
                    role,
                    aspect: "score_out_of_range",
                    detail: format!("score {} not in {}", s.score, policy.score_range),
                });
            }
            for (criterion, sub) in &s.breakdown {
                if !policy.score_range.contains(*sub) {
                    issues.push(MalformedOutput {
                        role,
                        aspect: "score_out_of_range",
                        detail: format!(
                            "breakdown {criterion} = {sub} not in {}",
                            policy.score_range
                        ),
                    });
                }
            }
        }
    }

    issues
}

fn is_known_category(category: &str, categories: &[String]) -> bool {
    same_label(category, OTHER_CATEGORY) || categories.iter().any(|c| same_label(c, category))
}

fn same_label(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Detects conflicts in a bundle and asks an [`Arbiter`] to resolve them.
pub struct ConflictResolver {
    policy: ConflictPolicy,
    categories: Vec<String>,
    arbiter: Arc<dyn Arbiter>,
}

impl ConflictResolver {
    /// `categories` is the configured category set; empty disables the
    /// `unknown_category` rule.
    pub fn new(policy: ConflictPolicy, categories: Vec<String>, arbiter: Arc<dyn Arbiter>) -> Self {
        Self {
            policy,
            categories,
            arbiter,
        }
    }

    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Pure rule evaluation. No external calls.
    pub fn detect(&self, bundle: &OutputBundle) -> Vec<RoleConflict> {
        let mut conflicts: Vec<RoleConflict> = Vec::new();

        for role in bundle.missing() {
            conflicts.push(RoleConflict {
                aspect: "missing_output".to_string(),
                roles: vec![role],
                detail: format!("no {role} output in bundle"),
            });
        }

        for (_, output) in bundle.iter() {
            conflicts.extend(
                validate_output(output, &self.policy, &self.categories)
                    .into_iter()
                    .map(RoleConflict::from),
            );
        }

        if let (Some(summary), Some(class)) = (bundle.summary(), bundle.classification()) {
            if let Some(implied) = summary.implied_category.as_deref() {
                if !implied.trim().is_empty() && !same_label(implied, &class.category) {
                    conflicts.push(RoleConflict {
                        aspect: "category_mismatch".to_string(),
                        roles: vec![RoleKind::Summarizer, RoleKind::Classifier],
                        detail: format!(
                            "summary implies {:?} but classifier chose {:?}",
                            implied, class.category
                        ),
                    });
                }
            }
        }

        if let (Some(score), Some(novelty)) = (bundle.score(), bundle.novelty()) {
            if score.score >= self.policy.high_score_threshold
                && novelty.level == Some(NoveltyLevel::Low)
            {
                conflicts.push(RoleConflict {
                    aspect: "score_exceeds_novelty".to_string(),
                    roles: vec![RoleKind::Scorer, RoleKind::NoveltyAssessor],
                    detail: format!("score {} is high but novelty is judged low", score.score),
                });
            }
            if score.score <= self.policy.low_score_threshold
                && novelty.level == Some(NoveltyLevel::Breakthrough)
            {
                conflicts.push(RoleConflict {
                    aspect: "score_below_novelty".to_string(),
                    roles: vec![RoleKind::Scorer, RoleKind::NoveltyAssessor],
                    detail: format!(
                        "score {} is low but novelty is judged a breakthrough",
                        score.score
                    ),
                });
            }
        }

        if let Some(novelty) = bundle.novelty() {
            let contradicts = match novelty.level {
                Some(NoveltyLevel::Low) => novelty.score >= self.policy.high_score_threshold,
                Some(NoveltyLevel::Breakthrough) => novelty.score <= self.policy.low_score_threshold,
                _ => false,
            };
            if contradicts {
                conflicts.push(RoleConflict {
                    aspect: "novelty_level_vs_score".to_string(),
                    roles: vec![RoleKind::NoveltyAssessor],
                    detail: format!(
                        "novelty level {} contradicts novelty score {}",
                        novelty.level_label(),
                        novelty.score
                    ),
                });
            }
        }

        conflicts
    }

    /// Detect and, if anything is flagged, arbitrate.
    ///
    /// Returns an empty report without calling the arbiter when nothing is flagged.
    pub async fn try_resolve(
        &self,
        paper: &Paper,
        bundle: &OutputBundle,
    ) -> Result<ConflictReport, ArbitrationError> {
        let conflicts = self.detect(bundle);
        if conflicts.is_empty() {
            return Ok(ConflictReport::default());
        }

        let aspects: Vec<&str> = conflicts.iter().map(|c| c.aspect.as_str()).collect();
        obs::emit_conflict_detected(&paper.id, &aspects);

        let context = arbitration_context(paper, bundle, &conflicts);
        let resolution = self.arbiter.arbitrate(&context).await?;
        if resolution.trim().is_empty() {
            return Err(ArbitrationError::EmptyResponse);
        }

        Ok(ConflictReport {
            conflicts,
            resolution: Some(resolution),
        })
    }
}

/// Text handed to the arbiter: paper identity, flagged conflicts, and the
/// full bundle as JSON.
pub fn arbitration_context(
    paper: &Paper,
    bundle: &OutputBundle,
    conflicts: &[RoleConflict],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Paper: {} ({})\n\n", paper.title, paper.id));
    out.push_str("Conflicts:\n");
    for c in conflicts {
        out.push_str(&format!("- {}: {}\n", c.aspect, c.detail));
    }
    let outputs =
        serde_json::to_string_pretty(bundle).unwrap_or_else(|_| format!("{bundle:?}"));
    out.push_str("\nRole outputs:\n");
    out.push_str(&outputs);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{self, ScriptedArbiter};

    fn resolver(arbiter: Arc<ScriptedArbiter>) -> ConflictResolver {
        ConflictResolver::new(
            ConflictPolicy::default(),
            vec!["AI Safety & Alignment".to_string()],
            arbiter,
        )
    }

    #[test]
    fn test_clean_bundle_has_no_conflicts() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        assert!(r.detect(&fakes::clean_bundle()).is_empty());
    }

    #[test]
    fn test_out_of_range_score_is_flagged() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::score_output(11.0));
        let aspects: Vec<String> = r.detect(&bundle).into_iter().map(|c| c.aspect).collect();
        assert_eq!(aspects, vec!["score_out_of_range"]);
    }

    #[test]
    fn test_nan_score_is_flagged() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::score_output(f64::NAN));
        assert!(r
            .detect(&bundle)
            .iter()
            .any(|c| c.aspect == "score_out_of_range"));
    }

    #[test]
    fn test_high_score_with_low_novelty_is_flagged() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::score_output(9.5));
        bundle.insert(fakes::novelty_output(NoveltyLevel::Low, 2.0));
        let conflicts = r.detect(&bundle);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].aspect, "score_exceeds_novelty");
        assert_eq!(
            conflicts[0].roles,
            vec![RoleKind::Scorer, RoleKind::NoveltyAssessor]
        );
    }

    #[test]
    fn test_low_score_with_breakthrough_novelty_is_flagged() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::score_output(2.0));
        bundle.insert(fakes::novelty_output(NoveltyLevel::Breakthrough, 9.0));
        let aspects: Vec<String> = r.detect(&bundle).into_iter().map(|c| c.aspect).collect();
        assert_eq!(aspects, vec!["score_below_novelty"]);
    }

    #[test]
    fn test_category_mismatch_is_case_insensitive() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::summary_output(Some("ai safety & ALIGNMENT")));
        assert!(r.detect(&bundle).is_empty());

        bundle.insert(fakes::summary_output(Some("Multimodal AI Systems")));
        let aspects: Vec<String> = r.detect(&bundle).into_iter().map(|c| c.aspect).collect();
        assert_eq!(aspects, vec!["category_mismatch"]);
    }

    #[test]
    fn test_unknown_category_and_confidence() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::classification_output("Quantum Cooking", 1.4));
        let aspects: Vec<String> = r.detect(&bundle).into_iter().map(|c| c.aspect).collect();
        assert!(aspects.contains(&"confidence_out_of_range".to_string()));
        assert!(aspects.contains(&"unknown_category".to_string()));
    }

    #[test]
    fn test_other_category_is_always_known() {
        assert!(is_known_category("other", &["X".to_string()]));
    }

    #[test]
    fn test_missing_output_is_flagged() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = OutputBundle::new();
        bundle.insert(fakes::summary_output(None));
        let missing: Vec<RoleConflict> = r
            .detect(&bundle)
            .into_iter()
            .filter(|c| c.aspect == "missing_output")
            .collect();
        assert_eq!(missing.len(), 3);
    }

    #[tokio::test]
    async fn test_clean_bundle_skips_arbiter() {
        let arbiter = Arc::new(ScriptedArbiter::replying("unused"));
        let r = resolver(arbiter.clone());
        let report = r
            .try_resolve(&fakes::paper("p1"), &fakes::clean_bundle())
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(arbiter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_flagged_bundle_stores_resolution_verbatim() {
        let arbiter = Arc::new(ScriptedArbiter::replying("Trust the novelty judgement."));
        let r = resolver(arbiter.clone());
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::score_output(12.0));

        let report = r.try_resolve(&fakes::paper("p1"), &bundle).await.unwrap();
        assert_eq!(
            report.resolution.as_deref(),
            Some("Trust the novelty judgement.")
        );
        assert_eq!(report.aspects(), vec!["score_out_of_range"]);

        let contexts = arbiter.contexts();
        assert_eq!(contexts.len(), 1);
        assert!(contexts[0].contains("score_out_of_range"));
        assert!(contexts[0].contains("\"scorer\""));
    }

    #[tokio::test]
    async fn test_blank_resolution_is_an_error() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("   ")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(fakes::score_output(-1.0));
        let err = r.try_resolve(&fakes::paper("p1"), &bundle).await.unwrap_err();
        assert_eq!(err, ArbitrationError::EmptyResponse);
    }

    #[test]
    fn test_unrecognised_novelty_level_is_flagged() {
        let r = resolver(Arc::new(ScriptedArbiter::replying("n/a")));
        let mut bundle = fakes::clean_bundle();
        bundle.insert(RoleOutput::Novelty(crate::roles::NoveltyOutput {
            level: None,
            score: f64::NAN,
            description: String::new(),
            strengths: vec![],
            limitations: vec![],
        }));
        let aspects: Vec<String> = r.detect(&bundle).into_iter().map(|c| c.aspect).collect();
        assert_eq!(
            aspects,
            vec!["novelty_level_unrecognised", "novelty_score_out_of_range"]
        );
    }
}
