//! Typed outputs produced by each role.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::RoleKind;

// serde_json writes non-finite floats as `null`. Read them back as NaN so a
// persisted malformed output still loads and still fails range checks.
fn f64_or_nan<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

fn breakdown_or_nan<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    let raw = BTreeMap::<String, Option<f64>>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
        .collect())
}

/// Contribution summary extracted from a paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub research_problem: String,
    pub methodology: String,
    pub innovations: String,
    pub findings: String,
    pub impact: String,
    /// Research area implied by the stated contribution, if the summarizer
    /// committed to one. Compared against the classifier's category.
    #[serde(default)]
    pub implied_category: Option<String>,
}

impl SummaryOutput {
    /// `true` when every text section is blank.
    pub fn is_blank(&self) -> bool {
        [
            &self.research_problem,
            &self.methodology,
            &self.innovations,
            &self.findings,
            &self.impact,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub category: String,
    /// Expected in `0.0..=1.0`.
    #[serde(deserialize_with = "f64_or_nan")]
    pub confidence: f64,
    pub rationale: String,
}

/// Qualitative novelty judgement, ordered from least to most novel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoveltyLevel {
    Low,
    Moderate,
    Significant,
    Breakthrough,
}

impl NoveltyLevel {
    /// Parse a free-form label as returned by a model.
    pub fn parse_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "low" | "minor" | "incremental" | "低" => Some(NoveltyLevel::Low),
            "moderate" | "medium" | "中等" => Some(NoveltyLevel::Moderate),
            "significant" | "high" | "notable" | "显著" => Some(NoveltyLevel::Significant),
            "breakthrough" | "revolutionary" | "突破性" => Some(NoveltyLevel::Breakthrough),
            _ => None,
        }
    }
}

impl std::fmt::Display for NoveltyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NoveltyLevel::Low => "low",
            NoveltyLevel::Moderate => "moderate",
            NoveltyLevel::Significant => "significant",
            NoveltyLevel::Breakthrough => "breakthrough",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoveltyOutput {
    /// `None` when the assessor gave no recognisable level.
    #[serde(default)]
    pub level: Option<NoveltyLevel>,
    /// Expected in the configured score range. NaN when the assessor gave none.
    #[serde(deserialize_with = "f64_or_nan")]
    pub score: f64,
    pub description: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
}

impl NoveltyOutput {
    /// Level for prompts and reports.
    pub fn level_label(&self) -> String {
        self.level
            .map_or_else(|| "unrecognised".to_string(), |l| l.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutput {
    /// Expected in the configured score range.
    #[serde(deserialize_with = "f64_or_nan")]
    pub score: f64,
    pub rationale: String,
    /// Sub-scores keyed by criterion (innovation, technical_depth, ...).
    #[serde(default, deserialize_with = "breakdown_or_nan")]
    pub breakdown: BTreeMap<String, f64>,
}

/// Output of one role for one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleOutput {
    Summary(SummaryOutput),
    Classification(ClassificationOutput),
    Novelty(NoveltyOutput),
    Score(ScoreOutput),
}

impl RoleOutput {
    /// The role that produces this output variant.
    pub fn producing_role(&self) -> RoleKind {
        match self {
            RoleOutput::Summary(_) => RoleKind::Summarizer,
            RoleOutput::Classification(_) => RoleKind::Classifier,
            RoleOutput::Novelty(_) => RoleKind::NoveltyAssessor,
            RoleOutput::Score(_) => RoleKind::Scorer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producing_role_matches_variant() {
        assert_eq!(
            RoleOutput::Summary(SummaryOutput::default()).producing_role(),
            RoleKind::Summarizer
        );
        assert_eq!(
            RoleOutput::Score(ScoreOutput {
                score: 5.0,
                rationale: String::new(),
                breakdown: BTreeMap::new(),
            })
            .producing_role(),
            RoleKind::Scorer
        );
    }

    #[test]
    fn test_novelty_labels() {
        assert_eq!(NoveltyLevel::parse_label(" Low "), Some(NoveltyLevel::Low));
        assert_eq!(
            NoveltyLevel::parse_label("显著"),
            Some(NoveltyLevel::Significant)
        );
        assert_eq!(NoveltyLevel::parse_label("sideways"), None);
        assert!(NoveltyLevel::Low < NoveltyLevel::Breakthrough);
    }

    #[test]
    fn test_role_output_is_tagged_by_kind() {
        let output = RoleOutput::Classification(ClassificationOutput {
            category: "AI Safety & Alignment".to_string(),
            confidence: 0.9,
            rationale: "mentions alignment".to_string(),
        });
        let raw = serde_json::to_value(&output).unwrap();
        assert_eq!(raw["kind"], "classification");
        assert_eq!(raw["category"], "AI Safety & Alignment");
    }

    #[test]
    fn test_blank_summary() {
        assert!(SummaryOutput::default().is_blank());
        let summary = SummaryOutput {
            findings: "works".to_string(),
            ..SummaryOutput::default()
        };
        assert!(!summary.is_blank());
    }

    #[test]
    fn test_non_finite_numbers_survive_json() {
        let output = RoleOutput::Novelty(NoveltyOutput {
            level: None,
            score: f64::NAN,
            description: String::new(),
            strengths: vec![],
            limitations: vec![],
        });
        let raw = serde_json::to_string(&output).unwrap();
        assert!(raw.contains("\"score\":null"));

        let RoleOutput::Novelty(back) = serde_json::from_str(&raw).unwrap() else {
            panic!("expected novelty output");
        };
        assert!(back.score.is_nan());
        assert_eq!(back.level, None);
        assert_eq!(back.level_label(), "unrecognised");
    }
}
