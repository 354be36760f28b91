//! Rule-based role backends.
//!
//! Deterministic, offline roles driven by keyword tables. Used for demos,
//! dry runs and as a baseline when no model is configured.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AnalysisConfig;
use crate::conflict::{Arbiter, OTHER_CATEGORY};
use crate::domain::Paper;
use crate::error::{ArbitrationError, RoleInvocationError, SetupError};
use crate::roles::{
    ClassificationOutput, NoveltyLevel, NoveltyOutput, OutputBundle, Role, RoleKind, RoleOutput,
    RoleSet, ScoreOutput, SummaryOutput,
};

const CONTRIBUTION_CUES: &[&str] = &[
    "we propose",
    "we introduce",
    "we present",
    "this paper introduces",
    "this paper explores",
    "our approach",
    "our model",
    "our method",
];
const METHOD_CUES: &[&str] = &[
    "method",
    "approach",
    "architecture",
    "algorithm",
    "framework",
    "technique",
    "strategy",
    "mechanism",
];
const FINDING_CUES: &[&str] = &[
    "experiment",
    "results",
    "demonstrate",
    "outperform",
    "we show",
    "improvement",
];
const NOVELTY_CUES: &[&str] = &[
    "novel",
    "first",
    "new",
    "introduce",
    "propose",
    "outperform",
    "state-of-the-art",
    "breakthrough",
    "significant",
];
const INCREMENTAL_CUES: &[&str] = &[
    "improve",
    "extend",
    "variant",
    "incremental",
    "revisit",
    "competitive",
];

/// Built-in keyword tables for the default categories.
fn builtin_keywords(category: &str) -> Option<&'static [&'static str]> {
    let table: &[&str] = match category {
        "LLM Optimization & Efficiency" => &[
            "language model",
            "llm",
            "efficien",
            "quantiz",
            "prompt",
            "inference",
            "distill",
            "fine-tun",
            "reasoner",
        ],
        "Multimodal AI Systems" => &[
            "vision-language",
            "multimodal",
            "multi-modal",
            "image",
            "visual",
            "video",
            "audio",
            "caption",
        ],
        "AI Safety & Alignment" => &[
            "safety",
            "alignment",
            "harmless",
            "robustness",
            "jailbreak",
            "red-team",
            "interpretab",
        ],
        "Reinforcement Learning Methods" => &[
            "reinforcement",
            "policy",
            "reward",
            "sample efficiency",
            "control task",
            "state abstraction",
        ],
        "Generative AI Applications" => &[
            "generative",
            "diffusion",
            "generation",
            "synthesis",
            "text-to",
            "drug discovery",
        ],
        _ => return None,
    };
    Some(table)
}

/// Maps free text onto the configured categories by keyword hits.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    categories: Vec<(String, Vec<String>)>,
}

impl CategoryMatcher {
    /// Categories without a built-in table match on the words of their own
    /// name (longer than three letters).
    pub fn new(categories: &[String]) -> Self {
        let categories = categories
            .iter()
            .map(|name| {
                let keywords = match builtin_keywords(name) {
                    Some(table) => table.iter().map(|k| k.to_string()).collect(),
                    None => name
                        .split(|c: char| !c.is_alphanumeric() && c != '-')
                        .filter(|w| w.chars().count() > 3)
                        .map(str::to_lowercase)
                        .collect(),
                };
                (name.clone(), keywords)
            })
            .collect();
        Self { categories }
    }

    /// Best category and the share of all keyword hits it received.
    ///
    /// Ties go to the category configured first. `None` when nothing matched.
    pub fn best_match(&self, text: &str) -> Option<(&str, f64)> {
        let text = text.to_lowercase();
        let hits: Vec<usize> = self
            .categories
            .iter()
            .map(|(_, keywords)| keywords.iter().filter(|k| text.contains(k.as_str())).count())
            .collect();
        let total: usize = hits.iter().sum();
        if total == 0 {
            return None;
        }

        let mut best = 0;
        for (i, h) in hits.iter().enumerate() {
            if *h > hits[best] {
                best = i;
            }
        }
        Some((
            self.categories[best].0.as_str(),
            hits[best] as f64 / total as f64,
        ))
    }
}

fn sentences(text: &str) -> Vec<String> {
    text.split_inclusive(|c: char| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn matching(sentences: &[String], cues: &[&str]) -> Vec<String> {
    sentences
        .iter()
        .filter(|s| {
            let lower = s.to_lowercase();
            cues.iter().any(|c| lower.contains(c))
        })
        .cloned()
        .collect()
}

fn cue_hits(text: &str, cues: &[&str]) -> Vec<String> {
    let lower = text.to_lowercase();
    cues.iter()
        .filter(|c| lower.contains(**c))
        .map(|c| c.to_string())
        .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn required<'a, T>(
    value: Option<&'a T>,
    role: RoleKind,
) -> Result<&'a T, RoleInvocationError> {
    value.ok_or(RoleInvocationError::MissingPrior(role))
}

/// Extracts contribution sentences from the abstract.
pub struct KeywordSummarizer {
    matcher: CategoryMatcher,
}

impl KeywordSummarizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            matcher: CategoryMatcher::new(&config.categories),
        }
    }
}

#[async_trait]
impl Role for KeywordSummarizer {
    fn kind(&self) -> RoleKind {
        RoleKind::Summarizer
    }

    async fn invoke(
        &self,
        paper: &Paper,
        _prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let all = sentences(&paper.summary);
        if all.is_empty() {
            return Err(RoleInvocationError::MalformedResponse(format!(
                "paper {} has no abstract to summarise",
                paper.id
            )));
        }

        let innovations = matching(&all, CONTRIBUTION_CUES).join(" ");
        let implied_category = self
            .matcher
            .best_match(&innovations)
            .map(|(name, _)| name.to_string());

        Ok(RoleOutput::Summary(SummaryOutput {
            research_problem: all[0].clone(),
            methodology: matching(&all, METHOD_CUES).into_iter().next().unwrap_or_default(),
            innovations,
            findings: matching(&all, FINDING_CUES).join(" "),
            impact: all.last().cloned().unwrap_or_default(),
            implied_category,
        }))
    }
}

/// Picks the configured category with the most keyword hits.
pub struct KeywordClassifier {
    matcher: CategoryMatcher,
}

impl KeywordClassifier {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            matcher: CategoryMatcher::new(&config.categories),
        }
    }
}

#[async_trait]
impl Role for KeywordClassifier {
    fn kind(&self) -> RoleKind {
        RoleKind::Classifier
    }

    async fn invoke(
        &self,
        paper: &Paper,
        prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let summary = required(prior.summary(), RoleKind::Summarizer)?;
        let text = format!("{} {} {}", paper.title, paper.summary, summary.innovations);

        let output = match self.matcher.best_match(&text) {
            Some((category, share)) => ClassificationOutput {
                category: category.to_string(),
                confidence: (share.clamp(0.0, 1.0) * 100.0).round() / 100.0,
                rationale: format!("{:.0}% of area keyword hits point to {category}", share * 100.0),
            },
            None => ClassificationOutput {
                category: OTHER_CATEGORY.to_string(),
                confidence: 0.0,
                rationale: "no area keywords matched".to_string(),
            },
        };
        Ok(RoleOutput::Classification(output))
    }
}

/// Scores novelty by counting novelty and incremental cue words.
pub struct CueNoveltyAssessor;

#[async_trait]
impl Role for CueNoveltyAssessor {
    fn kind(&self) -> RoleKind {
        RoleKind::NoveltyAssessor
    }

    async fn invoke(
        &self,
        paper: &Paper,
        _prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let text = format!("{} {}", paper.title, paper.summary);
        let strengths = cue_hits(&text, NOVELTY_CUES);
        let limitations = cue_hits(&text, INCREMENTAL_CUES);

        let raw = 3.0 + 1.2 * strengths.len() as f64 - 0.8 * limitations.len() as f64;
        let score = round1(raw.clamp(1.0, 10.0));
        let level = if score < 4.0 {
            NoveltyLevel::Low
        } else if score < 6.5 {
            NoveltyLevel::Moderate
        } else if score < 8.5 {
            NoveltyLevel::Significant
        } else {
            NoveltyLevel::Breakthrough
        };

        Ok(RoleOutput::Novelty(NoveltyOutput {
            level: Some(level),
            score,
            description: format!(
                "{} novelty cue(s), {} incremental cue(s)",
                strengths.len(),
                limitations.len()
            ),
            strengths,
            limitations,
        }))
    }
}

/// Combines the earlier outputs into an overall 0-10 score.
pub struct WeightedScorer;

#[async_trait]
impl Role for WeightedScorer {
    fn kind(&self) -> RoleKind {
        RoleKind::Scorer
    }

    async fn invoke(
        &self,
        paper: &Paper,
        prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let summary = required(prior.summary(), RoleKind::Summarizer)?;
        let class = required(prior.classification(), RoleKind::Classifier)?;
        let novelty = required(prior.novelty(), RoleKind::NoveltyAssessor)?;

        let method_words = summary.methodology.split_whitespace().count() as f64;
        let mut breakdown = BTreeMap::new();
        breakdown.insert("innovation".to_string(), novelty.score);
        breakdown.insert(
            "technical_depth".to_string(),
            round1(4.0 + (method_words / 10.0).min(4.0)),
        );
        let mut experimental: f64 = 4.0;
        if !summary.findings.is_empty() {
            experimental += 3.0;
        }
        if paper.summary.to_lowercase().contains("benchmark") {
            experimental += 1.0;
        }
        breakdown.insert("experimental_quality".to_string(), experimental);
        breakdown.insert(
            "potential_impact".to_string(),
            round1((novelty.score + 10.0 * class.confidence) / 2.0),
        );
        let practical = if class.category == OTHER_CATEGORY { 5.0 } else { 7.0 };
        breakdown.insert("practical_value".to_string(), practical);

        let score = round1(breakdown.values().sum::<f64>() / breakdown.len() as f64);
        Ok(RoleOutput::Score(ScoreOutput {
            score: score.clamp(0.0, 10.0),
            rationale: format!(
                "weighted mean of {} criteria for a {} paper with {} novelty",
                breakdown.len(),
                class.category,
                novelty.level_label()
            ),
            breakdown,
        }))
    }
}

/// Resolves conflicts by preferring the more conservative signal.
pub struct RuleBasedArbiter;

#[async_trait]
impl Arbiter for RuleBasedArbiter {
    async fn arbitrate(&self, context: &str) -> Result<String, ArbitrationError> {
        let flagged: Vec<&str> = context
            .lines()
            .skip_while(|l| !l.starts_with("Conflicts:"))
            .skip(1)
            .take_while(|l| l.starts_with("- "))
            .collect();
        if flagged.is_empty() {
            return Err(ArbitrationError::Unavailable(
                "context lists no conflicts".to_string(),
            ));
        }

        let mut out = format!("Rule-based arbitration of {} conflict(s):\n", flagged.len());
        for line in flagged {
            let aspect = line
                .trim_start_matches("- ")
                .split(':')
                .next()
                .unwrap_or_default();
            let decision = match aspect {
                "score_exceeds_novelty" | "score_below_novelty" => {
                    "rank by the lower of the two signals until a reviewer confirms"
                }
                "category_mismatch" => "keep the classifier's category; flag the summary",
                "novelty_level_vs_score" => "trust the qualitative novelty level",
                _ => "treat the output as unreliable and exclude it from ranking decisions",
            };
            out.push_str(&format!("{line} => {decision}\n"));
        }
        Ok(out)
    }
}

/// The four rule-based roles wired for `config`.
pub fn rule_based_roles(config: &AnalysisConfig) -> Result<RoleSet, SetupError> {
    RoleSet::new(
        Arc::new(KeywordSummarizer::new(config)),
        Arc::new(KeywordClassifier::new(config)),
        Arc::new(CueNoveltyAssessor),
        Arc::new(WeightedScorer),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn test_matcher_prefers_most_hits() {
        let matcher = CategoryMatcher::new(&config().categories);
        let (category, share) = matcher
            .best_match("A vision-language model for image captioning")
            .unwrap();
        assert_eq!(category, "Multimodal AI Systems");
        assert!(share > 0.5);
        assert!(matcher.best_match("nothing relevant here").is_none());
    }

    #[test]
    fn test_matcher_uses_category_name_for_custom_areas() {
        let matcher = CategoryMatcher::new(&["Robotics Manipulation".to_string()]);
        let (category, _) = matcher
            .best_match("dexterous manipulation with a robot arm")
            .unwrap();
        assert_eq!(category, "Robotics Manipulation");
    }

    #[tokio::test]
    async fn test_summarizer_extracts_contribution_sentences() {
        let paper = Paper::new(
            "s1",
            "Title",
            "Alignment is hard. We propose a novel safety objective. Experiments demonstrate gains.",
        );
        let out = KeywordSummarizer::new(&config())
            .invoke(&paper, &OutputBundle::new())
            .await
            .unwrap();
        let RoleOutput::Summary(summary) = out else {
            panic!("expected summary");
        };
        assert_eq!(summary.research_problem, "Alignment is hard.");
        assert_eq!(summary.innovations, "We propose a novel safety objective.");
        assert_eq!(summary.findings, "Experiments demonstrate gains.");
        assert_eq!(
            summary.implied_category.as_deref(),
            Some("AI Safety & Alignment")
        );
    }

    #[tokio::test]
    async fn test_summarizer_rejects_empty_abstract() {
        let err = KeywordSummarizer::new(&config())
            .invoke(&Paper::new("s2", "Title", "   "), &OutputBundle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleInvocationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_classifier_requires_summary() {
        let err = KeywordClassifier::new(&config())
            .invoke(&Paper::new("c1", "t", "s"), &OutputBundle::new())
            .await
            .unwrap_err();
        assert_eq!(err, RoleInvocationError::MissingPrior(RoleKind::Summarizer));
    }

    #[tokio::test]
    async fn test_novelty_levels_follow_cue_counts() {
        let plain = Paper::new("n1", "A study", "We revisit and extend a known variant.");
        let RoleOutput::Novelty(low) = CueNoveltyAssessor
            .invoke(&plain, &OutputBundle::new())
            .await
            .unwrap()
        else {
            panic!("expected novelty");
        };
        assert_eq!(low.level, Some(NoveltyLevel::Low));

        let bold = Paper::new(
            "n2",
            "A novel breakthrough",
            "We propose the first new method, which is state-of-the-art and significant.",
        );
        let RoleOutput::Novelty(high) = CueNoveltyAssessor
            .invoke(&bold, &OutputBundle::new())
            .await
            .unwrap()
        else {
            panic!("expected novelty");
        };
        assert!(high.level > low.level);
        assert!((1.0..=10.0).contains(&high.score));
    }

    #[tokio::test]
    async fn test_arbiter_decides_each_listed_conflict() {
        let context = "Paper: T (p)\n\nConflicts:\n- score_exceeds_novelty: 9.5 vs low\n- category_mismatch: a vs b\n\nRole outputs:\n{}";
        let text = RuleBasedArbiter.arbitrate(context).await.unwrap();
        assert!(text.starts_with("Rule-based arbitration of 2 conflict(s)"));
        assert!(text.contains("score_exceeds_novelty"));
        assert!(text.contains("keep the classifier's category"));
    }

    #[tokio::test]
    async fn test_arbiter_rejects_context_without_conflicts() {
        assert!(RuleBasedArbiter.arbitrate("Paper: T (p)").await.is_err());
    }
}
