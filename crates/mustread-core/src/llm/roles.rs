//! Analysis roles and arbiter backed by a [`ChatBackend`].
//!
//! Every role asks for a fenced JSON reply and deserialises it into its
//! typed output. Replies that cannot be parsed become
//! [`RoleInvocationError::MalformedResponse`], except for the novelty
//! assessor, which falls back to reading a score and level from prose.
//! Out-of-range numbers are passed through untouched, and a novelty score or
//! level the reply does not give stays absent (NaN score, no level), so the
//! conflict resolver can flag them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::client::ChatBackend;
use super::parse::{novelty_level_from_text, parse_json_reply, score_out_of_ten};
use crate::config::AnalysisConfig;
use crate::conflict::{Arbiter, OTHER_CATEGORY};
use crate::domain::Paper;
use crate::error::{ArbitrationError, RoleInvocationError, SetupError};
use crate::roles::{
    ClassificationOutput, NoveltyLevel, NoveltyOutput, OutputBundle, Role, RoleKind, RoleOutput,
    RoleSet, ScoreOutput, SummaryOutput,
};

const SUMMARIZER_SYSTEM: &str = "You are an expert AI paper summarization specialist. \
Extract the research problem, methods, key innovations, findings and potential impact. \
Focus on phrases such as \"we propose\" and \"our contributions\".";

const NOVELTY_SYSTEM: &str = "You are an expert reviewer judging how novel a paper is \
relative to existing work: a new method or an improvement, how large the step is, and \
whether it opens a new research direction.";

const SCORER_SYSTEM: &str = "You are a senior AI researcher scoring papers from 0 to 10 \
on innovation, technical depth, experimental quality, potential impact and practical value.";

const ARBITER_SYSTEM: &str = "You coordinate several paper-analysis agents. Their outputs \
for one paper disagree. Explain the disagreement and state which reading should be \
trusted and why, in a short paragraph.";

fn malformed(role: RoleKind, e: serde_json::Error) -> RoleInvocationError {
    RoleInvocationError::MalformedResponse(format!("{role} reply is not valid JSON: {e}"))
}

fn paper_header(paper: &Paper) -> String {
    let mut out = format!(
        "Title: {}\nAuthors: {}\nAbstract: {}\n",
        paper.title,
        paper.author_line(),
        paper.summary
    );
    if let Some(url) = &paper.pdf_url {
        out.push_str(&format!("Full text: {url}\n"));
    }
    out
}

fn summary_text(summary: &SummaryOutput) -> String {
    format!(
        "Problem: {}\nMethod: {}\nInnovations: {}\nFindings: {}",
        summary.research_problem, summary.methodology, summary.innovations, summary.findings
    )
}

fn require_summary(prior: &OutputBundle) -> Result<&SummaryOutput, RoleInvocationError> {
    prior
        .summary()
        .ok_or(RoleInvocationError::MissingPrior(RoleKind::Summarizer))
}

// ── Summarizer ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryReply {
    #[serde(default)]
    research_problem: String,
    #[serde(default)]
    methodology: String,
    #[serde(default)]
    innovations: String,
    #[serde(default)]
    findings: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    area: Option<String>,
}

pub struct LlmSummarizer {
    chat: Arc<dyn ChatBackend>,
    categories: Vec<String>,
}

impl LlmSummarizer {
    pub fn new(chat: Arc<dyn ChatBackend>, config: &AnalysisConfig) -> Self {
        Self {
            chat,
            categories: config.categories.clone(),
        }
    }
}

#[async_trait]
impl Role for LlmSummarizer {
    fn kind(&self) -> RoleKind {
        RoleKind::Summarizer
    }

    async fn invoke(
        &self,
        paper: &Paper,
        _prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let prompt = format!(
            "Summarise the main contributions of this paper.\n\n{}\n\
             Reply with JSON only:\n```json\n{{\"research_problem\": \"...\", \
             \"methodology\": \"...\", \"innovations\": \"...\", \"findings\": \"...\", \
             \"impact\": \"...\", \"area\": \"one of: {}, {OTHER_CATEGORY}\"}}\n```",
            paper_header(paper),
            self.categories.join(", ")
        );
        let reply = self.chat.complete(SUMMARIZER_SYSTEM, &prompt).await?;
        let parsed: SummaryReply =
            parse_json_reply(&reply).map_err(|e| malformed(RoleKind::Summarizer, e))?;

        Ok(RoleOutput::Summary(SummaryOutput {
            research_problem: parsed.research_problem,
            methodology: parsed.methodology,
            innovations: parsed.innovations,
            findings: parsed.findings,
            impact: parsed.impact,
            implied_category: parsed.area.filter(|a| !a.trim().is_empty()),
        }))
    }
}

// ── Classifier ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ClassificationReply {
    category: String,
    confidence: f64,
    rationale: String,
}

pub struct LlmClassifier {
    chat: Arc<dyn ChatBackend>,
    categories: Vec<String>,
}

impl LlmClassifier {
    pub fn new(chat: Arc<dyn ChatBackend>, config: &AnalysisConfig) -> Self {
        Self {
            chat,
            categories: config.categories.clone(),
        }
    }

    fn system_message(&self) -> String {
        format!(
            "You are an expert AI paper classification specialist. Classify papers into \
             exactly one of: {}. If a paper spans several areas choose the most prominent; \
             if it fits none, answer \"{OTHER_CATEGORY}\".",
            self.categories.join(", ")
        )
    }
}

#[async_trait]
impl Role for LlmClassifier {
    fn kind(&self) -> RoleKind {
        RoleKind::Classifier
    }

    async fn invoke(
        &self,
        paper: &Paper,
        prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let summary = require_summary(prior)?;
        let prompt = format!(
            "Classify this paper.\n\n{}\nMain contributions:\n{}\n\n\
             Reply with JSON only:\n```json\n{{\"category\": \"...\", \"confidence\": 0.85, \
             \"rationale\": \"...\"}}\n```\nconfidence is a float between 0 and 1.",
            paper_header(paper),
            summary_text(summary)
        );
        let reply = self.chat.complete(&self.system_message(), &prompt).await?;
        let parsed: ClassificationReply =
            parse_json_reply(&reply).map_err(|e| malformed(RoleKind::Classifier, e))?;

        Ok(RoleOutput::Classification(ClassificationOutput {
            category: parsed.category,
            confidence: parsed.confidence,
            rationale: parsed.rationale,
        }))
    }
}

// ── Novelty assessor ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NoveltyReply {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    limitations: Vec<String>,
}

const PROSE_EXCERPT_CHARS: usize = 500;

pub struct LlmNoveltyAssessor {
    chat: Arc<dyn ChatBackend>,
}

impl LlmNoveltyAssessor {
    pub fn new(chat: Arc<dyn ChatBackend>) -> Self {
        Self { chat }
    }

    /// Best-effort reading of a reply that is not JSON.
    fn from_prose(reply: &str) -> NoveltyOutput {
        NoveltyOutput {
            level: novelty_level_from_text(reply),
            score: score_out_of_ten(reply).unwrap_or(f64::NAN),
            description: reply.chars().take(PROSE_EXCERPT_CHARS).collect(),
            strengths: vec![],
            limitations: vec![],
        }
    }
}

#[async_trait]
impl Role for LlmNoveltyAssessor {
    fn kind(&self) -> RoleKind {
        RoleKind::NoveltyAssessor
    }

    async fn invoke(
        &self,
        paper: &Paper,
        prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let summary = require_summary(prior)?;
        let prompt = format!(
            "Assess the novelty and incremental contribution of this paper.\n\n{}\n\
             Main contributions:\n{}\n\nReply with JSON only:\n```json\n\
             {{\"score\": 7.5, \"level\": \"low|moderate|significant|breakthrough\", \
             \"description\": \"...\", \"strengths\": [\"...\"], \"limitations\": [\"...\"]}}\n```",
            paper_header(paper),
            summary_text(summary)
        );
        let reply = self.chat.complete(NOVELTY_SYSTEM, &prompt).await?;

        let output = match parse_json_reply::<NoveltyReply>(&reply) {
            Ok(parsed) => NoveltyOutput {
                level: parsed.level.as_deref().and_then(NoveltyLevel::parse_label),
                score: parsed.score.unwrap_or(f64::NAN),
                description: parsed.description,
                strengths: parsed.strengths,
                limitations: parsed.limitations,
            },
            Err(e) => {
                tracing::warn!(paper_id = %paper.id, error = %e, "novelty reply not JSON, reading prose");
                Self::from_prose(&reply)
            }
        };
        Ok(RoleOutput::Novelty(output))
    }
}

// ── Scorer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScoreReply {
    score: f64,
    rationale: String,
    #[serde(default)]
    breakdown: BTreeMap<String, f64>,
}

pub struct LlmScorer {
    chat: Arc<dyn ChatBackend>,
}

impl LlmScorer {
    pub fn new(chat: Arc<dyn ChatBackend>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Role for LlmScorer {
    fn kind(&self) -> RoleKind {
        RoleKind::Scorer
    }

    async fn invoke(
        &self,
        paper: &Paper,
        prior: &OutputBundle,
    ) -> Result<RoleOutput, RoleInvocationError> {
        let summary = require_summary(prior)?;
        let class = prior
            .classification()
            .ok_or(RoleInvocationError::MissingPrior(RoleKind::Classifier))?;
        let novelty = prior
            .novelty()
            .ok_or(RoleInvocationError::MissingPrior(RoleKind::NoveltyAssessor))?;

        let prompt = format!(
            "Score this paper from 0 to 10.\n\n{}\n\
             1. Main contributions:\n{}\n\
             2. Research area: {} (rationale: {})\n\
             3. Novelty: {}/10, level {}. {}\n   Strengths: {}\n   Limitations: {}\n\n\
             Reply with JSON only:\n```json\n{{\"score\": 7.5, \"rationale\": \"...\", \
             \"breakdown\": {{\"innovation\": 8.0, \"technical_depth\": 7.0, \
             \"experimental_quality\": 7.5, \"potential_impact\": 8.0, \"practical_value\": 7.0}}}}\n```",
            paper_header(paper),
            summary_text(summary),
            class.category,
            class.rationale,
            novelty.score,
            novelty.level_label(),
            novelty.description,
            novelty.strengths.join(", "),
            novelty.limitations.join(", ")
        );
        let reply = self.chat.complete(SCORER_SYSTEM, &prompt).await?;
        let parsed: ScoreReply =
            parse_json_reply(&reply).map_err(|e| malformed(RoleKind::Scorer, e))?;

        Ok(RoleOutput::Score(ScoreOutput {
            score: parsed.score,
            rationale: parsed.rationale,
            breakdown: parsed.breakdown,
        }))
    }
}

// ── Arbiter ─────────────────────────────────────────────────────────────────

pub struct LlmArbiter {
    chat: Arc<dyn ChatBackend>,
}

impl LlmArbiter {
    pub fn new(chat: Arc<dyn ChatBackend>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Arbiter for LlmArbiter {
    async fn arbitrate(&self, context: &str) -> Result<String, ArbitrationError> {
        Ok(self.chat.complete(ARBITER_SYSTEM, context).await?)
    }
}

/// The four LLM roles sharing one chat backend.
pub fn llm_roles(chat: Arc<dyn ChatBackend>, config: &AnalysisConfig) -> Result<RoleSet, SetupError> {
    RoleSet::new(
        Arc::new(LlmSummarizer::new(chat.clone(), config)),
        Arc::new(LlmClassifier::new(chat.clone(), config)),
        Arc::new(LlmNoveltyAssessor::new(chat.clone())),
        Arc::new(LlmScorer::new(chat)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{self, ScriptedChat};

    fn chat(replies: &[&str]) -> Arc<ScriptedChat> {
        Arc::new(ScriptedChat::replying(replies.iter().copied()))
    }

    #[tokio::test]
    async fn summarizer_reads_fenced_json_and_drops_blank_area() {
        let chat = chat(&["```json\n{\"research_problem\": \"p\", \"methodology\": \"m\", \
             \"innovations\": \"i\", \"findings\": \"f\", \"impact\": \"x\", \"area\": \"  \"}\n```"]);
        let role = LlmSummarizer::new(chat.clone(), &AnalysisConfig::default());

        let out = role
            .invoke(&fakes::paper("p1"), &OutputBundle::new())
            .await
            .unwrap();

        let RoleOutput::Summary(summary) = out else {
            panic!("expected summary output");
        };
        assert_eq!(summary.research_problem, "p");
        assert_eq!(summary.implied_category, None);
        assert!(chat.prompts()[0].1.contains("Title: "));
    }

    #[tokio::test]
    async fn classifier_needs_summary() {
        let role = LlmClassifier::new(chat(&[]), &AnalysisConfig::default());
        let err = role
            .invoke(&fakes::paper("p1"), &OutputBundle::new())
            .await
            .unwrap_err();
        assert_eq!(err, RoleInvocationError::MissingPrior(RoleKind::Summarizer));
    }

    #[tokio::test]
    async fn classifier_lists_categories_and_rejects_incomplete_reply() {
        let chat = chat(&["{\"category\": \"AI Safety & Alignment\"}"]);
        let role = LlmClassifier::new(chat.clone(), &AnalysisConfig::default());
        let mut prior = OutputBundle::new();
        prior.insert(fakes::summary_output(None));

        let err = role.invoke(&fakes::paper("p1"), &prior).await.unwrap_err();

        assert!(matches!(err, RoleInvocationError::MalformedResponse(_)));
        assert!(chat.prompts()[0].0.contains("AI Safety & Alignment"));
    }

    #[tokio::test]
    async fn novelty_falls_back_to_prose() {
        let chat = chat(&["A breakthrough result. Novelty score: 9/10."]);
        let role = LlmNoveltyAssessor::new(chat);
        let mut prior = OutputBundle::new();
        prior.insert(fakes::summary_output(None));

        let out = role.invoke(&fakes::paper("p1"), &prior).await.unwrap();

        let RoleOutput::Novelty(novelty) = out else {
            panic!("expected novelty output");
        };
        assert_eq!(novelty.level, Some(NoveltyLevel::Breakthrough));
        assert_eq!(novelty.score, 9.0);
    }

    #[tokio::test]
    async fn novelty_json_keeps_missing_fields_absent() {
        let role = LlmNoveltyAssessor::new(chat(&["{\"level\": \"sideways\"}"]));
        let mut prior = OutputBundle::new();
        prior.insert(fakes::summary_output(None));

        let out = role.invoke(&fakes::paper("p1"), &prior).await.unwrap();

        let RoleOutput::Novelty(novelty) = out else {
            panic!("expected novelty output");
        };
        assert_eq!(novelty.level, None);
        assert!(novelty.score.is_nan());
    }

    #[tokio::test]
    async fn novelty_prose_without_cues_stays_absent() {
        let role = LlmNoveltyAssessor::new(chat(&["We highlight higher accuracy."]));
        let mut prior = OutputBundle::new();
        prior.insert(fakes::summary_output(None));

        let out = role.invoke(&fakes::paper("p1"), &prior).await.unwrap();

        let RoleOutput::Novelty(novelty) = out else {
            panic!("expected novelty output");
        };
        assert_eq!(novelty.level, None);
        assert!(novelty.score.is_nan());
    }

    #[tokio::test]
    async fn scorer_passes_out_of_range_score_through() {
        let role = LlmScorer::new(chat(&["{\"score\": 14.0, \"rationale\": \"great\"}"]));
        let bundle = fakes::clean_bundle();
        let mut prior = OutputBundle::new();
        for kind in [RoleKind::Summarizer, RoleKind::Classifier, RoleKind::NoveltyAssessor] {
            if let Some(output) = bundle.get(kind) {
                prior.insert(output.clone());
            }
        }

        let out = role.invoke(&fakes::paper("p1"), &prior).await.unwrap();

        let RoleOutput::Score(score) = out else {
            panic!("expected score output");
        };
        assert_eq!(score.score, 14.0);
        assert!(score.breakdown.is_empty());
    }

    #[tokio::test]
    async fn scorer_requires_novelty() {
        let role = LlmScorer::new(chat(&[]));
        let mut prior = OutputBundle::new();
        prior.insert(fakes::summary_output(None));
        prior.insert(fakes::classification_output(fakes::CLEAN_CATEGORY, 0.9));

        let err = role.invoke(&fakes::paper("p1"), &prior).await.unwrap_err();
        assert_eq!(
            err,
            RoleInvocationError::MissingPrior(RoleKind::NoveltyAssessor)
        );
    }

    #[tokio::test]
    async fn backend_failure_is_unavailable() {
        let chat = Arc::new(ScriptedChat::new([Err("overloaded".to_string())]));
        let role = LlmSummarizer::new(chat, &AnalysisConfig::default());

        let err = role
            .invoke(&fakes::paper("p1"), &OutputBundle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RoleInvocationError::Unavailable(_)));
    }

    #[tokio::test]
    async fn llm_roles_fill_every_slot() {
        let set = llm_roles(chat(&[]), &AnalysisConfig::default()).unwrap();
        let kinds: Vec<RoleKind> = set.in_order().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, RoleKind::PIPELINE.to_vec());
    }

    #[tokio::test]
    async fn arbiter_forwards_context() {
        let chat = chat(&["Trust the scorer."]);
        let arbiter = LlmArbiter::new(chat.clone());

        let text = arbiter.arbitrate("Conflicts:\n- x: y").await.unwrap();

        assert_eq!(text, "Trust the scorer.");
        assert_eq!(chat.prompts()[0].1, "Conflicts:\n- x: y");
    }
}
