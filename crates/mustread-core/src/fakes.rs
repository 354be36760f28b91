//! In-memory test doubles for roles, the arbiter and the chat backend.
//!
//! `ScriptedRole`, `ScriptedArbiter` and `ScriptedChat` satisfy the trait
//! contracts without any model or network, and record every call so tests
//! can assert on what the coordinator did.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::conflict::Arbiter;
use crate::domain::Paper;
use crate::error::{ArbitrationError, RoleInvocationError, SetupError};
use crate::llm::{ChatBackend, LlmError};
use crate::roles::{
    ClassificationOutput, NoveltyLevel, NoveltyOutput, OutputBundle, Role, RoleKind, RoleOutput,
    RoleSet, ScoreOutput, SummaryOutput,
};

// ---------------------------------------------------------------------------
// Canned values
// ---------------------------------------------------------------------------

/// Category used by the canned classification.
pub const CLEAN_CATEGORY: &str = "AI Safety & Alignment";

pub fn paper(id: &str) -> Paper {
    Paper::new(
        id,
        format!("Paper {id}"),
        "We propose a novel alignment method and show it outperforms baselines.",
    )
    .with_authors(["Jane Doe"])
}

pub fn summary_output(implied_category: Option<&str>) -> RoleOutput {
    RoleOutput::Summary(SummaryOutput {
        research_problem: "Aligning language models".to_string(),
        methodology: "Preference optimisation".to_string(),
        innovations: "A new reward shaping scheme".to_string(),
        findings: "Beats baselines on three benchmarks".to_string(),
        impact: "Safer assistants".to_string(),
        implied_category: implied_category.map(str::to_string),
    })
}

pub fn classification_output(category: &str, confidence: f64) -> RoleOutput {
    RoleOutput::Classification(ClassificationOutput {
        category: category.to_string(),
        confidence,
        rationale: "canned".to_string(),
    })
}

pub fn novelty_output(level: NoveltyLevel, score: f64) -> RoleOutput {
    RoleOutput::Novelty(NoveltyOutput {
        level: Some(level),
        score,
        description: "canned".to_string(),
        strengths: vec!["new objective".to_string()],
        limitations: vec![],
    })
}

pub fn score_output(score: f64) -> RoleOutput {
    RoleOutput::Score(ScoreOutput {
        score,
        rationale: "canned".to_string(),
        breakdown: BTreeMap::new(),
    })
}

/// Canned output for `kind` that raises no conflicts under the default policy.
pub fn clean_output(kind: RoleKind) -> RoleOutput {
    match kind {
        RoleKind::Summarizer => summary_output(None),
        RoleKind::Classifier => classification_output(CLEAN_CATEGORY, 0.8),
        RoleKind::NoveltyAssessor => novelty_output(NoveltyLevel::Significant, 7.0),
        RoleKind::Scorer => score_output(7.0),
    }
}

/// A complete bundle of [`clean_output`]s.
pub fn clean_bundle() -> OutputBundle {
    let mut bundle = OutputBundle::new();
    for kind in RoleKind::PIPELINE {
        bundle.insert(clean_output(kind));
    }
    bundle
}

// ---------------------------------------------------------------------------
// ScriptedRole
// ---------------------------------------------------------------------------

/// One recorded role invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleCall {
    pub paper_id: String,
    /// Roles present in the prior bundle at call time.
    pub prior_roles: Vec<RoleKind>,
}

type Reply = Result<RoleOutput, RoleInvocationError>;

/// Role that returns scripted replies, optionally per paper and after a delay.
pub struct ScriptedRole {
    kind: RoleKind,
    default: Reply,
    per_paper: HashMap<String, Reply>,
    delay: Option<Duration>,
    per_paper_delay: HashMap<String, Duration>,
    calls: Mutex<Vec<RoleCall>>,
}

impl ScriptedRole {
    /// Always reply with `output`, whatever kind it is.
    pub fn new(kind: RoleKind, output: RoleOutput) -> Self {
        Self {
            kind,
            default: Ok(output),
            per_paper: HashMap::new(),
            delay: None,
            per_paper_delay: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with [`clean_output`] for `kind`.
    pub fn clean(kind: RoleKind) -> Self {
        Self::new(kind, clean_output(kind))
    }

    /// Always fail with `error`.
    pub fn failing(kind: RoleKind, error: RoleInvocationError) -> Self {
        let mut role = Self::clean(kind);
        role.default = Err(error);
        role
    }

    pub fn with_output_for(mut self, paper_id: &str, output: RoleOutput) -> Self {
        self.per_paper.insert(paper_id.to_string(), Ok(output));
        self
    }

    pub fn failing_for(mut self, paper_id: &str, error: RoleInvocationError) -> Self {
        self.per_paper.insert(paper_id.to_string(), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_delay_for(mut self, paper_id: &str, delay: Duration) -> Self {
        self.per_paper_delay.insert(paper_id.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RoleCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn called_for(&self, paper_id: &str) -> bool {
        self.calls().iter().any(|c| c.paper_id == paper_id)
    }
}

#[async_trait]
impl Role for ScriptedRole {
    fn kind(&self) -> RoleKind {
        self.kind
    }

    async fn invoke(&self, paper: &Paper, prior: &OutputBundle) -> Reply {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RoleCall {
                paper_id: paper.id.clone(),
                prior_roles: prior.iter().map(|(k, _)| *k).collect(),
            });

        let delay = self
            .per_paper_delay
            .get(&paper.id)
            .copied()
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.per_paper
            .get(&paper.id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Four scripted roles, one per slot. Replace a field to script a scenario.
pub struct ScriptedPipeline {
    pub summarizer: Arc<ScriptedRole>,
    pub classifier: Arc<ScriptedRole>,
    pub novelty_assessor: Arc<ScriptedRole>,
    pub scorer: Arc<ScriptedRole>,
}

impl ScriptedPipeline {
    pub fn clean() -> Self {
        Self {
            summarizer: Arc::new(ScriptedRole::clean(RoleKind::Summarizer)),
            classifier: Arc::new(ScriptedRole::clean(RoleKind::Classifier)),
            novelty_assessor: Arc::new(ScriptedRole::clean(RoleKind::NoveltyAssessor)),
            scorer: Arc::new(ScriptedRole::clean(RoleKind::Scorer)),
        }
    }

    pub fn role_set(&self) -> Result<RoleSet, SetupError> {
        RoleSet::new(
            self.summarizer.clone(),
            self.classifier.clone(),
            self.novelty_assessor.clone(),
            self.scorer.clone(),
        )
    }

    /// Roles in pipeline order.
    pub fn roles(&self) -> [&Arc<ScriptedRole>; 4] {
        [
            &self.summarizer,
            &self.classifier,
            &self.novelty_assessor,
            &self.scorer,
        ]
    }

    /// Total invocations across all four roles.
    pub fn total_calls(&self) -> usize {
        self.roles().iter().map(|r| r.call_count()).sum()
    }
}

// ---------------------------------------------------------------------------
// ScriptedArbiter
// ---------------------------------------------------------------------------

/// Arbiter with a fixed reply that records every context it receives.
pub struct ScriptedArbiter {
    reply: Result<String, ArbitrationError>,
    delay: Option<Duration>,
    contexts: Mutex<Vec<String>>,
}

impl ScriptedArbiter {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ArbitrationError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn contexts(&self) -> Vec<String> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Arbiter for ScriptedArbiter {
    async fn arbitrate(&self, context: &str) -> Result<String, ArbitrationError> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedChat
// ---------------------------------------------------------------------------

/// Chat backend that pops queued replies in order.
///
/// `Err(body)` entries surface as an HTTP 503. An exhausted queue yields
/// [`LlmError::EmptyCompletion`].
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedChat {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for a queue of successful replies.
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|s| Ok(s.into())))
    }

    /// `(system, user)` prompt pairs received so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((system.to_string(), user.to_string()));
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(body)) => Err(LlmError::Status { status: 503, body }),
            None => Err(LlmError::EmptyCompletion),
        }
    }
}
