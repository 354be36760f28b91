//! MustRead Core Library
//!
//! Multi-role analysis pipeline for research-paper triage: a
//! [`WorkflowCoordinator`] runs Summarizer → Classifier → NoveltyAssessor →
//! Scorer over a batch of papers, isolates per-paper failures, and hands
//! completed bundles to a [`ConflictResolver`] for arbitration.

pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod heuristic;
pub mod llm;
pub mod obs;
pub mod reporting;
pub mod roles;
pub mod sample;
pub mod telemetry;

pub use config::{AnalysisConfig, CoordinatorSettings, LlmSettings, DEFAULT_CATEGORIES};
pub use conflict::{
    arbitration_context, validate_output, Arbiter, ConflictPolicy, ConflictReport,
    ConflictResolver, RoleConflict, ScoreRange, OTHER_CATEGORY,
};
pub use coordinator::{
    cancel_channel, BatchSummary, CancelSignal, ItemFailure, ItemResult, ItemSuccess,
    WorkflowCoordinator,
};
pub use domain::Paper;
pub use error::{ArbitrationError, ConfigError, MalformedOutput, RoleInvocationError, SetupError};
pub use heuristic::{rule_based_roles, RuleBasedArbiter};
pub use llm::{llm_roles, ChatBackend, LlmArbiter, LlmError, OpenAiChat};
pub use reporting::{
    render_ranked_report, write_ranked_report, write_results_json, ResultsArtifact,
    SCHEMA_VERSION,
};
pub use roles::{
    ClassificationOutput, NoveltyLevel, NoveltyOutput, OutputBundle, Role, RoleKind, RoleOutput,
    RoleSet, ScoreOutput, SummaryOutput,
};
pub use sample::sample_papers;
pub use telemetry::init_tracing;

/// MustRead version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
