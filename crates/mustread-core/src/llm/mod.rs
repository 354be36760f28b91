//! LLM-backed role backends.
//!
//! - [`client`]: `ChatBackend` seam and the OpenAI-compatible `OpenAiChat`
//! - [`parse`]: extracting JSON payloads from model replies
//! - [`roles`]: the four analysis roles and the arbiter over a `ChatBackend`

pub mod client;
pub mod parse;
pub mod roles;

pub use client::{ChatBackend, LlmError, OpenAiChat};
pub use roles::{llm_roles, LlmArbiter, LlmClassifier, LlmNoveltyAssessor, LlmScorer, LlmSummarizer};
