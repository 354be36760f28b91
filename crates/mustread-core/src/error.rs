//! Error taxonomy for the analysis pipeline.
//!
//! Only [`SetupError`] and [`ConfigError`] can stop a batch from starting.
//! Everything raised while a batch is running is local to one paper.

use crate::roles::RoleKind;

/// A role failed to produce output for a paper.
///
/// Becomes the paper's failure cause; never aborts the batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoleInvocationError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("missing prior output from {0}")]
    MissingPrior(RoleKind),

    #[error("produced {actual} output where {expected} output was expected")]
    UnexpectedOutput { expected: RoleKind, actual: RoleKind },
}

/// The arbitration step failed.
///
/// Recovered locally: the paper keeps its successful bundle and an empty
/// conflict report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArbitrationError {
    #[error("arbiter unavailable: {0}")]
    Unavailable(String),

    #[error("arbiter returned an empty resolution")]
    EmptyResponse,

    #[error("arbitration cancelled")]
    Cancelled,

    #[error("arbitration timed out after {0}s")]
    TimedOut(u64),
}

/// A role output failed shape or range validation.
///
/// Always surfaces as a conflict (forcing arbitration), never as a failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{role} output malformed ({aspect}): {detail}")]
pub struct MalformedOutput {
    pub role: RoleKind,
    /// Conflict aspect this malformation is reported under.
    pub aspect: &'static str,
    pub detail: String,
}

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {var} is not set")]
    MissingApiKey { var: String },
}

/// Programming-contract violations detected while wiring a coordinator.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("role registered in the {slot} slot reports itself as {actual}")]
    RoleSlotMismatch { slot: RoleKind, actual: RoleKind },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build backend: {0}")]
    Backend(String),
}
