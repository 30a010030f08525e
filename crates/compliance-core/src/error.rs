//! Error taxonomy for orchestration runs.
//!
//! Parsing failures never surface here (they degrade to documented
//! defaults) and tool failures are values ([`ToolOutcome::Failure`]).
//! What remains is what a caller must act on: the input was too large,
//! something was not found, the input was invalid, the reasoning engine
//! failed, or an internal invariant broke.
//!
//! [`ToolOutcome::Failure`]: crate::tools::core::ToolOutcome::Failure

use serde::{Deserialize, Serialize};

/// Failure of an orchestration entry point.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    /// The estimated cost of the input exceeds the budget, or the reasoning
    /// engine reported a context-length overflow.
    #[error("{message}")]
    ResourceExhausted { message: String },

    /// A referenced input (uploaded document, file) does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The caller supplied malformed or empty input.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The reasoning engine failed and no partial result could be built.
    #[error("reasoning engine failed: {message}")]
    Reasoning { message: String },

    /// Anything else.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OrchestratorError {
    /// The user-actionable message attached to every context-length failure.
    pub const TOO_LARGE_HINT: &'static str =
        "input too large for the analysis budget; reduce its size or use the fast_analyze mode";

    pub fn resource_exhausted(detail: impl std::fmt::Display) -> Self {
        Self::ResourceExhausted {
            message: format!("{}: {detail}", Self::TOO_LARGE_HINT),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The coarse classification used by boundary layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Reasoning { .. } => ErrorKind::Reasoning,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Structured, stack-trace-free body for the caller.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(e.to_string())
        } else {
            Self::internal(e.to_string())
        }
    }
}

/// Classification of an [`OrchestratorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResourceExhausted,
    NotFound,
    InvalidInput,
    Reasoning,
    Internal,
}

/// Error body returned across the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
