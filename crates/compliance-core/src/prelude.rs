//! Convenience re-exports for common `compliance-core` types.
//!
//! ```ignore
//! use compliance_core::prelude::*;
//! ```
//!
//! Covers running the loop, the other analysis modes, and wiring tools and
//! handlers. Condenser internals and prompt text stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatRequest, Message, OpenRouterClient, ToolDef};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    AnalysisResult, Analyzer, ComplianceScore, CompositeEventHandler, EventHandler, EventResponse,
    ExecutionTracer, FastReport, FinalReport, FnEventHandler, HaltReason, LoggingHandler,
    NoopHandler, Orchestrator, OrchestratorConfig, Priority, RunEvent, RunStatus, fast_analyze,
};

// ── Budget and intake ───────────────────────────────────────────────
pub use crate::context::{BudgetTracker, PreparedInput, TokenUsage, Truncation, prepare};

// ── Reasoning ───────────────────────────────────────────────────────
pub use crate::reasoning::{ChatReasoner, ReasoningEngine, ReasoningError, ScriptedReasoner};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::spec::ToolSpec;
pub use crate::tools::{
    Tool, ToolFuture, ToolName, ToolOutcome, ToolRegistry, ToolsConfig, parse_tool_args,
    standard_registry,
};

// ── Errors ──────────────────────────────────────────────────────────
pub use crate::error::{ErrorKind, ErrorPayload, OrchestratorError};
