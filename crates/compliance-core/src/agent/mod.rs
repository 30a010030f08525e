//! Agent runtime: the [`Orchestrator`] loop and its supporting modules.
//!
//! - [`orchestrator::Orchestrator`] — the budgeted plan/act/reflect loop.
//!   Start here.
//! - [`config::OrchestratorConfig`] — cycles, ceiling, views, model.
//! - [`events`] — [`EventHandler`] trait and [`RunEvent`] enum for observing
//!   a run. Includes [`LoggingHandler`], [`CompositeEventHandler`] and
//!   [`FnEventHandler`].
//! - [`tracer`] — the per-cycle execution log.
//! - [`records`] — cycle and invocation records, and the run's memory.
//! - [`fast_path`] — policy parser plus one pass over the inventory tools.
//! - [`analysis`] — single-exchange document and infrastructure analyses.
//! - [`policy`] and [`scoring`] — best-effort parsing of model answers.
//! - [`prompt`] — every prompt the engine sees.

pub mod analysis;
pub mod config;
pub mod events;
pub mod fast_path;
pub mod orchestrator;
pub mod policy;
pub mod prompt;
pub mod records;
pub mod scoring;
pub mod tracer;

pub use analysis::{AnalysisResult, Analyzer};
pub use config::OrchestratorConfig;
pub use events::{
    CompositeEventHandler, EventHandler, EventResponse, FnEventHandler, LoggingHandler,
    NoopHandler, RunEvent,
};
pub use fast_path::{FastFinding, FastReport, FindingStatus, fast_analyze};
pub use orchestrator::{FinalReport, Orchestrator, RunStatus};
pub use policy::{PolicyPlan, Priority, parse_policy};
pub use records::{CycleRecord, HaltReason, Memory, TicketCounts, ToolInvocationRecord};
pub use scoring::{ComplianceScore, parse_score};
pub use tracer::{ExecutionTracer, TraceEntry, TraceKind};
