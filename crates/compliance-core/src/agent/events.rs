//! Lifecycle events and handlers for orchestration runs.
//!
//! The orchestrator and the reasoning engines communicate with callers
//! through [`RunEvent`] variants covering a run from cycle start through
//! tool execution to the final halt. Callers implement [`EventHandler`] to
//! observe these events for logging, tracing, metrics or approval gates.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | [`ExecutionTracer`](super::tracer::ExecutionTracer) | The per-cycle trace log |

use crate::agent::records::HaltReason;
use crate::context::budget::BudgetTracker;
use crate::tools::{ToolName, ToolOutcome};
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted during a run.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// A new cycle is about to call the reasoning engine.
    CycleStart {
        cycle: usize,
        max_cycles: usize,
        budget: &'a BudgetTracker,
    },
    /// A reasoning exchange began.
    ChainStart { name: &'a str },
    /// A reasoning exchange ended with this output.
    ChainEnd { output: &'a str },
    /// A request to the reasoning engine is in flight.
    ReasoningStart,
    /// The reasoning engine answered.
    ReasoningEnd { text: &'a str },
    /// Free text the engine produced alongside tool calls.
    Thinking(&'a str),
    /// The engine proposed a tool call. `tool` is the raw proposed name.
    ActionDecided { tool: &'a str, arguments: &'a str },
    /// The proposed tool is not in the catalog; nothing was executed.
    UnknownTool { name: &'a str },
    /// A tool needs approval before it runs. Handlers answer with
    /// [`EventResponse::Approve`] or [`EventResponse::Deny`].
    ApprovalRequired { name: ToolName, arguments: &'a str },
    /// A tool is about to run.
    ToolStart { name: ToolName, arguments: &'a str },
    /// A tool finished.
    ToolEnd {
        name: ToolName,
        outcome: &'a ToolOutcome,
    },
    /// The engine produced its final text for this exchange.
    Finished { output: &'a str },
    /// Token usage reported by the API for one call.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The reflection step answered.
    Reflection { cycle: usize, proceed: bool },
    /// The loop stopped.
    Halted { reason: HaltReason, cycles: usize },
}

/// Response from an event handler for events that support feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResponse {
    Approve,
    /// Deny with a reason passed back to the engine.
    Deny(String),
}

/// Handler for run events.
///
/// Most events are informational and the return value is ignored. For
/// [`RunEvent::ApprovalRequired`], return `Some(EventResponse::Deny(reason))`
/// to block the call; `None` or `Approve` lets it run.
///
/// ```ignore
/// struct NoTickets;
///
/// impl EventHandler for NoTickets {
///     fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
///         match event {
///             RunEvent::ApprovalRequired { name, .. } if name.is_ticketing() => {
///                 Some(EventResponse::Deny("ticketing disabled for dry runs".into()))
///             }
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
        let _ = event;
        None
    }
}

/// Auto-approves everything and records nothing.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&RunEvent<'_>) -> Option<EventResponse> + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&RunEvent<'_>) -> Option<EventResponse> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&RunEvent<'_>) -> Option<EventResponse> + Send + Sync,
{
    fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
        (self.0)(event)
    }
}

/// Dispatches to several handlers in order.
///
/// Every handler sees every event; the first non-`None` response wins.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(dry_run, deny_tickets);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain. Handlers are called in registration order.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
        let mut response = None;
        for handler in &self.handlers {
            let r = handler.on_event(event);
            if response.is_none() {
                response = r;
            }
        }
        response
    }
}

/// Borrowed pair of handlers: `first` always sees the event before `second`,
/// and `second`'s response wins. The orchestrator uses this to put its
/// tracer in front of the caller's handler.
pub(crate) struct Chained<'a> {
    pub first: &'a dyn EventHandler,
    pub second: &'a dyn EventHandler,
}

impl EventHandler for Chained<'_> {
    fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
        let first = self.first.on_event(event);
        self.second.on_event(event).or(first)
    }
}

fn preview(text: &str, max: usize) -> String {
    let head: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        format!("{head}...")
    } else {
        head
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
        match event {
            RunEvent::CycleStart {
                cycle,
                max_cycles,
                budget,
            } => {
                info!("[cycle {cycle}/{max_cycles}] {}", budget.to_log_string());
            }
            RunEvent::ChainStart { name } => debug!("Chain start: {name}"),
            RunEvent::ChainEnd { output } => {
                debug!("Chain completed: {}", preview(output, 200));
            }
            RunEvent::ReasoningStart => trace!("LLM thinking..."),
            RunEvent::ReasoningEnd { text } => {
                debug!("LLM response: {}", preview(text, 200));
            }
            RunEvent::Thinking(text) => debug!("Thinking: {}", preview(text, 200)),
            RunEvent::ActionDecided { tool, arguments } => {
                debug!("Agent decided: {tool} with input: {}", preview(arguments, 120));
            }
            RunEvent::UnknownTool { name } => {
                warn!("Engine proposed unknown tool '{name}'; skipped");
            }
            RunEvent::ApprovalRequired { name, .. } => {
                info!("Approval required for tool: {name}");
            }
            RunEvent::ToolStart { name, .. } => debug!("Executing tool: {name}"),
            RunEvent::ToolEnd { name, outcome } => {
                debug!(
                    "Tool {name} {}: {} bytes",
                    if outcome.is_success() { "succeeded" } else { "failed" },
                    outcome.text().len()
                );
            }
            RunEvent::Finished { output } => {
                debug!("Agent finished: {}", preview(output, 200));
            }
            RunEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            RunEvent::Reflection { cycle, proceed } => {
                info!(
                    "Reflection after cycle {cycle}: {}",
                    if *proceed { "continue" } else { "stop" }
                );
            }
            RunEvent::Halted { reason, cycles } => {
                info!("Run halted after {cycles} cycle(s): {reason}");
            }
        }
        None
    }
}
