//! The reasoning client: the seam between the loop and the language model.
//!
//! A [`ReasoningEngine`] offers two calls. [`complete`](ReasoningEngine::complete)
//! is a plain prompt-to-text completion used for policy parsing, reflection
//! and synthesis. [`exchange`](ReasoningEngine::exchange) runs a whole
//! tool-calling exchange: the engine proposes calls, each one is executed
//! exactly once in proposal order through the [`ToolRegistry`], and the
//! result is observed before the engine's next step.
//!
//! Implementations:
//!
//! - [`ChatReasoner`] — OpenRouter chat completions with retry.
//! - [`ScriptedReasoner`] — replays a fixed script; drives tests and dry runs.

pub mod chat;
pub mod scripted;

pub use chat::{ApiUsage, ChatReasoner};
pub use scripted::{ScriptedExchange, ScriptedReasoner};

use crate::agent::events::{EventHandler, EventResponse, RunEvent};
use crate::agent::records::ToolInvocationRecord;
use crate::api::retry::is_context_length_error;
use crate::error::OrchestratorError;
use crate::tools::{ToolName, ToolOutcome, ToolRegistry};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Default cap on model turns within one exchange.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Failure of a reasoning call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReasoningError {
    /// The prompt did not fit the model's context window.
    #[error("context length exceeded: {0}")]
    ContextLength(String),
    #[error("{0}")]
    Request(String),
}

impl ReasoningError {
    /// Classify an error message from the engine.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_context_length_error(&message) {
            Self::ContextLength(message)
        } else {
            Self::Request(message)
        }
    }

    pub fn is_context_length(&self) -> bool {
        matches!(self, Self::ContextLength(_))
    }
}

impl From<ReasoningError> for OrchestratorError {
    fn from(e: ReasoningError) -> Self {
        match e {
            ReasoningError::ContextLength(m) => OrchestratorError::resource_exhausted(m),
            ReasoningError::Request(message) => OrchestratorError::Reasoning { message },
        }
    }
}

pub type ReasoningFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ReasoningError>> + Send + 'a>>;

/// One tool-calling exchange to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    /// Chain name, recorded in the trace.
    pub name: String,
    pub system: String,
    pub input: String,
    /// Tools offered to the engine. Proposals outside this set are refused.
    pub tools: Vec<ToolName>,
    pub max_rounds: usize,
}

impl ExchangeRequest {
    pub fn new(name: impl Into<String>, system: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: system.into(),
            input: input.into(),
            tools: Vec::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_tools(mut self, tools: &[ToolName]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    /// Whether `name` may be executed in this exchange.
    pub fn offers(&self, name: ToolName) -> bool {
        self.tools.contains(&name)
    }
}

/// What an exchange produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolExchange {
    pub output: String,
    /// Executed (or denied) calls, in execution order.
    pub invocations: Vec<ToolInvocationRecord>,
}

/// The reasoning engine.
///
/// Uses boxed futures so that the trait is dyn-compatible; the web layer
/// holds an `Arc<dyn ReasoningEngine>`.
pub trait ReasoningEngine: Send + Sync {
    /// Plain completion, no tools.
    fn complete<'a>(&'a self, prompt: &'a str) -> ReasoningFuture<'a, String>;

    /// Run a full tool-calling exchange.
    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
        tools: &'a ToolRegistry,
        events: &'a dyn EventHandler,
    ) -> ReasoningFuture<'a, ToolExchange>;
}

/// Execute one proposed call.
///
/// Returns the invocation record (absent for unknown or unoffered tools)
/// and the text the engine observes as the call's result.
pub(crate) async fn dispatch_call(
    request: &ExchangeRequest,
    tools: &ToolRegistry,
    events: &dyn EventHandler,
    raw_name: &str,
    arguments: &str,
) -> (Option<ToolInvocationRecord>, String) {
    events.on_event(&RunEvent::ActionDecided {
        tool: raw_name,
        arguments,
    });

    let name = match raw_name.parse::<ToolName>() {
        Ok(name) if request.offers(name) && tools.contains(name) => name,
        _ => {
            events.on_event(&RunEvent::UnknownTool { name: raw_name });
            return (
                None,
                format!("Error: unknown tool '{raw_name}'. Use only the tools provided."),
            );
        }
    };

    if tools.requires_approval(name)
        && let Some(EventResponse::Deny(reason)) =
            events.on_event(&RunEvent::ApprovalRequired { name, arguments })
    {
        debug!("Tool {name} denied: {reason}");
        let outcome = ToolOutcome::failure(format!("Tool '{name}' was denied: {reason}"));
        let text = outcome.to_model_text();
        events.on_event(&RunEvent::ToolEnd {
            name,
            outcome: &outcome,
        });
        return (Some(ToolInvocationRecord::new(name, arguments, outcome)), text);
    }

    events.on_event(&RunEvent::ToolStart { name, arguments });
    let outcome = tools.execute(name, arguments).await;
    events.on_event(&RunEvent::ToolEnd {
        name,
        outcome: &outcome,
    });
    let text = outcome.to_model_text();
    (Some(ToolInvocationRecord::new(name, arguments, outcome)), text)
}
