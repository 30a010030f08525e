//! A reasoning engine that replays a fixed script.
//!
//! Completions and exchanges are served from two queues in order. Once a
//! queue is empty every further call gets the configured default. Scripted
//! tool calls go through the real registry, so approval gates, validation
//! and the trace behave exactly as with a live model.

use super::{
    ExchangeRequest, ReasoningEngine, ReasoningError, ReasoningFuture, ToolExchange, dispatch_call,
};
use crate::agent::events::{EventHandler, RunEvent};
use crate::tools::ToolRegistry;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Completion served when the script runs out. Reflection reads it as "stop".
pub const DEFAULT_COMPLETION: &str = "NO";

/// Exchange output served when the script runs out.
pub const DEFAULT_EXCHANGE_OUTPUT: &str = "No further actions required.";

/// One scripted tool-calling exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedExchange {
    /// Free text emitted alongside the tool calls.
    pub thinking: Option<String>,
    /// `(tool name, JSON arguments)` in proposal order.
    pub calls: Vec<(String, String)>,
    pub output: String,
}

impl ScriptedExchange {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = Some(thinking.into());
        self
    }

    pub fn with_call(mut self, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        self.calls.push((name.into(), arguments.to_string()));
        self
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Deterministic [`ReasoningEngine`] for tests and dry runs.
///
/// ```ignore
/// let engine = ScriptedReasoner::new()
///     .with_exchange(ScriptedExchange::text("checked").with_call("list_s3_buckets", json!({})))
///     .with_completion("NO")
///     .with_completion("## Compliance Score\n**80/100**");
/// ```
#[derive(Debug)]
pub struct ScriptedReasoner {
    completions: Mutex<VecDeque<Result<String, ReasoningError>>>,
    exchanges: Mutex<VecDeque<Result<ScriptedExchange, ReasoningError>>>,
    default_completion: String,
    default_exchange: String,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            exchanges: Mutex::new(VecDeque::new()),
            default_completion: DEFAULT_COMPLETION.into(),
            default_exchange: DEFAULT_EXCHANGE_OUTPUT.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_completion(self, text: impl Into<String>) -> Self {
        lock(&self.completions).push_back(Ok(text.into()));
        self
    }

    pub fn with_completion_error(self, error: ReasoningError) -> Self {
        lock(&self.completions).push_back(Err(error));
        self
    }

    pub fn with_exchange(self, exchange: ScriptedExchange) -> Self {
        lock(&self.exchanges).push_back(Ok(exchange));
        self
    }

    pub fn with_exchange_error(self, error: ReasoningError) -> Self {
        lock(&self.exchanges).push_back(Err(error));
        self
    }

    pub fn with_default_completion(mut self, text: impl Into<String>) -> Self {
        self.default_completion = text.into();
        self
    }

    pub fn with_default_exchange_output(mut self, text: impl Into<String>) -> Self {
        self.default_exchange = text.into();
        self
    }

    /// Every prompt received so far, in order. Exchanges are recorded as
    /// their system prompt and input joined by a blank line.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    fn next_exchange(&self) -> Result<ScriptedExchange, ReasoningError> {
        lock(&self.exchanges)
            .pop_front()
            .unwrap_or_else(|| Ok(ScriptedExchange::text(self.default_exchange.clone())))
    }

    async fn run_exchange(
        &self,
        request: &ExchangeRequest,
        tools: &ToolRegistry,
        events: &dyn EventHandler,
    ) -> Result<ToolExchange, ReasoningError> {
        lock(&self.prompts).push(format!("{}\n\n{}", request.system, request.input));
        events.on_event(&RunEvent::ChainStart {
            name: &request.name,
        });
        events.on_event(&RunEvent::ReasoningStart);
        let script = self.next_exchange()?;

        let mut invocations = Vec::new();
        if !script.calls.is_empty() {
            let thinking = script.thinking.as_deref().unwrap_or_default();
            events.on_event(&RunEvent::ReasoningEnd { text: thinking });
            if !thinking.is_empty() {
                events.on_event(&RunEvent::Thinking(thinking));
            }
            for (name, arguments) in &script.calls {
                let (record, _) = dispatch_call(request, tools, events, name, arguments).await;
                invocations.extend(record);
            }
            events.on_event(&RunEvent::ReasoningStart);
        }

        events.on_event(&RunEvent::ReasoningEnd {
            text: &script.output,
        });
        events.on_event(&RunEvent::Finished {
            output: &script.output,
        });
        events.on_event(&RunEvent::ChainEnd {
            output: &script.output,
        });
        Ok(ToolExchange {
            output: script.output,
            invocations,
        })
    }
}

impl ReasoningEngine for ScriptedReasoner {
    fn complete<'a>(&'a self, prompt: &'a str) -> ReasoningFuture<'a, String> {
        Box::pin(async move {
            lock(&self.prompts).push(prompt.to_string());
            lock(&self.completions)
                .pop_front()
                .unwrap_or_else(|| Ok(self.default_completion.clone()))
        })
    }

    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
        tools: &'a ToolRegistry,
        events: &'a dyn EventHandler,
    ) -> ReasoningFuture<'a, ToolExchange> {
        Box::pin(self.run_exchange(request, tools, events))
    }
}
