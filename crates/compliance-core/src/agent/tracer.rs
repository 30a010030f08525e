//! The execution tracer: a bounded, ordered log of lifecycle events.
//!
//! Every entry carries a [`TraceKind`] tag and a rendered line whose payload
//! is truncated to a per-kind cap, so a trace (and any prompt built from
//! it) stays bounded no matter how large tool outputs get. The tracer keeps
//! no history across cycles; the orchestrator drains it into each cycle
//! record.

use crate::agent::events::{EventHandler, EventResponse, RunEvent};
use crate::tools::truncate_chars;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Payload cap for tool output entries.
pub const TOOL_OUTPUT_CAP: usize = 1000;

/// Payload cap for every other entry.
pub const DEFAULT_CAP: usize = 500;

/// Semantic kind of a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    ChainStart,
    ChainEnd,
    ToolStart,
    ToolEnd,
    ReasoningStart,
    ReasoningEnd,
    Thinking,
    ActionDecided,
    Finished,
}

impl TraceKind {
    /// Maximum payload characters kept for this kind.
    pub fn cap(self) -> usize {
        match self {
            TraceKind::ToolEnd => TOOL_OUTPUT_CAP,
            _ => DEFAULT_CAP,
        }
    }

    /// Auditable actions: always kept by the condenser.
    pub fn is_action(self) -> bool {
        matches!(
            self,
            TraceKind::ToolStart | TraceKind::ToolEnd | TraceKind::ActionDecided | TraceKind::Finished
        )
    }

    /// Exploratory reasoning: sampled by the condenser.
    pub fn is_thinking(self) -> bool {
        matches!(
            self,
            TraceKind::Thinking | TraceKind::ReasoningStart | TraceKind::ReasoningEnd
        )
    }

    fn prefix(self) -> &'static str {
        match self {
            TraceKind::ChainStart => "Chain start: ",
            TraceKind::ChainEnd => "Chain completed with result: ",
            TraceKind::ToolStart => "Tool called: ",
            TraceKind::ToolEnd => "Tool returned: ",
            TraceKind::ReasoningStart => "LLM thinking...",
            TraceKind::ReasoningEnd => "LLM response: ",
            TraceKind::Thinking => "Thinking: ",
            TraceKind::ActionDecided => "Agent decided: ",
            TraceKind::Finished => "Agent finished: ",
        }
    }
}

/// One rendered trace line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub text: String,
}

impl TraceEntry {
    /// Render `payload` under `kind`, truncated to the kind's cap.
    pub fn new(kind: TraceKind, payload: &str) -> Self {
        let text = if kind == TraceKind::ReasoningStart {
            kind.prefix().to_string()
        } else {
            format!("{}{}", kind.prefix(), truncate_chars(payload, kind.cap()))
        };
        Self { kind, text }
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render entries one per line.
pub fn render(entries: &[TraceEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collects trace entries from run events.
///
/// Interior mutability lets it sit behind `&dyn EventHandler` alongside
/// the caller's handler.
#[derive(Debug, Default)]
pub struct ExecutionTracer {
    entries: Mutex<Vec<TraceEntry>>,
}

impl ExecutionTracer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceEntry>> {
        // A poisoned trace is still a valid trace.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn record(&self, kind: TraceKind, payload: &str) {
        self.lock().push(TraceEntry::new(kind, payload));
    }

    /// Snapshot of the current entries.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.lock().clone()
    }

    /// Take every entry, leaving the tracer empty.
    pub fn drain(&self) -> Vec<TraceEntry> {
        std::mem::take(&mut *self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl EventHandler for ExecutionTracer {
    fn on_event(&self, event: &RunEvent<'_>) -> Option<EventResponse> {
        match event {
            RunEvent::ChainStart { name } => self.record(TraceKind::ChainStart, name),
            RunEvent::ChainEnd { output } => self.record(TraceKind::ChainEnd, output),
            RunEvent::ReasoningStart => self.record(TraceKind::ReasoningStart, ""),
            RunEvent::ReasoningEnd { text } => self.record(TraceKind::ReasoningEnd, text),
            RunEvent::Thinking(text) => self.record(TraceKind::Thinking, text),
            RunEvent::ActionDecided { tool, arguments } => self.record(
                TraceKind::ActionDecided,
                &format!("{tool} with input: {arguments}"),
            ),
            RunEvent::UnknownTool { name } => {
                self.record(TraceKind::ToolEnd, &format!("Error: unknown tool '{name}'"))
            }
            RunEvent::ToolStart { name, arguments } => self.record(
                TraceKind::ToolStart,
                &format!("{name} with input: {arguments}"),
            ),
            RunEvent::ToolEnd { outcome, .. } => {
                self.record(TraceKind::ToolEnd, &outcome.to_model_text())
            }
            RunEvent::Finished { output } => self.record(TraceKind::Finished, output),
            RunEvent::CycleStart { .. }
            | RunEvent::ApprovalRequired { .. }
            | RunEvent::TokenUsage { .. }
            | RunEvent::Reflection { .. }
            | RunEvent::Halted { .. } => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{TRUNCATION_MARKER, ToolName, ToolOutcome};

    #[test]
    fn entries_render_with_tags() {
        let tracer = ExecutionTracer::new();
        tracer.on_event(&RunEvent::ChainStart { name: "compliance_cycle" });
        tracer.on_event(&RunEvent::ReasoningStart);
        tracer.on_event(&RunEvent::ToolStart {
            name: ToolName::ListS3Buckets,
            arguments: "{}",
        });
        tracer.on_event(&RunEvent::ToolEnd {
            name: ToolName::ListS3Buckets,
            outcome: &ToolOutcome::failure("access denied"),
        });
        let lines: Vec<String> = tracer.entries().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "Chain start: compliance_cycle",
                "LLM thinking...",
                "Tool called: list_s3_buckets with input: {}",
                "Tool returned: Error: access denied",
            ]
        );
    }

    #[test]
    fn payloads_are_capped_per_kind() {
        let big = "x".repeat(5000);
        let tool = TraceEntry::new(TraceKind::ToolEnd, &big);
        assert_eq!(
            tool.text.chars().count(),
            "Tool returned: ".len() + TOOL_OUTPUT_CAP + TRUNCATION_MARKER.len()
        );
        let thinking = TraceEntry::new(TraceKind::Thinking, &big);
        assert_eq!(
            thinking.text.chars().count(),
            "Thinking: ".len() + DEFAULT_CAP + TRUNCATION_MARKER.len()
        );
    }

    #[test]
    fn drain_clears() {
        let tracer = ExecutionTracer::new();
        tracer.record(TraceKind::Finished, "done");
        assert_eq!(tracer.drain().len(), 1);
        assert!(tracer.is_empty());
    }

    #[test]
    fn bookkeeping_events_are_not_traced() {
        let tracer = ExecutionTracer::new();
        tracer.on_event(&RunEvent::TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 1,
        });
        tracer.on_event(&RunEvent::Reflection {
            cycle: 1,
            proceed: false,
        });
        assert!(tracer.is_empty());
    }

    #[test]
    fn unknown_tools_leave_a_tool_entry() {
        let tracer = ExecutionTracer::new();
        tracer.on_event(&RunEvent::UnknownTool { name: "rm_rf" });
        let entries = tracer.entries();
        assert_eq!(entries[0].kind, TraceKind::ToolEnd);
        assert!(entries[0].text.contains("unknown tool 'rm_rf'"));
    }

    #[test]
    fn kind_classes_are_disjoint() {
        let all = [
            TraceKind::ChainStart,
            TraceKind::ChainEnd,
            TraceKind::ToolStart,
            TraceKind::ToolEnd,
            TraceKind::ReasoningStart,
            TraceKind::ReasoningEnd,
            TraceKind::Thinking,
            TraceKind::ActionDecided,
            TraceKind::Finished,
        ];
        for kind in all {
            assert!(!(kind.is_action() && kind.is_thinking()));
        }
    }
}
