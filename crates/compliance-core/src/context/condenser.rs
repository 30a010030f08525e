//! Memory condensation: bounded summaries of prior cycles.
//!
//! The next reasoning prompt sees the last few cycles through this module:
//! each tool result cut to [`RESULT_CAP`] characters and each trace log
//! reduced to its auditable actions plus a small sample of reasoning steps.

use crate::agent::records::CycleRecord;
use crate::agent::tracer::TraceEntry;
use crate::tools::{ToolName, ToolOutcome, truncate_chars};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum characters kept from each tool result.
pub const RESULT_CAP: usize = 500;

/// Logs shorter than this are never reduced.
pub const MIN_REDUCIBLE: usize = 10;

/// Logs longer than this are reduced.
pub const REDUCE_ABOVE: usize = 30;

/// Reasoning entries kept from each end of a long log.
pub const THINKING_SAMPLE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondensedInvocation {
    pub tool: ToolName,
    pub arguments: Value,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondensedCycle {
    pub index: usize,
    pub output: String,
    pub invocations: Vec<CondensedInvocation>,
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reduce a trace log.
///
/// Logs of up to [`REDUCE_ABOVE`] entries come back unchanged. Longer logs
/// keep every action entry and the first and last [`THINKING_SAMPLE`]
/// reasoning entries (all of them if there are no more than twice that).
/// Everything else is dropped. Chronological order is preserved.
pub fn reduce_trace(entries: &[TraceEntry]) -> Vec<TraceEntry> {
    if entries.len() < MIN_REDUCIBLE || entries.len() <= REDUCE_ABOVE {
        return entries.to_vec();
    }

    let thinking: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind.is_thinking())
        .map(|(i, _)| i)
        .collect();
    let sampled: Vec<usize> = if thinking.len() > THINKING_SAMPLE * 2 {
        thinking
            .iter()
            .take(THINKING_SAMPLE)
            .chain(thinking.iter().skip(thinking.len() - THINKING_SAMPLE))
            .copied()
            .collect()
    } else {
        thinking
    };

    entries
        .iter()
        .enumerate()
        .filter(|(i, e)| e.kind.is_action() || sampled.contains(i))
        .map(|(_, e)| e.clone())
        .collect()
}

pub fn condense_cycle(cycle: &CycleRecord) -> CondensedCycle {
    CondensedCycle {
        index: cycle.index,
        output: cycle.output.clone(),
        invocations: cycle
            .invocations
            .iter()
            .map(|r| CondensedInvocation {
                tool: r.tool,
                arguments: r.arguments.clone(),
                outcome: r.outcome.clone().map_text(|t| truncate_chars(&t, RESULT_CAP)),
            })
            .collect(),
        logs: reduce_trace(&cycle.trace)
            .into_iter()
            .map(|e| e.text)
            .collect(),
        error: cycle.error.clone(),
    }
}

pub fn condense(cycles: &[CycleRecord]) -> Vec<CondensedCycle> {
    cycles.iter().map(condense_cycle).collect()
}

/// Prompt-ready history, or `"None"` before the first cycle.
pub fn render_history(condensed: &[CondensedCycle]) -> String {
    if condensed.is_empty() {
        return "None".into();
    }
    serde_json::to_string_pretty(condensed).unwrap_or_else(|_| "None".into())
}
