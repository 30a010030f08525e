//! Cycle and tool invocation records, and the run's memory.

use crate::agent::tracer::TraceEntry;
use crate::tools::{ToolName, ToolOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One executed (or denied) tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub tool: ToolName,
    /// Parsed argument mapping; raw text if it was not valid JSON.
    pub arguments: Value,
    pub outcome: ToolOutcome,
}

impl ToolInvocationRecord {
    pub fn new(tool: ToolName, raw_arguments: &str, outcome: ToolOutcome) -> Self {
        let arguments = if raw_arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw_arguments)
                .unwrap_or_else(|_| Value::String(raw_arguments.to_string()))
        };
        Self {
            tool,
            arguments,
            outcome,
        }
    }
}

/// One iteration of the loop. Immutable once appended to [`Memory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// 1-based.
    pub index: usize,
    pub output: String,
    pub invocations: Vec<ToolInvocationRecord>,
    pub trace: Vec<TraceEntry>,
    /// Set when the reasoning exchange failed; `invocations` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only cycle list with a hard capacity.
#[derive(Debug, Clone)]
pub struct Memory {
    cycles: Vec<CycleRecord>,
    capacity: usize,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cycles: Vec::with_capacity(capacity.min(16)),
            capacity,
        }
    }

    /// Append a record. Hands it back if memory is full.
    pub fn push(&mut self, record: CycleRecord) -> Result<(), CycleRecord> {
        if self.cycles.len() >= self.capacity {
            return Err(record);
        }
        self.cycles.push(record);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.cycles.len() >= self.capacity
    }

    pub fn cycles(&self) -> &[CycleRecord] {
        &self.cycles
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> &[CycleRecord] {
        let start = self.cycles.len().saturating_sub(n);
        &self.cycles[start..]
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Every invocation across all cycles, in execution order.
    pub fn invocations(&self) -> impl Iterator<Item = &ToolInvocationRecord> {
        self.cycles.iter().flat_map(|c| c.invocations.iter())
    }

    pub fn into_cycles(self) -> Vec<CycleRecord> {
        self.cycles
    }
}

/// Ticket counts for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounts {
    /// Every `create_issue` invocation, successful or not.
    pub attempted: usize,
    /// Invocations whose outcome was a success.
    pub confirmed: usize,
}

impl TicketCounts {
    pub fn from_invocations<'a>(records: impl IntoIterator<Item = &'a ToolInvocationRecord>) -> Self {
        records
            .into_iter()
            .filter(|r| r.tool.is_ticketing())
            .fold(Self::default(), |mut acc, r| {
                acc.attempted += 1;
                if r.outcome.is_success() {
                    acc.confirmed += 1;
                }
                acc
            })
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    CycleLimit,
    BudgetThreshold,
    ReflectionDeclined,
    ReflectionFailed,
    CycleFailed,
}

impl HaltReason {
    pub fn as_str(self) -> &'static str {
        match self {
            HaltReason::CycleLimit => "cycle_limit",
            HaltReason::BudgetThreshold => "budget_threshold",
            HaltReason::ReflectionDeclined => "reflection_declined",
            HaltReason::ReflectionFailed => "reflection_failed",
            HaltReason::CycleFailed => "cycle_failed",
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(index: usize, invocations: Vec<ToolInvocationRecord>) -> CycleRecord {
        CycleRecord {
            index,
            output: format!("cycle {index}"),
            invocations,
            trace: vec![],
            error: None,
        }
    }

    #[test]
    fn arguments_parse_or_fall_back_to_text() {
        let r = ToolInvocationRecord::new(ToolName::ScanForSecrets, r#"{"code_content":"x"}"#, ToolOutcome::success("{}"));
        assert_eq!(r.arguments["code_content"], "x");
        let r = ToolInvocationRecord::new(ToolName::ListS3Buckets, "", ToolOutcome::success(""));
        assert_eq!(r.arguments, serde_json::json!({}));
        let r = ToolInvocationRecord::new(ToolName::ListS3Buckets, "not json", ToolOutcome::success(""));
        assert_eq!(r.arguments, "not json");
    }

    #[test]
    fn memory_refuses_past_capacity() {
        let mut memory = Memory::new(2);
        assert!(memory.push(cycle(1, vec![])).is_ok());
        assert!(memory.push(cycle(2, vec![])).is_ok());
        assert!(memory.is_full());
        let rejected = memory.push(cycle(3, vec![])).unwrap_err();
        assert_eq!(rejected.index, 3);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut memory = Memory::new(5);
        for i in 1..=5 {
            memory.push(cycle(i, vec![])).unwrap();
        }
        let idx: Vec<usize> = memory.recent(3).iter().map(|c| c.index).collect();
        assert_eq!(idx, vec![3, 4, 5]);
        assert_eq!(memory.recent(10).len(), 5);
    }

    #[test]
    fn ticket_counts_distinguish_attempted_and_confirmed() {
        let records = vec![
            ToolInvocationRecord::new(
                ToolName::CreateIssue,
                "{}",
                ToolOutcome::success("Issue created successfully: SEC-1"),
            ),
            ToolInvocationRecord::new(
                ToolName::CreateIssue,
                "{}",
                ToolOutcome::failure("Failed to create issue: 400"),
            ),
            ToolInvocationRecord::new(ToolName::ListS3Buckets, "{}", ToolOutcome::success("[]")),
        ];
        let counts = TicketCounts::from_invocations(&records);
        assert_eq!(counts, TicketCounts { attempted: 2, confirmed: 1 });
    }

    #[test]
    fn halt_reason_wire_names() {
        assert_eq!(serde_json::to_value(HaltReason::BudgetThreshold).unwrap(), "budget_threshold");
        assert_eq!(HaltReason::ReflectionDeclined.to_string(), "reflection_declined");
    }
}
