//! The orchestration loop: bounded plan/act/reflect cycles under a budget.
//!
//! One run:
//!
//! 1. Charge the input text to a fresh [`BudgetTracker`].
//! 2. For each cycle up to `max_cycles`: stop if the budget threshold is
//!    reached; condense the last few cycles into the prompt; run one
//!    tool-calling exchange; charge context and response; append a
//!    [`CycleRecord`] with the cycle's trace; then (unless this was the last
//!    cycle) ask the engine whether to continue.
//! 3. Compile a [`FinalReport`] from memory and ask the engine for a
//!    markdown synthesis.
//!
//! Tool calls are at-most-once per proposal and never rolled back. A failed
//! exchange ends the loop; the report is then `partial`, or the run fails
//! outright if nothing succeeded before it.

use crate::agent::config::OrchestratorConfig;
use crate::agent::events::{Chained, EventHandler, NoopHandler, RunEvent};
use crate::agent::prompt::{
    CYCLE_CHAIN, CYCLE_INPUT, FALLBACK_SUMMARY, cycle_system_prompt, is_affirmative,
    reflection_prompt, synthesis_prompt,
};
use crate::agent::records::{CycleRecord, HaltReason, Memory, TicketCounts, ToolInvocationRecord};
use crate::agent::scoring::{ComplianceScore, parse_score};
use crate::agent::tracer::{ExecutionTracer, render};
use crate::context::budget::{BudgetTracker, Charge, ChargeKind, TokenUsage};
use crate::context::condenser::{CondensedCycle, condense, render_history};
use crate::context::intake::{PreparedInput, prepare};
use crate::error::{OrchestratorError, Result};
use crate::reasoning::{ExchangeRequest, ReasoningEngine, ReasoningError, ToolExchange};
use crate::tools::{ToolName, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// `run-<utc timestamp>-<counter>`; the counter separates runs started in
/// the same microsecond.
fn new_run_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{}-{count:04x}", chrono::Utc::now().format("%Y%m%dT%H%M%S%6f"))
}

/// Whether the run finished cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// A cycle or the synthesis failed; the report covers what succeeded.
    Partial,
}

/// Everything a run produced. Built once, at loop termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub run_id: String,
    pub status: RunStatus,
    pub cycles: usize,
    /// Every invocation across all cycles, in execution order.
    pub findings: Vec<ToolInvocationRecord>,
    /// Ticket-creation invocations, successful or not.
    pub tickets_created: usize,
    pub tickets: TicketCounts,
    pub memory: Vec<CondensedCycle>,
    pub summary: String,
    pub score: ComplianceScore,
    pub token_usage: TokenUsage,
    pub halt_reason: HaltReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation_notice: Option<String>,
    pub original_token_estimate: usize,
    /// RFC 3339.
    pub generated_at: String,
    /// Every budget charge, in order.
    #[serde(skip)]
    pub ledger: Vec<Charge>,
}

/// Drives one or more orchestration runs against a fixed engine and
/// tool catalog.
///
/// ```ignore
/// let tools = standard_registry(ToolsConfig::from_env());
/// let engine = ChatReasoner::from_env(None)?;
/// let report = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
///     .with_event_handler(&LoggingHandler)
///     .orchestrate(&policy_text)
///     .await?;
/// ```
pub struct Orchestrator<'a> {
    engine: &'a dyn ReasoningEngine,
    tools: &'a ToolRegistry,
    config: OrchestratorConfig,
    events: &'a dyn EventHandler,
}

struct LoopOutcome {
    memory: Memory,
    halt: HaltReason,
    failure: Option<ReasoningError>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        engine: &'a dyn ReasoningEngine,
        tools: &'a ToolRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            engine,
            tools,
            config,
            events: &NoopHandler,
        }
    }

    /// Observe run events. The handler also answers approval requests.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.events = handler;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run on raw policy text, truncating it first if it is too large.
    pub async fn orchestrate(&self, policy_text: &str) -> Result<FinalReport> {
        let input = prepare(policy_text, self.config.safe_input_tokens);
        self.orchestrate_prepared(input).await
    }

    /// Run on input that already went through intake.
    pub async fn orchestrate_prepared(&self, input: PreparedInput) -> Result<FinalReport> {
        if input.text.trim().is_empty() {
            return Err(OrchestratorError::invalid_input("policy text is empty"));
        }

        let run_id = new_run_id();
        info!(
            "Run {run_id}: max_cycles={}, ceiling={}",
            self.config.max_cycles, self.config.token_ceiling
        );

        let mut budget = BudgetTracker::new(self.config.token_ceiling)
            .with_stop_fraction(self.config.stop_fraction);
        budget.add(ChargeKind::Input, &input.text);

        let outcome = self.run_cycles(&run_id, &input.text, &mut budget).await;
        self.events.on_event(&RunEvent::Halted {
            reason: outcome.halt,
            cycles: outcome.memory.len(),
        });

        if let Some(ref failure) = outcome.failure
            && outcome.memory.cycles().iter().all(|c| c.error.is_some())
        {
            warn!("Run {run_id}: first cycle failed, no partial report possible");
            return Err(failure.clone().into());
        }

        Ok(self.compile_report(run_id, input, outcome, &mut budget).await)
    }

    async fn run_cycles(&self, run_id: &str, policy_text: &str, budget: &mut BudgetTracker) -> LoopOutcome {
        let tracer = ExecutionTracer::new();
        let events = Chained {
            first: &tracer,
            second: self.events,
        };
        let mut memory = Memory::new(self.config.max_cycles);
        let max_cycles = self.config.max_cycles;

        for cycle in 1..=max_cycles {
            if budget.should_stop() {
                info!("Budget threshold reached ({}); not starting cycle {cycle}", budget.to_log_string());
                return LoopOutcome {
                    memory,
                    halt: HaltReason::BudgetThreshold,
                    failure: None,
                };
            }

            events.on_event(&RunEvent::CycleStart {
                cycle,
                max_cycles,
                budget: &*budget,
            });
            debug!("Run {run_id}: cycle {cycle}/{max_cycles}");

            let history = render_history(&condense(memory.recent(self.config.history_window)));
            let request = ExchangeRequest::new(
                CYCLE_CHAIN,
                cycle_system_prompt(policy_text, &history),
                CYCLE_INPUT,
            )
            .with_tools(&ToolName::REFLECT)
            .with_max_rounds(self.config.max_tool_rounds);
            budget.add(ChargeKind::Context, &format!("{}\n{}", request.system, request.input));

            tracer.clear();
            let exchange = self.engine.exchange(&request, self.tools, &events).await;
            let record = match exchange {
                Ok(exchange) => {
                    budget.add(ChargeKind::Response, &response_text(&exchange));
                    CycleRecord {
                        index: cycle,
                        output: exchange.output,
                        invocations: exchange.invocations,
                        trace: tracer.drain(),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("Cycle {cycle} failed: {e}");
                    let record = CycleRecord {
                        index: cycle,
                        output: String::new(),
                        invocations: Vec::new(),
                        trace: tracer.drain(),
                        error: Some(e.to_string()),
                    };
                    push(&mut memory, record);
                    return LoopOutcome {
                        memory,
                        halt: HaltReason::CycleFailed,
                        failure: Some(e),
                    };
                }
            };
            info!(
                "Cycle {cycle}/{max_cycles} complete: {} tool call(s), {}",
                record.invocations.len(),
                budget.to_log_string()
            );

            let results_view = serde_json::json!({
                "output": record.output,
                "tool_calls": record.invocations,
            })
            .to_string();
            let logs_view = render(&record.trace);
            push(&mut memory, record);

            if cycle == max_cycles {
                break;
            }
            if budget.should_stop() {
                info!("Budget threshold reached ({}); skipping reflection", budget.to_log_string());
                return LoopOutcome {
                    memory,
                    halt: HaltReason::BudgetThreshold,
                    failure: None,
                };
            }

            let prompt = reflection_prompt(&results_view, &logs_view, self.config.reflection_view_chars);
            budget.add(ChargeKind::ReflectionPrompt, &prompt);
            match self.engine.complete(&prompt).await {
                Ok(answer) => {
                    budget.add(ChargeKind::ReflectionAnswer, &answer);
                    let proceed = is_affirmative(&answer);
                    events.on_event(&RunEvent::Reflection { cycle, proceed });
                    if !proceed {
                        return LoopOutcome {
                            memory,
                            halt: HaltReason::ReflectionDeclined,
                            failure: None,
                        };
                    }
                }
                Err(e) => {
                    warn!("Reflection after cycle {cycle} failed ({e}); stopping");
                    events.on_event(&RunEvent::Reflection {
                        cycle,
                        proceed: false,
                    });
                    return LoopOutcome {
                        memory,
                        halt: HaltReason::ReflectionFailed,
                        failure: None,
                    };
                }
            }
        }

        LoopOutcome {
            memory,
            halt: HaltReason::CycleLimit,
            failure: None,
        }
    }

    async fn compile_report(
        &self,
        run_id: String,
        input: PreparedInput,
        outcome: LoopOutcome,
        budget: &mut BudgetTracker,
    ) -> FinalReport {
        let findings: Vec<ToolInvocationRecord> = outcome.memory.invocations().cloned().collect();
        let tickets = TicketCounts::from_invocations(&findings);
        let mut report = FinalReport {
            run_id,
            status: if outcome.failure.is_some() {
                RunStatus::Partial
            } else {
                RunStatus::Completed
            },
            cycles: outcome.memory.len(),
            tickets_created: tickets.attempted,
            tickets,
            findings,
            memory: condense(outcome.memory.cycles()),
            summary: String::new(),
            score: ComplianceScore::Unparseable,
            token_usage: budget.usage(),
            halt_reason: outcome.halt,
            error: outcome.failure.map(|e| e.to_string()),
            truncated: input.truncated,
            truncation_notice: input.notice,
            original_token_estimate: input.original_token_estimate,
            generated_at: chrono::Utc::now().to_rfc3339(),
            ledger: Vec::new(),
        };

        match self.synthesize(&report, budget).await {
            Some(summary) => {
                report.score = parse_score(&summary);
                report.summary = summary;
            }
            None => {
                report.summary = FALLBACK_SUMMARY.into();
                report.status = RunStatus::Partial;
            }
        }

        report.token_usage = budget.usage();
        report.ledger = budget.ledger().to_vec();
        info!(
            "Run {} {:?}: {} cycle(s), {} finding(s), tickets {}/{} confirmed, {}",
            report.run_id,
            report.status,
            report.cycles,
            report.findings.len(),
            report.tickets.confirmed,
            report.tickets.attempted,
            budget.to_log_string()
        );
        report
    }

    /// The markdown summary, or `None` if it could not be produced.
    async fn synthesize(&self, report: &FinalReport, budget: &mut BudgetTracker) -> Option<String> {
        if budget.is_exhausted() {
            warn!("Budget exhausted ({}); skipping synthesis", budget.to_log_string());
            return None;
        }
        let view = serde_json::to_string(report).unwrap_or_default();
        let prompt = synthesis_prompt(&view, self.config.report_view_chars);
        budget.add(ChargeKind::SynthesisPrompt, &prompt);
        match self.engine.complete(&prompt).await {
            Ok(summary) => {
                budget.add(ChargeKind::SynthesisAnswer, &summary);
                Some(summary)
            }
            Err(e) => {
                warn!("Synthesis failed: {e}");
                None
            }
        }
    }
}

/// Text charged for an exchange: its output plus the serialized calls.
fn response_text(exchange: &ToolExchange) -> String {
    let calls = serde_json::to_string(&exchange.invocations).unwrap_or_default();
    format!("{}\n{calls}", exchange.output)
}

fn push(memory: &mut Memory, record: CycleRecord) {
    if let Err(rejected) = memory.push(record) {
        warn!("Memory full; dropping cycle {}", rejected.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolDef;
    use crate::agent::events::{EventResponse, FnEventHandler};
    use crate::context::budget::estimate_tokens;
    use crate::error::ErrorKind;
    use crate::reasoning::{ScriptedExchange, ScriptedReasoner};
    use crate::tools::scanning::ScanForSecrets;
    use crate::tools::{Tool, ToolFuture, ToolOutcome};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const POLICY: &str = "All S3 buckets must block public access. Secrets must never be committed.";

    /// Ticketing that always fails, counting calls.
    struct BrokenTicketing(Arc<AtomicUsize>);

    impl Tool for BrokenTicketing {
        fn name(&self) -> ToolName {
            ToolName::CreateIssue
        }
        fn definition(&self) -> ToolDef {
            ToolDef::new("create_issue", "Create a ticket", json!({"type": "object"}))
        }
        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { ToolOutcome::failure("Failed to create issue: HTTP 400") })
        }
        fn is_mutation(&self) -> bool {
            true
        }
    }

    fn tools() -> ToolRegistry {
        ToolRegistry::new().with(ScanForSecrets)
    }

    fn cycle_prompts(engine: &ScriptedReasoner) -> Vec<String> {
        engine
            .prompts()
            .into_iter()
            .filter(|p| p.starts_with("You are a Compliance Orchestrator Agent."))
            .collect()
    }

    #[tokio::test]
    async fn never_exceeds_max_cycles() {
        let engine = ScriptedReasoner::new().with_default_completion("YES");
        let tools = tools();
        for k in 0..4 {
            let config = OrchestratorConfig::default().with_max_cycles(k);
            let report = Orchestrator::new(&engine, &tools, config)
                .orchestrate(POLICY)
                .await
                .unwrap();
            assert_eq!(report.cycles, k);
            assert!(report.memory.len() <= k);
            assert_eq!(report.halt_reason, HaltReason::CycleLimit);
        }
    }

    #[test]
    fn run_ids_are_unique() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        assert!(a.starts_with("run-"));
    }

    #[tokio::test]
    async fn last_cycle_goes_straight_to_synthesis() {
        let engine = ScriptedReasoner::new()
            .with_default_completion("YES")
            .with_exchange(ScriptedExchange::text("first"))
            .with_exchange(ScriptedExchange::text("second"));
        let tools = tools();
        let config = OrchestratorConfig::default().with_max_cycles(2);
        let report = Orchestrator::new(&engine, &tools, config)
            .orchestrate(POLICY)
            .await
            .unwrap();

        assert_eq!(report.cycles, 2);
        assert_eq!(report.halt_reason, HaltReason::CycleLimit);
        let reflections: Vec<String> = engine
            .prompts()
            .into_iter()
            .filter(|p| p.starts_with("Review these results and logs:"))
            .collect();
        assert_eq!(reflections.len(), 1);
        assert!(reflections[0].contains("first"));
        let reflection_charges = report
            .ledger
            .iter()
            .filter(|c| c.kind == ChargeKind::ReflectionPrompt)
            .count();
        assert_eq!(reflection_charges, 1);
    }

    #[tokio::test]
    async fn budget_equals_sum_of_charges() {
        let engine = ScriptedReasoner::new()
            .with_exchange(ScriptedExchange::text("x".repeat(400)))
            .with_completion("YES")
            .with_exchange(ScriptedExchange::text("y".repeat(800)))
            .with_completion("## Compliance Score\n**70/100**");
        let tools = tools();
        let report = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate(POLICY)
            .await
            .unwrap();

        let sum: usize = report.ledger.iter().map(|c| c.tokens).sum();
        assert_eq!(sum, report.token_usage.estimated_tokens);
        assert_eq!(report.token_usage.max_limit, 60_000);

        let kinds: Vec<ChargeKind> = report.ledger.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChargeKind::Input,
                ChargeKind::Context,
                ChargeKind::Response,
                ChargeKind::ReflectionPrompt,
                ChargeKind::ReflectionAnswer,
                ChargeKind::Context,
                ChargeKind::Response,
                ChargeKind::SynthesisPrompt,
                ChargeKind::SynthesisAnswer,
            ]
        );
        assert_eq!(report.ledger[0].tokens, estimate_tokens(POLICY));
        assert_eq!(report.score, ComplianceScore::Parsed(70));
        assert_eq!(report.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn precheck_halts_before_any_reasoning_call() {
        let engine = ScriptedReasoner::new();
        let tools = tools();
        // 100 input tokens against a 100-token ceiling.
        let config = OrchestratorConfig::default().with_token_ceiling(100);
        let report = Orchestrator::new(&engine, &tools, config)
            .orchestrate(&"p".repeat(400))
            .await
            .unwrap();
        assert_eq!(report.cycles, 0);
        assert_eq!(report.halt_reason, HaltReason::BudgetThreshold);
        assert!(engine.prompts().is_empty());
        assert_eq!(report.summary, FALLBACK_SUMMARY);
        assert_eq!(report.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn threshold_reached_mid_run_stops_next_cycle() {
        let engine = ScriptedReasoner::new()
            .with_exchange(ScriptedExchange::text("z".repeat(6000)))
            .with_default_completion("YES");
        let tools = tools();
        let config = OrchestratorConfig::default()
            .with_max_cycles(5)
            .with_token_ceiling(1500);
        let report = Orchestrator::new(&engine, &tools, config)
            .orchestrate(POLICY)
            .await
            .unwrap();
        assert_eq!(report.cycles, 1);
        assert_eq!(report.halt_reason, HaltReason::BudgetThreshold);
        assert_eq!(cycle_prompts(&engine).len(), 1);
    }

    #[tokio::test]
    async fn reflection_no_stops_after_one_cycle() {
        let engine = ScriptedReasoner::new()
            .with_exchange(ScriptedExchange::text("checked"))
            .with_completion("NO");
        let tools = tools();
        let config = OrchestratorConfig::default().with_max_cycles(2);
        let report = Orchestrator::new(&engine, &tools, config)
            .orchestrate(POLICY)
            .await
            .unwrap();
        assert_eq!(report.cycles, 1);
        assert_eq!(report.halt_reason, HaltReason::ReflectionDeclined);
        assert_eq!(cycle_prompts(&engine).len(), 1);
    }

    #[tokio::test]
    async fn reflection_failure_counts_as_no() {
        let engine = ScriptedReasoner::new()
            .with_exchange(ScriptedExchange::text("checked"))
            .with_completion_error(ReasoningError::Request("HTTP 503".into()))
            .with_completion("summary");
        let tools = tools();
        let config = OrchestratorConfig::default().with_max_cycles(3);
        let report = Orchestrator::new(&engine, &tools, config)
            .orchestrate(POLICY)
            .await
            .unwrap();
        assert_eq!(report.cycles, 1);
        assert_eq!(report.halt_reason, HaltReason::ReflectionFailed);
        assert_eq!(report.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn failed_ticket_is_listed_once_and_counted_as_attempted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = ToolRegistry::new().with(BrokenTicketing(calls.clone()));
        let engine = ScriptedReasoner::new().with_exchange(
            ScriptedExchange::text("Filed a ticket").with_call(
                "create_issue",
                json!({"summary": "S3 Compliance Issue", "description": "public bucket"}),
            ),
        );
        let report = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate(POLICY)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.findings.len(), 1);
        assert!(!report.findings[0].outcome.is_success());
        assert_eq!(report.tickets_created, 1);
        assert_eq!(report.tickets.attempted, 1);
        assert_eq!(report.tickets.confirmed, 0);
    }

    #[tokio::test]
    async fn denied_ticket_is_not_executed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = ToolRegistry::new()
            .with(BrokenTicketing(calls.clone()))
            .with_approval_required(ToolName::CreateIssue);
        let engine = ScriptedReasoner::new().with_exchange(
            ScriptedExchange::text("tried").with_call("create_issue", json!({"summary": "x"})),
        );
        let deny = FnEventHandler::new(|event| match event {
            RunEvent::ApprovalRequired { .. } => Some(EventResponse::Deny("read-only run".into())),
            _ => None,
        });
        let report = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .with_event_handler(&deny)
            .orchestrate(POLICY)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.tickets.attempted, 1);
        assert!(report.findings[0].outcome.text().contains("read-only run"));
    }

    #[tokio::test]
    async fn first_cycle_failure_is_an_error() {
        let tools = tools();
        let engine = ScriptedReasoner::new()
            .with_exchange_error(ReasoningError::ContextLength("maximum context length".into()));
        let err = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate(POLICY)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

        let engine =
            ScriptedReasoner::new().with_exchange_error(ReasoningError::Request("HTTP 500".into()));
        let err = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate(POLICY)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reasoning);
    }

    #[tokio::test]
    async fn later_failure_yields_partial_report() {
        let tools = tools();
        let engine = ScriptedReasoner::new()
            .with_exchange(ScriptedExchange::text("first pass"))
            .with_completion("YES")
            .with_exchange_error(ReasoningError::Request("HTTP 502".into()))
            .with_completion("summary");
        let report = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate(POLICY)
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Partial);
        assert_eq!(report.cycles, 2);
        assert_eq!(report.halt_reason, HaltReason::CycleFailed);
        assert_eq!(report.error.as_deref(), Some("HTTP 502"));
        assert_eq!(report.memory[1].error.as_deref(), Some("HTTP 502"));
        assert_eq!(report.summary, "summary");
    }

    #[tokio::test]
    async fn history_feeds_the_next_cycle() {
        let tools = tools();
        let engine = ScriptedReasoner::new()
            .with_exchange(
                ScriptedExchange::text("scanned")
                    .with_call("scan_for_secrets", json!({"code_content": "password = 'hunter2hunter2'"})),
            )
            .with_completion("YES")
            .with_exchange(ScriptedExchange::text("done"))
            .with_completion("summary");
        let report = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate(POLICY)
            .await
            .unwrap();

        let prompts = cycle_prompts(&engine);
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Previous steps: None"));
        assert!(prompts[1].contains("\"index\": 1"));
        assert!(prompts[1].contains("scan_for_secrets"));

        // Each cycle keeps only its own trace.
        assert!(report.memory[0].logs.iter().any(|l| l.starts_with("Tool called: scan_for_secrets")));
        assert!(!report.memory[1].logs.iter().any(|l| l.contains("scan_for_secrets")));
    }

    #[tokio::test]
    async fn oversized_input_is_flagged() {
        let tools = tools();
        let engine = ScriptedReasoner::new();
        let config = OrchestratorConfig::default().with_safe_input_tokens(12_000);
        let report = Orchestrator::new(&engine, &tools, config)
            .orchestrate(&"a".repeat(50_000))
            .await
            .unwrap();
        assert!(report.truncated);
        assert_eq!(report.original_token_estimate, 12_500);
        assert!(report.truncation_notice.is_some());
    }

    #[tokio::test]
    async fn empty_policy_is_rejected() {
        let tools = tools();
        let engine = ScriptedReasoner::new();
        let err = Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .orchestrate("   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn events_reach_the_caller_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FnEventHandler::new(move |event| {
            let tag = match event {
                RunEvent::CycleStart { .. } => "cycle",
                RunEvent::Reflection { .. } => "reflection",
                RunEvent::Halted { .. } => "halted",
                _ => return None,
            };
            sink.lock().unwrap().push(tag);
            None
        });
        let tools = tools();
        let engine = ScriptedReasoner::new().with_completion("NO");
        Orchestrator::new(&engine, &tools, OrchestratorConfig::default())
            .with_event_handler(&handler)
            .orchestrate(POLICY)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["cycle", "reflection", "halted"]);
    }
}
