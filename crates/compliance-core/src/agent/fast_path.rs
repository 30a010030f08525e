//! The fast path: parse the policy, run the mapped inventory tools once,
//! ticket anything that looks wrong. No reasoning loop.

use crate::agent::events::{EventHandler, EventResponse, RunEvent};
use crate::agent::policy::{PolicyPlan, Priority, parse_policy};
use crate::agent::prompt::fast_summary_prompt;
use crate::context::intake::{PreparedInput, Truncation};
use crate::error::{OrchestratorError, Result};
use crate::reasoning::ReasoningEngine;
use crate::tools::{CheckCategory, ToolName, ToolOutcome, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

/// Outcome of one inventory check in a [`FastReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Compliant,
    /// The result looked non-compliant but the ticket could not be filed.
    TicketFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastFinding {
    /// Result key, e.g. `s3_buckets`.
    #[serde(rename = "type")]
    pub check: String,
    pub status: FindingStatus,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastReport {
    pub summary: String,
    pub priority: Priority,
    pub checks: Vec<CheckCategory>,
    pub findings: Vec<FastFinding>,
    /// Confirmation text of every ticket filed.
    pub tickets: Vec<String>,
    #[serde(flatten)]
    pub truncation: Truncation,
}

/// `list_s3_buckets` → `s3_buckets`.
fn result_key(tool: ToolName) -> &'static str {
    let name = tool.as_str();
    name.strip_prefix("list_").unwrap_or(name)
}

/// `s3_buckets` → `S3 Buckets`.
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn needs_ticket(data: &str) -> bool {
    let lower = data.to_lowercase();
    lower.contains("error") || lower.contains("non-compliant")
}

/// Registered inventory tools for the plan, deduplicated, in plan order.
fn planned_tools(plan: &PolicyPlan, registry: &ToolRegistry) -> Vec<ToolName> {
    let mut tools = Vec::new();
    for category in &plan.checks {
        if !category.is_inventory() {
            debug!("Fast path skips non-inventory check '{category}'");
            continue;
        }
        let available = registry.tools_for(*category);
        if available.len() < category.tools().len() {
            debug!("Check '{category}' runs {} of {} tool(s)", available.len(), category.tools().len());
        }
        for tool in available {
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }
    }
    tools
}

/// File one ticket, asking `events` first when ticketing needs approval.
async fn file_ticket(tools: &ToolRegistry, events: &dyn EventHandler, arguments: &str) -> ToolOutcome {
    let name = ToolName::CreateIssue;
    if tools.requires_approval(name)
        && let Some(EventResponse::Deny(reason)) =
            events.on_event(&RunEvent::ApprovalRequired { name, arguments })
    {
        debug!("Tool {name} denied: {reason}");
        return ToolOutcome::failure(format!("Tool '{name}' was denied: {reason}"));
    }
    events.on_event(&RunEvent::ToolStart { name, arguments });
    let outcome = tools.execute(name, arguments).await;
    events.on_event(&RunEvent::ToolEnd {
        name,
        outcome: &outcome,
    });
    outcome
}

/// Run the fast path over prepared policy input.
///
/// Fails only if the summary call fails; in that case no tickets are filed.
pub async fn fast_analyze(
    engine: &dyn ReasoningEngine,
    tools: &ToolRegistry,
    events: &dyn EventHandler,
    input: PreparedInput,
) -> Result<FastReport> {
    if input.text.trim().is_empty() {
        return Err(OrchestratorError::invalid_input("policy text is empty"));
    }

    let plan = parse_policy(engine, &input.text).await;
    info!(
        "Fast path: checks={:?}, priority={}, fallback={}",
        plan.checks, plan.priority, plan.fallback
    );

    let mut results: Vec<(&'static str, String)> = Vec::new();
    for tool in planned_tools(&plan, tools) {
        let outcome = tools.execute(tool, "{}").await;
        results.push((result_key(tool), outcome.to_model_text()));
    }

    let results_view: serde_json::Map<String, serde_json::Value> = results
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    let summary = engine
        .complete(&fast_summary_prompt(&serde_json::Value::Object(results_view).to_string()))
        .await?;

    let mut findings = Vec::new();
    let mut tickets = Vec::new();
    for (key, data) in results {
        if !needs_ticket(&data) {
            findings.push(FastFinding {
                check: key.into(),
                status: FindingStatus::Compliant,
                data,
                error: None,
            });
            continue;
        }

        let args = json!({
            "summary": format!("{} Compliance Issue", title_case(key)),
            "description": format!("**Priority**: {}\n\n**Findings**:\n{data}", plan.priority),
        });
        let outcome = file_ticket(tools, events, &args.to_string()).await;
        if outcome.is_success() {
            tickets.push(outcome.text().to_string());
        } else {
            warn!("Ticket for {key} failed: {}", outcome.text());
            findings.push(FastFinding {
                check: key.into(),
                status: FindingStatus::TicketFailed,
                data,
                error: Some(format!("Failed to create ticket: {}", outcome.text())),
            });
        }
    }

    info!("Fast path done: {} finding(s), {} ticket(s)", findings.len(), tickets.len());
    Ok(FastReport {
        summary,
        priority: plan.priority,
        checks: plan.checks,
        findings,
        tickets,
        truncation: input.truncation(),
    })
}
