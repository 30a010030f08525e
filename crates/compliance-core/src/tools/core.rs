//! Tool abstraction and the tool registry.
//!
//! The [`Tool`] trait defines what every tool provides: its [`ToolName`],
//! an API definition (description and JSON schema) and an async `execute`
//! method returning a [`ToolOutcome`]. Tools are collected into a
//! [`ToolRegistry`] which handles dispatch, definition export, argument
//! validation, timeouts and result truncation.

use crate::ToolDef;
use crate::tools::names::{CheckCategory, ToolName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout for tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Appended to any text cut by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = "...";

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolOutcome> + Send + 'a>>;

// ── Outcome ────────────────────────────────────────────────────────

/// Result of one tool call.
///
/// Failures are values, not errors: a missing credential or a non-2xx
/// response is recorded and surfaces in the report, but never aborts a run.
/// Budget accounting treats both variants as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    Failure(String),
}

impl ToolOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success(text.into())
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self::Failure(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Success(t) | Self::Failure(t) => t,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Apply `f` to the payload, keeping the variant.
    pub fn map_text(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            Self::Success(t) => Self::Success(f(t)),
            Self::Failure(t) => Self::Failure(f(t)),
        }
    }

    /// The text the reasoning engine sees for this outcome.
    pub fn to_model_text(&self) -> String {
        match self {
            Self::Success(t) => t.clone(),
            Self::Failure(t) if t.starts_with("Error") => t.clone(),
            Self::Failure(t) => format!("Error: {t}"),
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A side-effecting operation the reasoning engine can invoke.
///
/// `execute` receives the raw JSON arguments string. Problems are reported
/// as [`ToolOutcome::Failure`] rather than by panicking; the engine sees the
/// failure text and can self-correct.
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    /// The definition sent to the reasoning engine.
    fn definition(&self) -> ToolDef;

    /// Uses a boxed future so that the trait is dyn-compatible.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    /// Whether this tool mutates external state (ticket creation).
    fn is_mutation(&self) -> bool {
        false
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// The fixed catalog of tools available to a run.
///
/// # Example
///
/// ```ignore
/// let tools = ToolRegistry::new()
///     .with_arg_validation(true)
///     .with_default_timeout(Some(DEFAULT_TOOL_TIMEOUT))
///     .with(ScanForSecrets)
///     .with_if(jira_configured, CreateIssue::from_env())
///     .with_approval_required(ToolName::CreateIssue);
///
/// let defs = tools.definitions_for(&ToolName::REFLECT);
/// ```
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Box<dyn Tool>>,
    max_result_bytes: usize,
    validate_args: bool,
    default_timeout: Option<Duration>,
    approval_required: BTreeSet<ToolName>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("approval_required", &self.approval_required)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            default_timeout: None,
            approval_required: BTreeSet::new(),
        }
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable JSON Schema argument validation before tool execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Pass `None` to disable timeouts.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Calls to `name` must be approved through an `ApprovalRequired` event.
    pub fn with_approval_required(mut self, name: ToolName) -> Self {
        self.approval_required.insert(name);
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// All definitions, in catalog order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Definitions for the registered subset of `names`, in catalog order.
    pub fn definitions_for(&self, names: &[ToolName]) -> Vec<ToolDef> {
        self.tools
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(_, t)| t.definition())
            .collect()
    }

    /// Registered tools bound to a check category.
    pub fn tools_for(&self, category: CheckCategory) -> Vec<ToolName> {
        category
            .tools()
            .iter()
            .copied()
            .filter(|t| self.tools.contains_key(t))
            .collect()
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.tools.contains_key(&name)
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn requires_approval(&self, name: ToolName) -> bool {
        self.approval_required.contains(&name)
    }

    pub fn is_mutation_tool(&self, name: ToolName) -> bool {
        self.tools.get(&name).is_some_and(|t| t.is_mutation())
    }

    /// Execute one call with optional validation, timeout and truncation.
    ///
    /// Unregistered tools, invalid arguments and timeouts all come back as
    /// [`ToolOutcome::Failure`].
    pub async fn execute(&self, name: ToolName, arguments: &str) -> ToolOutcome {
        let Some(tool) = self.tools.get(&name) else {
            return ToolOutcome::failure(format!("Error: tool '{name}' is not registered"));
        };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), arguments)
        {
            return ToolOutcome::Failure(error);
        }

        log_tool_call(name, arguments);
        let start = std::time::Instant::now();

        let outcome = if let Some(limit) = self.default_timeout {
            match tokio::time::timeout(limit, tool.execute(arguments)).await {
                Ok(o) => o,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    ToolOutcome::failure(format!(
                        "Error: tool '{name}' timed out after {:.0} seconds",
                        limit.as_secs_f64()
                    ))
                }
            }
        } else {
            tool.execute(arguments).await
        };

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes, success={})",
            start.elapsed().as_secs_f64() * 1000.0,
            outcome.text().len(),
            outcome.is_success(),
        );
        trace!(
            "Tool {name} result preview: {}",
            outcome.text().chars().take(300).collect::<String>()
        );

        let max = self.max_result_bytes;
        outcome.map_text(|t| truncate_result(t, max))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or an error formatted for the engine to
/// self-correct.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    let args_value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "Error: invalid JSON arguments for tool '{}': {e}",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;
    // An invalid schema skips validation.
    let Ok(validator) = jsonschema::validator_for(&schema) else {
        return None;
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: ToolName, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {name}({args_preview}{})",
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes (on a char boundary), appending
/// a notice if trimmed.
pub fn truncate_result(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let total = s.len();
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    format!("{s}...\n[truncated: {total} bytes total]")
}

/// Keep the first `max_chars` characters of `s`, appending
/// [`TRUNCATION_MARKER`] when anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}{TRUNCATION_MARKER}")
    } else {
        head
    }
}

/// Parse raw JSON arguments into a typed struct, or a failure outcome the
/// engine can read.
///
/// ```ignore
/// let args: RepoArgs = match parse_tool_args(arguments) {
///     Ok(a) => a,
///     Err(outcome) => return outcome,
/// };
/// ```
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, ToolOutcome> {
    // Zero-argument tools are often called with an empty string.
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(raw).map_err(|e| {
        ToolOutcome::failure(format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        ))
    })
}

// ── Tests ──────────────────────────────────────────────────────────
