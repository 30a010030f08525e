//! Policy parsing: which check categories a policy requires.
//!
//! The engine is asked for `{"checks": [...], "priority": "..."}`. Its answer
//! is untrusted; anything that does not yield at least one known category
//! degrades to [`PolicyPlan::fallback`].

use crate::agent::prompt::policy_parser_prompt;
use crate::reasoning::ReasoningEngine;
use crate::tools::CheckCategory;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Remediation priority named by a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Checks to run and how urgent remediation is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPlan {
    pub checks: Vec<CheckCategory>,
    pub priority: Priority,
    /// True when the engine's answer was unusable.
    #[serde(default)]
    pub fallback: bool,
}

impl PolicyPlan {
    pub const FALLBACK_CHECKS: [CheckCategory; 3] = [
        CheckCategory::Database,
        CheckCategory::Storage,
        CheckCategory::Security,
    ];

    pub fn fallback() -> Self {
        Self {
            checks: Self::FALLBACK_CHECKS.to_vec(),
            priority: Priority::Medium,
            fallback: true,
        }
    }
}

#[derive(Deserialize)]
struct RawPlan {
    checks: Vec<String>,
    #[serde(default)]
    priority: Option<String>,
}

fn fenced_json() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").ok())
        .as_ref()
}

/// The JSON candidate in a model answer: a fenced ```json block if present,
/// else the span from the first `{` to the last `}`, else the whole text.
pub fn extract_json(text: &str) -> &str {
    if let Some(m) = fenced_json()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        return m.as_str();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => text.get(start..=end).unwrap_or(text),
        _ => text,
    }
}

/// Parse a model answer into a plan, falling back on any problem.
pub fn parse_plan(answer: &str) -> PolicyPlan {
    let candidate = extract_json(answer);
    let raw: RawPlan = match serde_json::from_str(candidate) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Policy parser answer is not usable JSON ({e}); using default checks");
            return PolicyPlan::fallback();
        }
    };

    let mut checks = Vec::new();
    for name in &raw.checks {
        match name.parse::<CheckCategory>() {
            Ok(c) if !checks.contains(&c) => checks.push(c),
            Ok(_) => {}
            Err(e) => debug!("Dropping check: {e}"),
        }
    }
    if checks.is_empty() {
        warn!("Policy parser named no known check categories; using default checks");
        return PolicyPlan::fallback();
    }

    let priority = raw
        .priority
        .as_deref()
        .and_then(|p| p.parse().ok())
        .unwrap_or_default();
    PolicyPlan {
        checks,
        priority,
        fallback: false,
    }
}

/// Ask the engine which checks `policy_text` requires.
pub async fn parse_policy(engine: &dyn ReasoningEngine, policy_text: &str) -> PolicyPlan {
    let prompt = policy_parser_prompt(policy_text);
    match engine.complete(&prompt).await {
        Ok(answer) => parse_plan(&answer),
        Err(e) => {
            warn!("Policy parser call failed ({e}); using default checks");
            PolicyPlan::fallback()
        }
    }
}
