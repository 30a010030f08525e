//! Prompt text for every reasoning call, plus a small section builder.
//!
//! Wording here is tuned for the default model; callers treat every answer
//! as untrusted text and parse it best-effort.

/// Builder for multi-section prompts.
///
/// Sections are joined with blank lines. Empty sections are skipped.
///
/// ```
/// use compliance_core::agent::prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new("You are a compliance expert.")
///     .section("Summary", "Brief summary of your findings")
///     .section_opt("Missing", None::<String>)
///     .build();
///
/// assert!(prompt.contains("## Summary"));
/// assert!(!prompt.contains("Missing"));
/// ```
pub struct PromptBuilder {
    sections: Vec<String>,
}

impl PromptBuilder {
    /// Start with a preamble, included without a heading.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a `## heading` section. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n{content}"));
        }
        self
    }

    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append raw text without a heading. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// First `max` characters of `text`, cut silently.
pub fn head(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ── Reflect loop ───────────────────────────────────────────────────

/// Human turn of every cycle exchange.
pub const CYCLE_INPUT: &str = "Perform compliance check";

/// Chain name recorded in cycle traces.
pub const CYCLE_CHAIN: &str = "compliance_cycle";

pub fn cycle_system_prompt(policy_text: &str, history: &str) -> String {
    PromptBuilder::new("You are a Compliance Orchestrator Agent. Follow these steps:")
        .raw(
            "1. **Plan**: Analyze requirements and create an execution plan\n\
             2. **Act**: Execute relevant tools in optimal order\n\
             3. **Reflect**: Review results and plan next actions",
        )
        .raw(format!("Current policy: {policy_text}\nPrevious steps: {history}"))
        .build()
}

/// The yes/no question asked after each cycle. `results` and `logs` are
/// each cut to `view_chars` characters.
pub fn reflection_prompt(results: &str, logs: &str, view_chars: usize) -> String {
    format!(
        "Review these results and logs:\n{}\n{}\n\nShould we take additional actions? \
         Respond ONLY with YES or NO.",
        head(results, view_chars),
        head(logs, view_chars)
    )
}

/// Whether a reflection answer asks for another cycle.
pub fn is_affirmative(answer: &str) -> bool {
    answer.to_uppercase().contains("YES")
}

pub fn synthesis_prompt(report: &str, view_chars: usize) -> String {
    format!(
        "Synthesize this compliance report:\n{}\n\nFormat in markdown with: Compliance Score, \
         Top Risks, and Recommendations",
        head(report, view_chars)
    )
}

/// Summary used when the synthesis call fails or cannot be afforded.
pub const FALLBACK_SUMMARY: &str =
    "Summary unavailable: the final synthesis step did not complete. See findings for raw results.";

// ── Fast path ──────────────────────────────────────────────────────

pub fn policy_parser_prompt(policy_text: &str) -> String {
    format!(
        "Analyze this security policy and identify required compliance checks:\n{policy_text}\n\n\
         Return JSON with: {{\n    \"checks\": [\"database\", \"storage\", \"security\", \
         \"code_quality\", \"secrets\"],\n    \"priority\": \"critical/high/medium/low\"\n}}"
    )
}

pub fn fast_summary_prompt(results: &str) -> String {
    format!("Create compliance summary from: {results}")
}

// ── Single-pass analysis ───────────────────────────────────────────

pub const DOCUMENT_ANALYSIS_INPUT: &str = "Perform full compliance analysis and create tickets";
pub const DOCUMENT_ANALYSIS_CHAIN: &str = "document_analysis";

const TICKET_GUIDELINES: &str = "\
1. Create one ticket per non-compliant issue
2. Use clear, descriptive titles
3. Include detailed descriptions with:
- The specific requirement not met
- The current state
- Recommendations for achieving compliance
4. Set appropriate priority based on the severity of non-compliance";

const DOCUMENT_FORMAT: &str = "\
## Compliance Score
**XX/100**

## Summary
Brief summary of your findings

## Non-Compliant Items

For each non-compliant item, create a ticket and format as:

Ticket 1: **Title of the issue**
- **Description**: Description of the issue
- **Priority**: High/Medium/Low

## Recommendations
Add your recommendations for improving compliance";

/// System prompt comparing an organization policy (PSSI) against a norm.
pub fn document_analysis_prompt(norm_text: &str, pssi_text: &str) -> String {
    PromptBuilder::new(
        "You are a compliance expert analyzing PSSI documents against security norms.\n\n\
         Your task is to analyze the provided PSSI document against the specified norm and \
         provide a detailed compliance analysis. For any non-compliant issues found, create \
         Jira tickets using the available ticketing tool.",
    )
    .section("Ticket guidelines", TICKET_GUIDELINES)
    .section(
        "Response format",
        format!(
            "{DOCUMENT_FORMAT}\n\nAlways follow this exact format to ensure proper parsing of \
             your results. When tickets are warranted, do not ask for permission; create them."
        ),
    )
    .section("Current Norm", norm_text)
    .section("PSSI Document", pssi_text)
    .build()
}

pub const INFRASTRUCTURE_ANALYSIS_INPUT: &str = "Perform full infrastructure compliance check";
pub const INFRASTRUCTURE_ANALYSIS_CHAIN: &str = "infrastructure_analysis";

const INFRASTRUCTURE_FORMAT: &str = "\
## Infrastructure Compliance Score
**XX/100**

## Summary
Brief analysis of the infrastructure compliance

## Key Compliance Issues:

1. **Issue Title 1**: Description of the issue and its impact

## Recommendations:

1. **Recommendation Title 1**: Specific actions to take";

/// System prompt checking live infrastructure against an organization policy.
pub fn infrastructure_analysis_prompt(pssi_text: &str) -> String {
    PromptBuilder::new(
        "You are a compliance expert analyzing AWS infrastructure against PSSI requirements.",
    )
    .section(
        "Response format",
        format!(
            "{INFRASTRUCTURE_FORMAT}\n\nAlways follow this exact format to ensure proper parsing \
             of your results."
        ),
    )
    .section("Current PSSI rules", pssi_text)
    .build()
}
