//! Pattern-based code scanning.
//!
//! Two tools, `scan_for_secrets` and `scan_for_vulnerabilities`, plus
//! [`scan_repository`] which applies both to every file fetched from a
//! repository. Matching is regex-only and case-insensitive; findings carry
//! a 1-based line number and the matched text.

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, ToolOutcome, parse_tool_args};
use crate::tools::names::ToolName;
use crate::tools::repository::RepoFile;
use crate::tools::spec::ToolSpec;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

const SECRET_PATTERNS: &[(&str, &str)] = &[
    ("api_key", r#"api[_-]?key["']?\s*[:=]\s*["']?[a-zA-Z0-9]{32,}["']?"#),
    ("password", r#"password["']?\s*[:=]\s*["']?[^\s"']{8,}["']?"#),
    ("token", r#"token["']?\s*[:=]\s*["']?[a-zA-Z0-9]{32,}["']?"#),
    ("secret", r#"secret["']?\s*[:=]\s*["']?[a-zA-Z0-9]{32,}["']?"#),
    (
        "aws_key",
        r#"aws[_-]?(access[_-]?key|secret[_-]?key)["']?\s*[:=]\s*["']?[a-zA-Z0-9]{20,}["']?"#,
    ),
];

const VULNERABILITY_PATTERNS: &[(&str, &str)] = &[
    ("SQL Injection", r"execute\s*\(.*?\+.*?\)"),
    ("SQL Injection", r"exec\s*\(.*?\+.*?\)"),
    ("SQL Injection", r"query\s*\(.*?\+.*?\)"),
    ("Command Injection", r"os\.system\s*\(.*?\+.*?\)"),
    ("Command Injection", r"subprocess\.run\s*\(.*?\+.*?\)"),
    ("Command Injection", r"subprocess\.Popen\s*\(.*?\+.*?\)"),
];

type CompiledPatterns = Vec<(&'static str, Regex)>;

fn compile(patterns: &'static [(&'static str, &'static str)]) -> CompiledPatterns {
    patterns
        .iter()
        .filter_map(|&(kind, pattern)| match Regex::new(&format!("(?i){pattern}")) {
            Ok(re) => Some((kind, re)),
            Err(e) => {
                warn!("Skipping invalid {kind} pattern: {e}");
                None
            }
        })
        .collect()
}

fn secret_patterns() -> &'static CompiledPatterns {
    static PATTERNS: OnceLock<CompiledPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| compile(SECRET_PATTERNS))
}

fn vulnerability_patterns() -> &'static CompiledPatterns {
    static PATTERNS: OnceLock<CompiledPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| compile(VULNERABILITY_PATTERNS))
}

/// One pattern hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    /// 1-based.
    pub line: usize,
    #[serde(rename = "match")]
    pub matched: String,
}

fn scan(code: &str, patterns: &CompiledPatterns) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (kind, re) in patterns {
        for m in re.find_iter(code) {
            findings.push(Finding {
                kind: (*kind).to_string(),
                line: line_of(code, m.start()),
                matched: m.as_str().to_string(),
            });
        }
    }
    findings
}

fn line_of(code: &str, byte_offset: usize) -> usize {
    code.as_bytes()
        .iter()
        .take(byte_offset)
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Hard-coded credentials in `code`, grouped by pattern.
pub fn scan_secrets(code: &str) -> Vec<Finding> {
    scan(code, secret_patterns())
}

/// Injection-prone string concatenation in `code`, grouped by pattern.
pub fn scan_vulnerabilities(code: &str) -> Vec<Finding> {
    scan(code, vulnerability_patterns())
}

// ── Repository scan ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFindings {
    pub file: String,
    pub findings: Vec<Finding>,
}

/// Both scans applied across a fetched repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryScan {
    pub secrets: Vec<FileFindings>,
    pub vulnerabilities: Vec<FileFindings>,
    pub files_scanned: usize,
}

impl RepositoryScan {
    pub fn is_clean(&self) -> bool {
        self.secrets.is_empty() && self.vulnerabilities.is_empty()
    }
}

/// Scan every file. Files without findings only count toward
/// `files_scanned`.
pub fn scan_repository(files: &[RepoFile]) -> RepositoryScan {
    let mut result = RepositoryScan::default();
    for file in files {
        result.files_scanned += 1;

        let secrets = scan_secrets(&file.content);
        if !secrets.is_empty() {
            result.secrets.push(FileFindings {
                file: file.path.clone(),
                findings: secrets,
            });
        }

        let vulns = scan_vulnerabilities(&file.content);
        if !vulns.is_empty() {
            result.vulnerabilities.push(FileFindings {
                file: file.path.clone(),
                findings: vulns,
            });
        }
    }
    result
}

// ── Tools ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CodeArgs {
    /// The source text to scan.
    pub code_content: String,
}

fn run_scan(arguments: &str, key: &str, scanner: fn(&str) -> Vec<Finding>) -> ToolOutcome {
    let args: CodeArgs = match parse_tool_args(arguments) {
        Ok(a) => a,
        Err(outcome) => return outcome,
    };
    let findings = scanner(&args.code_content);
    let body = serde_json::json!({ key: findings });
    match serde_json::to_string_pretty(&body) {
        Ok(text) => ToolOutcome::Success(text),
        Err(e) => ToolOutcome::failure(format!("Error formatting findings: {e}")),
    }
}

pub struct ScanForSecrets;

impl Tool for ScanForSecrets {
    fn name(&self) -> ToolName {
        ToolName::ScanForSecrets
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(self.name(), "Scan code for hard-coded credentials")
            .when_to_use("Checking source or configuration text for API keys, passwords, tokens and AWS keys")
            .when_not_to_use("Injection flaws; use scan_for_vulnerabilities")
            .parameters_for::<CodeArgs>()
            .output_format("JSON object {\"secrets\": [{type, line, match}]}")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let outcome = run_scan(arguments, "secrets", scan_secrets);
        Box::pin(async move { outcome })
    }
}

pub struct ScanForVulnerabilities;

impl Tool for ScanForVulnerabilities {
    fn name(&self) -> ToolName {
        ToolName::ScanForVulnerabilities
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(self.name(), "Scan code for SQL and command injection")
            .when_to_use("Checking source text for queries or shell commands built by string concatenation")
            .when_not_to_use("Credential leaks; use scan_for_secrets")
            .parameters_for::<CodeArgs>()
            .output_format("JSON object {\"vulnerabilities\": [{type, line, match}]}")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let outcome = run_scan(arguments, "vulnerabilities", scan_vulnerabilities);
        Box::pin(async move { outcome })
    }
}
