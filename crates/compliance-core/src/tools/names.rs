//! Canonical tool identifiers and check categories.
//!
//! Tools are a closed set. The reasoning engine refers to them by their
//! snake_case wire name; dispatch always goes through [`ToolName`], never
//! through a raw string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every tool the orchestrator can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ListRdsInstances,
    ListEc2Instances,
    ListS3Buckets,
    ListEc2Volumes,
    ListSecurityGroups,
    ScanForSecrets,
    ScanForVulnerabilities,
    FetchRepository,
    CreateIssue,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::ListRdsInstances,
        ToolName::ListEc2Instances,
        ToolName::ListS3Buckets,
        ToolName::ListEc2Volumes,
        ToolName::ListSecurityGroups,
        ToolName::ScanForSecrets,
        ToolName::ScanForVulnerabilities,
        ToolName::FetchRepository,
        ToolName::CreateIssue,
    ];

    /// The read-only cloud inventory tools.
    pub const INVENTORY: [ToolName; 5] = [
        ToolName::ListRdsInstances,
        ToolName::ListEc2Instances,
        ToolName::ListS3Buckets,
        ToolName::ListEc2Volumes,
        ToolName::ListSecurityGroups,
    ];

    /// Tools the reflection loop exposes to the reasoning engine.
    pub const REFLECT: [ToolName; 8] = [
        ToolName::ListRdsInstances,
        ToolName::ListEc2Instances,
        ToolName::ListS3Buckets,
        ToolName::ListEc2Volumes,
        ToolName::ListSecurityGroups,
        ToolName::CreateIssue,
        ToolName::ScanForSecrets,
        ToolName::ScanForVulnerabilities,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ListRdsInstances => "list_rds_instances",
            ToolName::ListEc2Instances => "list_ec2_instances",
            ToolName::ListS3Buckets => "list_s3_buckets",
            ToolName::ListEc2Volumes => "list_ec2_volumes",
            ToolName::ListSecurityGroups => "list_security_groups",
            ToolName::ScanForSecrets => "scan_for_secrets",
            ToolName::ScanForVulnerabilities => "scan_for_vulnerabilities",
            ToolName::FetchRepository => "fetch_repository",
            ToolName::CreateIssue => "create_issue",
        }
    }

    /// Whether this tool files a remediation ticket.
    pub fn is_ticketing(self) -> bool {
        self == ToolName::CreateIssue
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when the reasoning engine names a tool outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for ToolName {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// Symbolic check categories a policy can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Database,
    Instance,
    Storage,
    Security,
    CodeQuality,
    Secrets,
    FetchGithubCode,
    Ticketing,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 8] = [
        CheckCategory::Database,
        CheckCategory::Instance,
        CheckCategory::Storage,
        CheckCategory::Security,
        CheckCategory::CodeQuality,
        CheckCategory::Secrets,
        CheckCategory::FetchGithubCode,
        CheckCategory::Ticketing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckCategory::Database => "database",
            CheckCategory::Instance => "instance",
            CheckCategory::Storage => "storage",
            CheckCategory::Security => "security",
            CheckCategory::CodeQuality => "code_quality",
            CheckCategory::Secrets => "secrets",
            CheckCategory::FetchGithubCode => "fetch_github_code",
            CheckCategory::Ticketing => "ticketing",
        }
    }

    /// The tools bound to this category.
    pub fn tools(self) -> &'static [ToolName] {
        match self {
            CheckCategory::Database => &[ToolName::ListRdsInstances],
            CheckCategory::Instance => &[ToolName::ListEc2Instances],
            CheckCategory::Storage => &[ToolName::ListS3Buckets, ToolName::ListEc2Volumes],
            CheckCategory::Security => &[ToolName::ListSecurityGroups],
            CheckCategory::CodeQuality => &[ToolName::ScanForVulnerabilities],
            CheckCategory::Secrets => &[ToolName::ScanForSecrets],
            CheckCategory::FetchGithubCode => &[ToolName::FetchRepository],
            CheckCategory::Ticketing => &[ToolName::CreateIssue],
        }
    }

    /// Whether the category's tools run without arguments, which is what
    /// the fast path can invoke directly.
    pub fn is_inventory(self) -> bool {
        self.tools().iter().all(|t| ToolName::INVENTORY.contains(t))
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        CheckCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown check category '{s}'"))
    }
}
