//! The bounded tool catalog the orchestrator may invoke.
//!
//! Every capability is a [`Tool`] implementor identified by a [`ToolName`].
//! Tools are collected into a [`ToolRegistry`] which handles dispatch,
//! validation, truncation and timeouts.
//!
//! # Submodules
//!
//! - [`core`] — [`Tool`] trait, [`ToolOutcome`], [`ToolRegistry`], helpers.
//! - [`names`] — [`ToolName`] and the [`CheckCategory`] mapping.
//! - [`spec`] — [`ToolSpec`](spec::ToolSpec) builder for structured tool
//!   descriptions with `when_to_use` / `when_not_to_use` guidance.
//! - [`inventory`] — the five AWS inventory tools.
//! - [`scanning`] — secret and vulnerability scanners.
//! - [`repository`] — GitHub repository fetch.
//! - [`ticketing`] — Jira issue creation.

pub mod core;
pub mod inventory;
pub mod names;
pub mod repository;
pub mod scanning;
pub mod spec;
pub mod ticketing;

pub use core::{
    DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_TIMEOUT, TRUNCATION_MARKER, Tool, ToolFuture,
    ToolOutcome, ToolRegistry, parse_tool_args, truncate_chars, truncate_result,
    validate_tool_arguments,
};
pub use names::{CheckCategory, ToolName, UnknownTool};

use inventory::{AwsCli, InventoryTool};
use repository::FetchRepository;
use scanning::{ScanForSecrets, ScanForVulnerabilities};
use std::time::Duration;
use ticketing::{CreateIssue, JiraConfig};

/// Settings for [`standard_registry`].
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub aws: AwsCli,
    pub github_token: Option<String>,
    pub jira: Option<JiraConfig>,
    pub timeout: Option<Duration>,
    /// Route `create_issue` through an approval event first.
    pub require_ticket_approval: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            aws: AwsCli::default(),
            github_token: None,
            jira: None,
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
            require_ticket_approval: false,
        }
    }
}

impl ToolsConfig {
    /// Credentials from `GITHUB_TOKEN` and the `JIRA_*` variables;
    /// `AWS_REGION` becomes the inventory default region.
    pub fn from_env() -> Self {
        let mut aws = AwsCli::default();
        if let Ok(region) = std::env::var("AWS_REGION")
            && !region.is_empty()
        {
            aws = aws.with_default_region(region);
        }
        Self {
            aws,
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            jira: JiraConfig::from_env(),
            ..Self::default()
        }
    }

    pub fn with_ticket_approval(mut self, required: bool) -> Self {
        self.require_ticket_approval = required;
        self
    }
}

/// The full catalog: inventory, scanners, repository fetch and ticketing.
///
/// Tools with missing credentials are still registered; calling them
/// yields a [`ToolOutcome::Failure`] naming the missing variable.
pub fn standard_registry(config: ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new()
        .with_arg_validation(true)
        .with_default_timeout(config.timeout);
    for tool in InventoryTool::all(&config.aws) {
        registry.register(tool);
    }
    let registry = registry
        .with(ScanForSecrets)
        .with(ScanForVulnerabilities)
        .with(FetchRepository::new(config.github_token))
        .with(CreateIssue::new(config.jira));
    if config.require_ticket_approval {
        registry.with_approval_required(ToolName::CreateIssue)
    } else {
        registry
    }
}
