//! Jira ticket creation.
//!
//! `create_issue` is the only mutating tool. It posts to
//! `{JIRA_URL}/rest/api/3/issue` with basic auth and an Atlassian
//! document-format description. Only HTTP 201 counts as created; every
//! other status, and any transport error, is a failure value so the run
//! can keep going.

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, ToolOutcome, parse_tool_args};
use crate::tools::names::ToolName;
use crate::tools::spec::ToolSpec;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

pub const DEFAULT_ISSUE_TYPE_ID: &str = "10001";
pub const DEFAULT_PROJECT_ID: &str = "10000";

/// Connection details for a Jira Cloud site.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub project_id: String,
    pub issue_type_id: String,
}

impl JiraConfig {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            api_token: api_token.into(),
            project_id: DEFAULT_PROJECT_ID.into(),
            issue_type_id: DEFAULT_ISSUE_TYPE_ID.into(),
        }
    }

    pub fn with_project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = id.into();
        self
    }

    pub fn with_issue_type_id(mut self, id: impl Into<String>) -> Self {
        self.issue_type_id = id.into();
        self
    }

    /// `None` unless `JIRA_URL`, `JIRA_EMAIL` and `JIRA_API_TOKEN` are all
    /// set. `JIRA_PROJECT_ID` and `JIRA_ISSUE_TYPE_ID` are optional.
    pub fn from_env() -> Option<Self> {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());
        let mut config = Self::new(var("JIRA_URL")?, var("JIRA_EMAIL")?, var("JIRA_API_TOKEN")?);
        if let Some(id) = var("JIRA_PROJECT_ID") {
            config.project_id = id;
        }
        if let Some(id) = var("JIRA_ISSUE_TYPE_ID") {
            config.issue_type_id = id;
        }
        Some(config)
    }

    fn issue_url(&self) -> String {
        format!("{}/rest/api/3/issue", self.base_url)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateIssueArgs {
    /// One-line ticket title.
    pub summary: String,
    /// Findings and remediation steps.
    pub description: String,
}

/// Request body for a new issue.
pub fn issue_payload(config: &JiraConfig, summary: &str, description: &str) -> Value {
    json!({
        "fields": {
            "project": { "id": config.project_id },
            "summary": summary,
            "description": {
                "version": 1,
                "type": "doc",
                "content": [{
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": description }]
                }]
            },
            "issuetype": { "id": config.issue_type_id }
        }
    })
}

pub struct CreateIssue {
    http: reqwest::Client,
    config: Option<JiraConfig>,
}

impl CreateIssue {
    pub fn new(config: Option<JiraConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(JiraConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// File one ticket.
    pub async fn create(&self, summary: &str, description: &str) -> ToolOutcome {
        let Some(config) = &self.config else {
            return ToolOutcome::failure(
                "Error creating Jira issue: JIRA_URL, JIRA_EMAIL and JIRA_API_TOKEN must be set",
            );
        };

        let response = self
            .http
            .post(config.issue_url())
            .basic_auth(&config.email, Some(&config.api_token))
            .json(&issue_payload(config, summary, description))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return ToolOutcome::failure(format!("Error creating Jira issue: {e}")),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CREATED {
            let key = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("key").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "Unknown".into());
            ToolOutcome::success(format!("Issue created successfully: {key}"))
        } else {
            ToolOutcome::failure(format!("Failed to create issue: {body}"))
        }
    }
}

impl Tool for CreateIssue {
    fn name(&self) -> ToolName {
        ToolName::CreateIssue
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(self.name(), "Create a remediation ticket in Jira")
            .when_to_use("A control is non-compliant and needs an owner")
            .when_not_to_use("Compliant findings or information-only observations")
            .parameters_for::<CreateIssueArgs>()
            .output_format("'Issue created successfully: KEY' or an error message")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: CreateIssueArgs = match parse_tool_args(&arguments) {
                Ok(a) => a,
                Err(outcome) => return outcome,
            };
            self.create(&args.summary, &args.description).await
        })
    }

    fn is_mutation(&self) -> bool {
        true
    }
}
