//! GitHub repository fetch.
//!
//! `fetch_repository` lists the top-level contents of a repository through
//! the GitHub REST API and downloads each regular file. With `scan: true`
//! the downloaded files are run through both code scanners and only the
//! aggregated findings are returned.

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, ToolOutcome, parse_tool_args};
use crate::tools::names::ToolName;
use crate::tools::scanning::scan_repository;
use crate::tools::spec::ToolSpec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// A downloaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchRepositoryArgs {
    /// Repository in `owner/name` form.
    pub repository_name: String,
    /// Return scanner findings instead of raw file contents.
    #[serde(default)]
    pub scan: bool,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

/// Fetches repository contents with a personal access token.
pub struct FetchRepository {
    http: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl FetchRepository {
    pub fn new(token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            api_base: GITHUB_API_BASE.into(),
        }
    }

    /// Reads `GITHUB_TOKEN`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    }

    /// Point at a different API host (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "compliance-orchestrator")
    }

    /// Download every top-level file of `repository`.
    pub async fn fetch(&self, repository: &str) -> Result<Vec<RepoFile>, String> {
        let Some(token) = self.token.as_deref() else {
            return Err("GITHUB_TOKEN environment variable not set".into());
        };
        if !is_valid_repository_name(repository) {
            return Err(format!(
                "invalid repository name '{repository}', expected owner/name"
            ));
        }

        let url = format!("{}/repos/{repository}/contents", self.api_base);
        let response = self
            .get(&url, token)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "Failed to fetch repository. Status code: {}",
                status.as_u16()
            ));
        }

        let listing: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("unparseable listing: {e}"))?;
        let entries: Vec<ContentEntry> = serde_json::from_value(listing)
            .map_err(|_| "Invalid repository or empty repository".to_string())?;

        let mut files = Vec::new();
        for entry in entries {
            if entry.kind != "file" {
                continue;
            }
            let Some(download_url) = entry.download_url else {
                continue;
            };
            // Individual download failures skip the file.
            match self.get(&download_url, token).send().await {
                Ok(resp) if resp.status().is_success() => {
                    if let Ok(content) = resp.text().await {
                        files.push(RepoFile {
                            path: entry.path,
                            content,
                        });
                    }
                }
                Ok(resp) => debug!("Skipping {}: HTTP {}", entry.path, resp.status()),
                Err(e) => debug!("Skipping {}: {e}", entry.path),
            }
        }
        Ok(files)
    }
}

fn is_valid_repository_name(name: &str) -> bool {
    let mut parts = name.split('/');
    let valid_part = |p: Option<&str>| {
        p.is_some_and(|p| {
            !p.is_empty()
                && p != "."
                && p != ".."
                && p.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
    };
    valid_part(parts.next()) && valid_part(parts.next()) && parts.next().is_none()
}

impl Tool for FetchRepository {
    fn name(&self) -> ToolName {
        ToolName::FetchRepository
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(self.name(), "Fetch the top-level files of a GitHub repository")
            .when_to_use("The policy requires reviewing source code or infrastructure-as-code")
            .when_not_to_use("Scanning text you already have; call the scanners directly")
            .parameters_for::<FetchRepositoryArgs>()
            .output_format(
                "JSON array [{path, content}], or {secrets, vulnerabilities, files_scanned} when scan is true",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: FetchRepositoryArgs = match parse_tool_args(&arguments) {
                Ok(a) => a,
                Err(outcome) => return outcome,
            };
            let files = match self.fetch(&args.repository_name).await {
                Ok(files) => files,
                Err(e) => return ToolOutcome::failure(format!("Error: {e}")),
            };
            let rendered = if args.scan {
                serde_json::to_string_pretty(&scan_repository(&files))
            } else {
                serde_json::to_string_pretty(&files)
            };
            match rendered {
                Ok(text) => ToolOutcome::Success(text),
                Err(e) => ToolOutcome::failure(format!("Error formatting repository: {e}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_names_are_validated() {
        assert!(is_valid_repository_name("acme/infra"));
        assert!(is_valid_repository_name("acme-corp/infra_v2.tf"));
        assert!(!is_valid_repository_name("acme"));
        assert!(!is_valid_repository_name("acme/infra/extra"));
        assert!(!is_valid_repository_name("../etc"));
        assert!(!is_valid_repository_name("acme/"));
        assert!(!is_valid_repository_name("acme/in fra"));
    }

    #[tokio::test]
    async fn missing_token_is_a_failure_value() {
        let tool = FetchRepository::new(None);
        let outcome = tool.execute(r#"{"repository_name": "acme/infra"}"#).await;
        assert_eq!(
            outcome,
            ToolOutcome::failure("Error: GITHUB_TOKEN environment variable not set")
        );
    }

    #[tokio::test]
    async fn invalid_name_fails_before_any_request() {
        let tool = FetchRepository::new(Some("t".into())).with_api_base("http://127.0.0.1:9");
        let outcome = tool.execute(r#"{"repository_name": "nope"}"#).await;
        assert!(outcome.text().contains("expected owner/name"));
    }

    #[test]
    fn listing_entries_deserialize() {
        let entries: Vec<ContentEntry> = serde_json::from_value(serde_json::json!([
            {"path": "main.tf", "type": "file", "download_url": "https://raw/main.tf"},
            {"path": "modules", "type": "dir", "download_url": null}
        ]))
        .unwrap();
        assert_eq!(entries[0].kind, "file");
        assert!(entries[1].download_url.is_none());
    }
}
