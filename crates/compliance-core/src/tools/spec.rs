//! Structured tool descriptions with usage guidance.
//!
//! A [`ToolSpec`] turns purpose, when-to-use and when-not-to-use guidance
//! into the single description string the reasoning engine reads when it
//! selects tools. Keeping the guidance structured makes the near-identical
//! inventory tools distinguishable.

use crate::ToolDef;
use crate::tools::names::ToolName;

/// A structured tool specification.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: ToolName,
    /// One-sentence imperative purpose.
    pub purpose: String,
    pub when_to_use: Option<String>,
    /// Prevents confusion between similar tools.
    pub when_not_to_use: Option<String>,
    pub parameters: serde_json::Value,
    pub output_format: String,
}

impl ToolSpec {
    pub fn builder(name: ToolName, purpose: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            spec: ToolSpec {
                name,
                purpose: purpose.into(),
                when_to_use: None,
                when_not_to_use: None,
                parameters: serde_json::json!({"type": "object", "properties": {}}),
                output_format: "Plain text".into(),
            },
        }
    }

    /// Render the description string sent to the engine.
    pub fn to_description(&self) -> String {
        let mut desc = format!("{}.", self.purpose.trim_end_matches('.'));
        if let Some(ref when) = self.when_to_use {
            desc.push_str(&format!("\nWhen to use: {when}"));
        }
        if let Some(ref when_not) = self.when_not_to_use {
            desc.push_str(&format!("\nWhen NOT to use: {when_not}"));
        }
        desc.push_str(&format!("\nOutput format: {}", self.output_format));
        desc
    }

    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(self.name.as_str(), self.to_description(), self.parameters.clone())
    }
}

/// Builder for [`ToolSpec`].
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    pub fn when_to_use(mut self, when: impl Into<String>) -> Self {
        self.spec.when_to_use = Some(when.into());
        self
    }

    pub fn when_not_to_use(mut self, when_not: impl Into<String>) -> Self {
        self.spec.when_not_to_use = Some(when_not.into());
        self
    }

    /// Derive JSON Schema parameters from the argument type, so the schema
    /// and deserialization can never diverge.
    pub fn parameters_for<T: schemars::JsonSchema>(mut self) -> Self {
        self.spec.parameters = crate::json_schema_for::<T>();
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.spec.output_format = format.into();
        self
    }

    pub fn build(self) -> ToolSpec {
        self.spec
    }

    /// Shortcut for `.build().to_tool_def()`.
    pub fn to_tool_def(self) -> ToolDef {
        self.spec.to_tool_def()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct RepoArgs {
        /// owner/name
        repository_name: String,
    }

    #[test]
    fn description_includes_guidance() {
        let spec = ToolSpec::builder(ToolName::ListS3Buckets, "List S3 buckets")
            .when_to_use("Storage encryption and exposure checks")
            .when_not_to_use("Block volumes; use list_ec2_volumes instead")
            .output_format("JSON array")
            .build();
        let desc = spec.to_description();
        assert!(desc.starts_with("List S3 buckets."));
        assert!(desc.contains("When to use: Storage"));
        assert!(desc.contains("When NOT to use: Block volumes"));
        assert!(desc.contains("Output format: JSON array"));
    }

    #[test]
    fn tool_def_uses_wire_name_and_schema() {
        let def = ToolSpec::builder(ToolName::FetchRepository, "Fetch a repository")
            .parameters_for::<RepoArgs>()
            .to_tool_def();
        assert_eq!(def.function.name, "fetch_repository");
        assert_eq!(def.function.parameters["type"], "object");
        assert!(
            def.function.parameters["required"]
                .as_array()
                .unwrap()
                .contains(&"repository_name".into())
        );
    }

    #[test]
    fn default_parameters_are_an_empty_object() {
        let def = ToolSpec::builder(ToolName::ListRdsInstances, "List RDS instances").to_tool_def();
        assert_eq!(def.function.parameters["properties"], serde_json::json!({}));
        assert!(!def.function.description.contains("When to use"));
    }
}
