//! Cloud inventory tools.
//!
//! Five read-only tools that list AWS resources through the `aws` command
//! line client and project each resource onto the handful of fields a
//! compliance review needs:
//!
//! | Tool | Command |
//! |------|---------|
//! | `list_rds_instances` | `aws rds describe-db-instances` |
//! | `list_ec2_instances` | `aws ec2 describe-instances` |
//! | `list_s3_buckets` | `aws s3api list-buckets` |
//! | `list_ec2_volumes` | `aws ec2 describe-volumes` |
//! | `list_security_groups` | `aws ec2 describe-security-groups` |
//!
//! Credentials and the default region come from the usual AWS environment
//! (`AWS_PROFILE`, `AWS_REGION`, ...); the tools never read them directly.

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, ToolOutcome, parse_tool_args};
use crate::tools::names::ToolName;
use crate::tools::spec::ToolSpec;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::process::Command;

/// Arguments shared by every inventory tool.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct InventoryArgs {
    /// AWS region to query. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
}

/// How to reach the `aws` client.
#[derive(Debug, Clone)]
pub struct AwsCli {
    pub binary: String,
    pub default_region: Option<String>,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self {
            binary: "aws".into(),
            default_region: None,
        }
    }
}

impl AwsCli {
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    /// Run `aws <args> --output json` and parse stdout.
    async fn query(&self, args: &[&str], region: Option<&str>) -> Result<Value, String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).args(["--output", "json"]);
        if let Some(region) = region.or(self.default_region.as_deref()) {
            cmd.args(["--region", region]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.binary))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("[exit: {code}] {}", stderr.trim()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| format!("unparseable aws output: {e}"))
    }
}

/// One of the five inventory tools, selected by name.
pub struct InventoryTool {
    kind: ToolName,
    cli: AwsCli,
}

impl InventoryTool {
    /// Returns `None` for names that are not inventory tools.
    pub fn new(kind: ToolName, cli: AwsCli) -> Option<Self> {
        ToolName::INVENTORY
            .contains(&kind)
            .then_some(Self { kind, cli })
    }

    /// All five inventory tools sharing one client configuration.
    pub fn all(cli: &AwsCli) -> Vec<Self> {
        ToolName::INVENTORY
            .into_iter()
            .map(|kind| Self {
                kind,
                cli: cli.clone(),
            })
            .collect()
    }

    fn command(&self) -> &'static [&'static str] {
        match self.kind {
            ToolName::ListRdsInstances => &["rds", "describe-db-instances"],
            ToolName::ListEc2Instances => &["ec2", "describe-instances"],
            ToolName::ListS3Buckets => &["s3api", "list-buckets"],
            ToolName::ListEc2Volumes => &["ec2", "describe-volumes"],
            _ => &["ec2", "describe-security-groups"],
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            ToolName::ListRdsInstances => "RDS instances",
            ToolName::ListEc2Instances => "EC2 instances",
            ToolName::ListS3Buckets => "S3 buckets",
            ToolName::ListEc2Volumes => "EC2 volumes",
            _ => "security groups",
        }
    }
}

impl Tool for InventoryTool {
    fn name(&self) -> ToolName {
        self.kind
    }

    fn definition(&self) -> ToolDef {
        let builder = ToolSpec::builder(self.kind, format!("List all {} in the account", self.label()))
            .parameters_for::<InventoryArgs>()
            .output_format("JSON array of resource summaries, or a 'No ... found.' message");
        let builder = match self.kind {
            ToolName::ListRdsInstances => builder
                .when_to_use("Database controls: engine versions, encryption, public exposure")
                .when_not_to_use("Compute hosts; use list_ec2_instances"),
            ToolName::ListEc2Instances => builder
                .when_to_use("Compute controls: instance state, public IPs, attached security groups")
                .when_not_to_use("Disk encryption; use list_ec2_volumes"),
            ToolName::ListS3Buckets => builder
                .when_to_use("Object storage controls")
                .when_not_to_use("Block storage; use list_ec2_volumes"),
            ToolName::ListEc2Volumes => builder
                .when_to_use("Block storage controls: encryption at rest, volume state")
                .when_not_to_use("Object storage; use list_s3_buckets"),
            _ => builder
                .when_to_use("Network controls: ingress rules open to the internet")
                .when_not_to_use("Listing hosts; use list_ec2_instances"),
        };
        builder.to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: InventoryArgs = match parse_tool_args(&arguments) {
                Ok(a) => a,
                Err(outcome) => return outcome,
            };
            match self.cli.query(self.command(), args.region.as_deref()).await {
                Ok(raw) => summarize(self.kind, &raw),
                Err(e) => ToolOutcome::failure(format!("Error listing {}: {e}", self.label())),
            }
        })
    }
}

// ── Projections ───────────────────────────────────────────────────

/// Project raw `aws` JSON output for `kind` into the tool result.
pub fn summarize(kind: ToolName, raw: &Value) -> ToolOutcome {
    let (label, items) = match kind {
        ToolName::ListRdsInstances => ("RDS instances", project_rds(raw)),
        ToolName::ListEc2Instances => ("EC2 instances", project_ec2(raw)),
        ToolName::ListS3Buckets => ("S3 buckets", project_buckets(raw)),
        ToolName::ListEc2Volumes => ("EC2 volumes", project_volumes(raw)),
        ToolName::ListSecurityGroups => ("security groups", project_security_groups(raw)),
        other => {
            return ToolOutcome::failure(format!("Error: {other} is not an inventory tool"));
        }
    };

    if items.is_empty() {
        return ToolOutcome::success(format!("No {label} found."));
    }
    match serde_json::to_string_pretty(&items) {
        Ok(text) => ToolOutcome::Success(text),
        Err(e) => ToolOutcome::failure(format!("Error formatting {label}: {e}")),
    }
}

fn field(value: &Value, pointer: &str) -> Value {
    value.pointer(pointer).cloned().unwrap_or_else(|| json!("N/A"))
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn project_rds(raw: &Value) -> Vec<Value> {
    array(raw, "DBInstances")
        .map(|db| {
            json!({
                "DBInstanceIdentifier": field(db, "/DBInstanceIdentifier"),
                "Engine": field(db, "/Engine"),
                "DBInstanceStatus": field(db, "/DBInstanceStatus"),
                "Endpoint": field(db, "/Endpoint/Address"),
                "Port": field(db, "/Endpoint/Port"),
                "AllocatedStorage": field(db, "/AllocatedStorage"),
                "DBInstanceClass": field(db, "/DBInstanceClass"),
                "StorageEncrypted": field(db, "/StorageEncrypted"),
                "PubliclyAccessible": field(db, "/PubliclyAccessible"),
            })
        })
        .collect()
}

fn project_ec2(raw: &Value) -> Vec<Value> {
    array(raw, "Reservations")
        .flat_map(|r| array(r, "Instances"))
        .map(|i| {
            let groups: Vec<Value> = array(i, "SecurityGroups")
                .map(|g| field(g, "/GroupName"))
                .collect();
            json!({
                "InstanceId": field(i, "/InstanceId"),
                "InstanceType": field(i, "/InstanceType"),
                "State": field(i, "/State/Name"),
                "PublicIpAddress": field(i, "/PublicIpAddress"),
                "SecurityGroups": groups,
            })
        })
        .collect()
}

fn project_buckets(raw: &Value) -> Vec<Value> {
    array(raw, "Buckets")
        .map(|b| {
            json!({
                "Name": field(b, "/Name"),
                "CreationDate": field(b, "/CreationDate"),
            })
        })
        .collect()
}

fn project_volumes(raw: &Value) -> Vec<Value> {
    array(raw, "Volumes")
        .map(|v| {
            json!({
                "VolumeId": field(v, "/VolumeId"),
                "Size": field(v, "/Size"),
                "State": field(v, "/State"),
                "Encrypted": field(v, "/Encrypted"),
                "VolumeType": field(v, "/VolumeType"),
                "AvailabilityZone": field(v, "/AvailabilityZone"),
            })
        })
        .collect()
}

fn project_security_groups(raw: &Value) -> Vec<Value> {
    array(raw, "SecurityGroups")
        .map(|g| {
            let mut open_to_world = false;
            let rules: Vec<Value> = array(g, "IpPermissions")
                .map(|p| {
                    let cidrs: Vec<&str> = array(p, "IpRanges")
                        .filter_map(|r| r.get("CidrIp").and_then(Value::as_str))
                        .collect();
                    open_to_world |= cidrs.contains(&"0.0.0.0/0");
                    json!({
                        "IpProtocol": field(p, "/IpProtocol"),
                        "FromPort": field(p, "/FromPort"),
                        "ToPort": field(p, "/ToPort"),
                        "CidrIps": cidrs,
                    })
                })
                .collect();
            json!({
                "GroupId": field(g, "/GroupId"),
                "GroupName": field(g, "/GroupName"),
                "Description": field(g, "/Description"),
                "VpcId": field(g, "/VpcId"),
                "IngressRules": rules,
                "OpenToWorld": open_to_world,
            })
        })
        .collect()
}
