use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;
use crate::parsing::{parse_caller_identity, parse_identifier_list, COST_METRIC};
use crate::types::{CallerIdentity, CostWindow, ServiceKind};

/// Commercial regions, used when region enumeration is impossible or unwanted (dry runs).
pub const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ca-central-1",
    "ca-west-1",
    "eu-central-1",
    "eu-central-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-south-1",
    "eu-south-2",
    "eu-north-1",
    "il-central-1",
    "me-south-1",
    "me-central-1",
    "sa-east-1",
];

/// Everything the audit asks of the cloud provider.
///
/// Listing and cost calls hand back the provider's raw output so callers can
/// keep a debug copy before normalizing it.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError>;

    async fn list_regions(&self) -> Result<Vec<String>, ProviderError>;

    async fn list_resources_raw(
        &self,
        service: ServiceKind,
        region: &str,
    ) -> Result<String, ProviderError>;

    async fn cost_and_usage_raw(
        &self,
        window: CostWindow,
        tag_key: &str,
        tag_value: &str,
    ) -> Result<String, ProviderError>;
}

/// Provider backed by the `aws` command-line tool.
#[derive(Debug, Clone)]
pub struct AwsCli {
    binary: String,
    default_region: String,
}

impl AwsCli {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            binary: "aws".to_string(),
            default_region: default_region.into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: Vec<String>) -> Result<String, ProviderError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!("running {}", command);

        let output = Command::new(&self.binary)
            .args(&args)
            .env("AWS_PAGER", "")
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProviderError::Command {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CloudProvider for AwsCli {
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError> {
        let raw = self.run(args(&["sts", "get-caller-identity", "--output", "json"])).await?;
        Ok(parse_caller_identity(&raw)?)
    }

    async fn list_regions(&self) -> Result<Vec<String>, ProviderError> {
        let raw = self
            .run(args(&[
                "ec2",
                "describe-regions",
                "--region",
                self.default_region.as_str(),
                "--query",
                "Regions[].RegionName",
                "--output",
                "json",
            ]))
            .await?;
        let mut regions = parse_identifier_list(&raw)?;
        regions.sort();
        Ok(regions)
    }

    async fn list_resources_raw(
        &self,
        service: ServiceKind,
        region: &str,
    ) -> Result<String, ProviderError> {
        self.run(listing_args(service, region)).await
    }

    async fn cost_and_usage_raw(
        &self,
        window: CostWindow,
        tag_key: &str,
        tag_value: &str,
    ) -> Result<String, ProviderError> {
        self.run(cost_args(window, tag_key, tag_value)).await
    }
}

/// In-memory provider for tests; records every call it receives.
#[derive(Debug, Default)]
pub struct MockProvider {
    identity: Option<CallerIdentity>,
    regions: Option<Vec<String>>,
    listings: HashMap<(ServiceKind, String), Result<String, String>>,
    cost: Option<Result<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, account: &str, arn: &str) -> Self {
        self.identity = Some(CallerIdentity {
            account: account.to_string(),
            arn: arn.to_string(),
        });
        self
    }

    pub fn with_regions(mut self, regions: &[&str]) -> Self {
        self.regions = Some(regions.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Raw output for a listing; region `*` matches any region.
    pub fn with_listing(mut self, service: ServiceKind, region: &str, raw: &str) -> Self {
        self.listings
            .insert((service, region.to_string()), Ok(raw.to_string()));
        self
    }

    pub fn with_listing_error(mut self, service: ServiceKind, region: &str, stderr: &str) -> Self {
        self.listings
            .insert((service, region.to_string()), Err(stderr.to_string()));
        self
    }

    pub fn with_cost(mut self, raw: &str) -> Self {
        self.cost = Some(Ok(raw.to_string()));
        self
    }

    pub fn with_cost_error(mut self, stderr: &str) -> Self {
        self.cost = Some(Err(stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn failed(command: &str, stderr: &str) -> ProviderError {
        ProviderError::Command {
            command: command.to_string(),
            status: "exit status: 255".to_string(),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError> {
        self.record("sts:get-caller-identity".to_string());
        self.identity.clone().ok_or_else(|| {
            Self::failed(
                "aws sts get-caller-identity",
                "Unable to locate credentials. You can configure credentials by running \"aws configure\".",
            )
        })
    }

    async fn list_regions(&self) -> Result<Vec<String>, ProviderError> {
        self.record("ec2:describe-regions".to_string());
        self.regions
            .clone()
            .ok_or_else(|| Self::failed("aws ec2 describe-regions", "could not connect"))
    }

    async fn list_resources_raw(
        &self,
        service: ServiceKind,
        region: &str,
    ) -> Result<String, ProviderError> {
        self.record(format!("{}:{}", service, region));
        let entry = self
            .listings
            .get(&(service, region.to_string()))
            .or_else(|| self.listings.get(&(service, "*".to_string())));
        match entry {
            Some(Ok(raw)) => Ok(raw.clone()),
            Some(Err(stderr)) => Err(Self::failed(&listing_args(service, region).join(" "), stderr)),
            None => Ok("[]".to_string()),
        }
    }

    async fn cost_and_usage_raw(
        &self,
        _window: CostWindow,
        tag_key: &str,
        tag_value: &str,
    ) -> Result<String, ProviderError> {
        self.record(format!("ce:get-cost-and-usage:{}={}", tag_key, tag_value));
        match &self.cost {
            Some(Ok(raw)) => Ok(raw.clone()),
            Some(Err(stderr)) => Err(Self::failed("aws ce get-cost-and-usage", stderr)),
            None => Ok(r#"{"ResultsByTime": []}"#.to_string()),
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// One listing call per service; S3 bucket listing takes no region.
pub fn listing_args(service: ServiceKind, region: &str) -> Vec<String> {
    let (cmd, op, query) = match service {
        ServiceKind::Ec2 => ("ec2", "describe-instances", "Reservations[].Instances[].InstanceId"),
        ServiceKind::S3 => ("s3api", "list-buckets", "Buckets[].Name"),
        ServiceKind::Ebs => ("ec2", "describe-volumes", "Volumes[].VolumeId"),
        ServiceKind::Lambda => ("lambda", "list-functions", "Functions[].FunctionName"),
        ServiceKind::Rds => ("rds", "describe-db-instances", "DBInstances[].DBInstanceIdentifier"),
    };
    let mut out = args(&[cmd, op]);
    if !service.is_global() {
        out.push("--region".to_string());
        out.push(region.to_string());
    }
    out.extend(args(&["--query", query, "--output", "json"]));
    out
}

pub fn cost_args(window: CostWindow, tag_key: &str, tag_value: &str) -> Vec<String> {
    let filter = serde_json::json!({
        "Tags": { "Key": tag_key, "Values": [tag_value] }
    });
    vec![
        "ce".to_string(),
        "get-cost-and-usage".to_string(),
        "--time-period".to_string(),
        format!(
            "Start={},End={}",
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        ),
        "--granularity".to_string(),
        "MONTHLY".to_string(),
        "--metrics".to_string(),
        COST_METRIC.to_string(),
        "--filter".to_string(),
        filter.to_string(),
        "--output".to_string(),
        "json".to_string(),
    ]
}
