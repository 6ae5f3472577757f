use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Credential wrapper that keeps the value out of `Debug` output and logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub default_region: String,
    pub report_dir: PathBuf,
    pub log_file: PathBuf,
    pub notifications_enabled: bool,
    pub slack_enabled: bool,
    pub slack_webhook_url: Option<String>,
    pub email_enabled: bool,
    pub email_to: Option<String>,
    pub email_from: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub cost_tag_key: String,
    pub cost_tag_value: String,
}

/// Resource categories the audit knows how to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Ec2,
    S3,
    Ebs,
    Lambda,
    Rds,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Ec2,
        ServiceKind::S3,
        ServiceKind::Ebs,
        ServiceKind::Lambda,
        ServiceKind::Rds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Ec2 => "ec2",
            ServiceKind::S3 => "s3",
            ServiceKind::Ebs => "ebs",
            ServiceKind::Lambda => "lambda",
            ServiceKind::Rds => "rds",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ServiceKind::Ec2 => "EC2 instances",
            ServiceKind::S3 => "S3 buckets",
            ServiceKind::Ebs => "EBS volumes",
            ServiceKind::Lambda => "Lambda functions",
            ServiceKind::Rds => "RDS instances",
        }
    }

    /// S3 bucket listing is account-wide rather than per region.
    pub fn is_global(&self) -> bool {
        matches!(self, ServiceKind::S3)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported service '{0}' (supported: ec2, s3, ebs, lambda, rds)")]
pub struct UnknownService(pub String);

impl FromStr for ServiceKind {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ec2" => Ok(ServiceKind::Ec2),
            "s3" => Ok(ServiceKind::S3),
            "ebs" => Ok(ServiceKind::Ebs),
            "lambda" => Ok(ServiceKind::Lambda),
            "rds" => Ok(ServiceKind::Rds),
            _ => Err(UnknownService(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelector {
    Single(String),
    All,
}

impl RegionSelector {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            RegionSelector::All
        } else {
            RegionSelector::Single(raw.to_string())
        }
    }
}

impl fmt::Display for RegionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionSelector::Single(r) => f.write_str(r),
            RegionSelector::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub dry_run: bool,
    pub verbose: bool,
    pub no_notify: bool,
    pub no_cost: bool,
}

/// Validated description of one audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRequest {
    pub regions: RegionSelector,
    pub services: Vec<ServiceKind>,
    pub flags: RunFlags,
}

/// Identifiers found for one (region, service) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    pub region: String,
    pub service: ServiceKind,
    pub resources: Vec<String>,
    pub count: usize,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(region: impl Into<String>, service: ServiceKind, resources: Vec<String>) -> Self {
        Self::captured(region, service, resources, Utc::now())
    }

    pub fn captured(
        region: impl Into<String>,
        service: ServiceKind,
        resources: Vec<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let count = resources.len();
        Self {
            region: region.into(),
            service,
            resources,
            count,
            captured_at,
        }
    }

    pub fn empty(region: impl Into<String>, service: ServiceKind) -> Self {
        Self::new(region, service, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEntry {
    #[serde(rename = "start")]
    pub period_start: String,
    #[serde(rename = "end")]
    pub period_end: String,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSeries {
    pub window: CostWindow,
    pub tag_key: String,
    pub tag_value: String,
    #[serde(rename = "periods")]
    pub entries: Vec<CostEntry>,
}

impl CostSeries {
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn currency(&self) -> &str {
        self.entries.first().map(|e| e.currency.as_str()).unwrap_or("USD")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostUnavailable {
    Disabled,
    Unauthorized(String),
    Failed(String),
}

impl fmt::Display for CostUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostUnavailable::Disabled => f.write_str("cost analysis disabled"),
            CostUnavailable::Unauthorized(m) => write!(f, "no Cost Explorer access: {}", m),
            CostUnavailable::Failed(m) => write!(f, "cost query failed: {}", m),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CostSnapshot {
    Available(CostSeries),
    Unavailable(CostUnavailable),
}

impl CostSnapshot {
    pub fn series(&self) -> Option<&CostSeries> {
        match self {
            CostSnapshot::Available(s) => Some(s),
            CostSnapshot::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

#[derive(Serialize)]
pub struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub blocks: Vec<serde_json::Value>,
}
