//! Audit orchestration: request validation, region resolution, dry-run
//! planning and the collect → cost → report → notify sequence.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::aws::{CloudProvider, KNOWN_REGIONS};
use crate::collector::ResourceCollector;
use crate::cost::CostEstimator;
use crate::error::AuditError;
use crate::notify::{channel_states, should_notify, DeliveryReport, NotificationMessage, Notifier};
use crate::report::writer::ensure_report_dir;
use crate::report::{write_reports, AuditReport, ReportPaths, ReportSummary};
use crate::types::*;
use crate::validate::{check_credentials, check_dependencies};

/// Parse a comma-separated service list. Duplicates collapse; order is kept.
pub fn parse_services(raw: &str) -> Result<Vec<ServiceKind>, AuditError> {
    let mut services = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let service: ServiceKind = tag
            .parse()
            .map_err(|e: UnknownService| AuditError::InvalidArgs(e.to_string()))?;
        if !services.contains(&service) {
            services.push(service);
        }
    }
    if services.is_empty() {
        return Err(AuditError::InvalidArgs(
            "no services given (expected e.g. ec2,s3)".to_string(),
        ));
    }
    Ok(services)
}

pub fn build_request(region: &str, services: &str, flags: RunFlags) -> Result<AuditRequest, AuditError> {
    if region.trim().is_empty() {
        return Err(AuditError::InvalidArgs("region must not be empty".to_string()));
    }
    Ok(AuditRequest {
        regions: RegionSelector::parse(region),
        services: parse_services(services)?,
        flags,
    })
}

pub fn static_regions(selector: &RegionSelector) -> Vec<String> {
    match selector {
        RegionSelector::Single(r) => vec![r.clone()],
        RegionSelector::All => KNOWN_REGIONS.iter().map(|r| r.to_string()).collect(),
    }
}

/// Ask the provider for `all`; fall back to the static list if that fails.
pub async fn resolve_regions<P: CloudProvider>(provider: &P, selector: &RegionSelector) -> Vec<String> {
    match selector {
        RegionSelector::Single(r) => vec![r.clone()],
        RegionSelector::All => match provider.list_regions().await {
            Ok(regions) if !regions.is_empty() => {
                info!("Resolved {} regions", regions.len());
                regions
            }
            Ok(_) => {
                warn!("Region listing was empty; using the built-in region list");
                static_regions(selector)
            }
            Err(e) => {
                warn!("Could not list regions ({}); using the built-in region list", e);
                static_regions(selector)
            }
        },
    }
}

/// Calls a dry run would make, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub calls: Vec<(String, ServiceKind)>,
}

impl CallPlan {
    pub fn new(regions: &[String], services: &[ServiceKind]) -> Self {
        let calls = regions
            .iter()
            .flat_map(|r| services.iter().map(move |s| (r.clone(), *s)))
            .collect();
        Self { calls }
    }

    pub fn for_request(request: &AuditRequest) -> Self {
        Self::new(&static_regions(&request.regions), &request.services)
    }

    pub fn total(&self) -> usize {
        self.calls.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("DRY RUN - no AWS calls will be made\n\nPlanned calls:\n");
        for (region, service) in &self.calls {
            let _ = writeln!(out, "  {} x {} ({})", region, service, service.description());
        }
        let _ = writeln!(out, "\nTotal API calls: {}", self.total());
        out
    }
}

pub struct AuditOutcome {
    pub paths: ReportPaths,
    pub summary: ReportSummary,
    pub cost: CostSnapshot,
    pub delivery: Option<DeliveryReport>,
}

/// What `Auditor::execute` did: previewed a dry run or ran the audit.
pub enum AuditRun {
    Planned(CallPlan),
    Completed(AuditOutcome),
}

/// Drives one audit against a provider: validation, dry-run preview, full run.
pub struct Auditor<'a, P: CloudProvider> {
    provider: &'a P,
    config: &'a Config,
    tool_check: fn() -> Result<(), AuditError>,
}

impl<'a, P: CloudProvider> Auditor<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self {
            provider,
            config,
            tool_check: check_dependencies,
        }
    }

    /// Replace the PATH lookup for `aws` and `jq`.
    pub fn with_tool_check(mut self, check: fn() -> Result<(), AuditError>) -> Self {
        self.tool_check = check;
        self
    }

    /// Validate raw arguments, then preview or run.
    ///
    /// Arguments and tools are checked before the provider is touched. A dry
    /// run stops after that and makes no provider call.
    pub async fn execute(
        &self,
        region: &str,
        services: &str,
        flags: RunFlags,
        started_at: DateTime<Utc>,
    ) -> Result<AuditRun> {
        let request = build_request(region, services, flags)?;
        (self.tool_check)()?;

        if request.flags.dry_run {
            let plan = CallPlan::for_request(&request);
            info!("Dry run: {} call(s) planned", plan.total());
            return Ok(AuditRun::Planned(plan));
        }

        let identity = check_credentials(self.provider).await?;
        let outcome = self.run(&request, &identity, started_at).await?;
        Ok(AuditRun::Completed(outcome))
    }

    /// Collect, estimate, report and notify for an already authenticated request.
    pub async fn run(
        &self,
        request: &AuditRequest,
        identity: &CallerIdentity,
        started_at: DateTime<Utc>,
    ) -> Result<AuditOutcome> {
        if request.flags.dry_run {
            return Err(AuditError::InvalidArgs(
                "a dry-run request cannot be run; use execute to preview it".to_string(),
            )
            .into());
        }
        let paths = ReportPaths::new(&self.config.report_dir, started_at);
        ensure_report_dir(&paths.dir).map_err(|e| AuditError::Runtime(e.to_string()))?;

        let regions = resolve_regions(self.provider, &request.regions).await;
        info!(
            "Auditing {} region(s) x {} service(s)",
            regions.len(),
            request.services.len()
        );

        let collector = ResourceCollector::new(self.provider, &paths.dir);
        let records = collector.collect_all(&regions, &request.services).await;

        let cost = if request.flags.no_cost {
            info!("Cost analysis skipped (--no-cost)");
            CostSnapshot::Unavailable(CostUnavailable::Disabled)
        } else {
            CostEstimator::new(self.provider, &self.config.cost_tag_key, &self.config.cost_tag_value)
                .estimate_trailing()
                .await
        };

        let channels = channel_states(self.config, &request.flags);
        let mut report = AuditReport::new(self.config.clone(), started_at);
        report.set_scope(regions, request.services.clone());
        report.add_records(records);
        report.set_cost(cost.clone());
        report.set_channels(channels);

        let narrative = write_reports(&report, &paths).map_err(|e| AuditError::Runtime(e.to_string()))?;
        let summary = report.summary();
        info!(
            status = "success",
            "Audit complete: {} resource(s) in {} region(s)",
            summary.total_resources,
            summary.region_count
        );

        let delivery = if should_notify(self.config, &request.flags) {
            let message = NotificationMessage::from_report(&report, &paths, &narrative, &identity.account);
            Some(Notifier::new(self.config).dispatch(&channels, &message).await)
        } else {
            info!("Notifications not sent (disabled or --no-notify)");
            None
        };

        Ok(AuditOutcome {
            paths,
            summary,
            cost,
            delivery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockProvider;

    #[test]
    fn test_parse_services() {
        assert_eq!(
            parse_services("ec2,s3").unwrap(),
            vec![ServiceKind::Ec2, ServiceKind::S3]
        );
        assert_eq!(
            parse_services(" RDS , lambda,ebs ").unwrap(),
            vec![ServiceKind::Rds, ServiceKind::Lambda, ServiceKind::Ebs]
        );
        assert_eq!(parse_services("s3,ec2,s3").unwrap(), vec![ServiceKind::S3, ServiceKind::Ec2]);
    }

    #[test]
    fn test_parse_services_rejects_unknown_and_empty() {
        let err = parse_services("ec2,dynamodb").unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("dynamodb"));

        assert!(parse_services("").is_err());
        assert!(parse_services(" , ,").is_err());
    }

    #[test]
    fn test_build_request() {
        let request = build_request("all", "ec2", RunFlags::default()).unwrap();
        assert_eq!(request.regions, RegionSelector::All);

        let request = build_request("eu-west-1", "s3", RunFlags::default()).unwrap();
        assert_eq!(request.regions, RegionSelector::Single("eu-west-1".to_string()));

        assert!(build_request("  ", "s3", RunFlags::default()).is_err());
    }

    #[test]
    fn test_call_plan() {
        let request = build_request("us-east-1", "ec2,s3", RunFlags::default()).unwrap();
        let plan = CallPlan::for_request(&request);
        assert_eq!(plan.total(), 2);
        assert_eq!(
            plan.calls,
            vec![
                ("us-east-1".to_string(), ServiceKind::Ec2),
                ("us-east-1".to_string(), ServiceKind::S3),
            ]
        );
        let text = plan.render();
        assert!(text.contains("us-east-1 x ec2"));
        assert!(text.contains("us-east-1 x s3"));
        assert!(text.contains("Total API calls: 2"));
    }

    #[test]
    fn test_call_plan_all_regions() {
        let request = build_request("all", "ec2,lambda,rds", RunFlags::default()).unwrap();
        assert_eq!(CallPlan::for_request(&request).total(), KNOWN_REGIONS.len() * 3);
    }

    #[tokio::test]
    async fn test_resolve_regions() {
        let provider = MockProvider::new().with_regions(&["eu-west-1", "us-east-1"]);
        assert_eq!(
            resolve_regions(&provider, &RegionSelector::All).await,
            vec!["eu-west-1", "us-east-1"]
        );

        let single = resolve_regions(&provider, &RegionSelector::Single("ap-south-1".into())).await;
        assert_eq!(single, vec!["ap-south-1"]);
        // Only the `all` lookup reached the provider
        assert_eq!(provider.calls(), vec!["ec2:describe-regions"]);
    }

    #[tokio::test]
    async fn test_run_refuses_dry_run_request() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::load_config_with_env(
            &crate::config::MockEnvironment::new().with_var("REPORT_DIR", dir.path().to_string_lossy()),
        );
        let provider = MockProvider::new();
        let flags = RunFlags {
            dry_run: true,
            ..RunFlags::default()
        };
        let request = build_request("us-east-1", "ec2", flags).unwrap();
        let identity = CallerIdentity {
            account: "1".to_string(),
            arn: "arn".to_string(),
        };

        let err = Auditor::new(&provider, &config)
            .run(&request, &identity, chrono::Utc::now())
            .await
            .err()
            .unwrap();
        assert_eq!(crate::error::exit_code(&err), 1);
        assert!(provider.calls().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_regions_falls_back() {
        let provider = MockProvider::new();
        let regions = resolve_regions(&provider, &RegionSelector::All).await;
        assert_eq!(regions.len(), KNOWN_REGIONS.len());

        let provider = MockProvider::new().with_regions(&[]);
        assert_eq!(resolve_regions(&provider, &RegionSelector::All).await.len(), KNOWN_REGIONS.len());
    }
}
