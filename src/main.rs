use anyhow::Result;
use chrono::Utc;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info, warn};

use aws_audit::audit::{AuditOutcome, AuditRun, Auditor};
use aws_audit::aws::{AwsCli, CloudProvider};
use aws_audit::config::load_config;
use aws_audit::error::{exit_code, AuditError};
use aws_audit::logging::init_tracing;
use aws_audit::notify::{channel_states, DeliveryOutcome, DeliveryReport, NotificationMessage, Notifier};
use aws_audit::types::{Config, RunFlags};
use aws_audit::validate::check_dependencies;

#[derive(Debug, Parser)]
#[command(
    name = "aws-audit",
    version,
    about = "Inventory AWS resources across regions and services, estimate tagged cost, and report"
)]
struct Cli {
    /// Region to audit, or `all`
    region: Option<String>,
    /// Comma-separated services: ec2, s3, ebs, lambda, rds
    services: Option<String>,
    /// Print the planned calls and exit without touching AWS
    #[arg(long)]
    dry_run: bool,
    /// Log debug output to the console and the run log
    #[arg(long)]
    verbose: bool,
    /// Skip Slack and email for this run
    #[arg(long)]
    no_notify: bool,
    /// Skip the Cost Explorer query
    #[arg(long)]
    no_cost: bool,
    /// Send a test notification through the enabled channels and exit
    #[arg(long)]
    test: bool,
}

impl Cli {
    fn flags(&self) -> RunFlags {
        RunFlags {
            dry_run: self.dry_run,
            verbose: self.verbose,
            no_notify: self.no_notify,
            no_cost: self.no_cost,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    };

    if let Err(err) = run(cli).await {
        if tracing::dispatcher::has_been_set() {
            error!("{:#}", err);
        } else {
            eprintln!("error: {:#}", err);
        }
        if let Some(hint) = err.downcast_ref::<AuditError>().and_then(AuditError::remediation) {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(exit_code(&err));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, origin) = load_config().map_err(|e| AuditError::Config(format!("{:#}", e)))?;
    let flags = cli.flags();

    if let Some(e) = init_tracing(flags.verbose, &config.log_file) {
        warn!("Run log {} unavailable: {}", config.log_file.display(), e);
    }
    match &origin.path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found; using environment variables and defaults"),
    }
    for line in &origin.skipped_lines {
        warn!("Ignoring unparseable config line: {}", line);
    }

    if cli.test {
        check_dependencies()?;
        return send_test_notification(&config, &flags).await;
    }

    let (region, services) = match (cli.region.as_deref(), cli.services.as_deref()) {
        (Some(region), Some(services)) => (region, services),
        _ => {
            return Err(AuditError::InvalidArgs(
                "missing arguments: usage is `aws-audit <REGION|all> <SERVICES>`".to_string(),
            )
            .into())
        }
    };

    let provider = AwsCli::new(config.default_region.clone());
    match Auditor::new(&provider, &config)
        .execute(region, services, flags, Utc::now())
        .await?
    {
        AuditRun::Planned(plan) => print!("{}", plan.render()),
        AuditRun::Completed(outcome) => print_outcome(&outcome),
    }
    Ok(())
}

fn print_outcome(outcome: &AuditOutcome) {
    println!(
        "Audited {} region(s): {} resource(s) found",
        outcome.summary.region_count, outcome.summary.total_resources
    );
    if let Some(series) = outcome.cost.series() {
        println!("Cost (last 30 days): {:.2} {}", series.total(), series.currency());
    }
    println!("Reports written to {}:", outcome.paths.dir.display());
    for file in outcome.paths.files() {
        println!("  {}", file.display());
    }
    if let Some(delivery) = &outcome.delivery {
        print_delivery(delivery);
    }
}

async fn send_test_notification(config: &Config, flags: &RunFlags) -> Result<()> {
    if !config.notifications_enabled {
        warn!("NOTIFICATIONS_ENABLED is false; no channel will be used");
    }
    let account = match AwsCli::new(config.default_region.clone()).caller_identity().await {
        Ok(identity) => identity.account,
        Err(e) => {
            warn!("Could not resolve the AWS account ({}); sending as 'unknown'", e);
            "unknown".to_string()
        }
    };

    let states = channel_states(config, flags);
    let message = NotificationMessage::test_message(&account, Utc::now());
    let delivery = Notifier::new(config).dispatch(&states, &message).await;
    print_delivery(&delivery);
    Ok(())
}

fn print_delivery(delivery: &DeliveryReport) {
    println!("Slack: {}", describe(&delivery.slack));
    println!("Email: {}", describe(&delivery.email));
}

fn describe(outcome: &DeliveryOutcome) -> String {
    match outcome {
        DeliveryOutcome::Sent => "sent".to_string(),
        DeliveryOutcome::Failed(reason) => format!("failed ({})", reason),
        DeliveryOutcome::Skipped(state) => format!("skipped, {}", state),
    }
}
