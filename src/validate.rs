use tracing::{debug, info};

use crate::aws::CloudProvider;
use crate::error::AuditError;
use crate::types::CallerIdentity;

/// External tools the audit shells out to, with an install hint for each.
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    (
        "aws",
        "Install AWS CLI v2: https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
    ),
    (
        "jq",
        "Install jq with your package manager (e.g. `apt install jq` or `brew install jq`).",
    ),
];

pub fn check_dependencies() -> Result<(), AuditError> {
    check_tools(REQUIRED_TOOLS, |tool| which::which(tool).is_ok())
}

/// Fails on the first tool the resolver cannot find.
pub fn check_tools<F>(tools: &[(&str, &str)], resolves: F) -> Result<(), AuditError>
where
    F: Fn(&str) -> bool,
{
    for (tool, hint) in tools {
        if !resolves(tool) {
            return Err(AuditError::Config(format!(
                "required tool '{}' not found on PATH. {}",
                tool, hint
            )));
        }
        debug!("found {}", tool);
    }
    Ok(())
}

pub async fn check_credentials<P: CloudProvider>(provider: &P) -> Result<CallerIdentity, AuditError> {
    let identity = provider
        .caller_identity()
        .await
        .map_err(|e| AuditError::Auth(e.to_string()))?;
    info!(status = "success", "Authenticated as {} (account {})", identity.arn, identity.account);
    Ok(identity)
}
