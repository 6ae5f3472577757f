//! Error types for each boundary of the audit pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the cloud provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The CLI could not be started at all
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The CLI ran and reported an error
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("malformed provider response: {0}")]
    Parse(#[from] ParseError),
}

impl ProviderError {
    /// Whatever the provider printed, for the raw debug file.
    pub fn raw_output(&self) -> String {
        match self {
            ProviderError::Command { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// Why one (region, service) listing produced no data.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{service} listing in {region} failed: {source}")]
    Provider {
        region: String,
        service: String,
        #[source]
        source: ProviderError,
    },

    #[error("{service} listing in {region} returned unusable output: {source}")]
    Malformed {
        region: String,
        service: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur when delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build email: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),
}

/// Fatal pre-flight failures; each maps to a distinct exit status.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("{0}")]
    InvalidArgs(String),

    #[error("AWS credentials check failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Runtime(String),
}

impl AuditError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            AuditError::InvalidArgs(_) => 1,
            AuditError::Auth(_) => 2,
            AuditError::Config(_) => 3,
            AuditError::Runtime(_) => 4,
        }
    }

    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            AuditError::InvalidArgs(_) => Some("Run `aws-audit --help` for usage."),
            AuditError::Auth(_) => Some(
                "Configure credentials with `aws configure`, or export AWS_PROFILE / \
                 AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, then retry.",
            ),
            AuditError::Config(_) | AuditError::Runtime(_) => None,
        }
    }
}

/// Exit status for any error reaching `main`.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<AuditError>()
        .map(AuditError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            AuditError::InvalidArgs(String::new()).exit_code(),
            AuditError::Auth(String::new()).exit_code(),
            AuditError::Config(String::new()).exit_code(),
            AuditError::Runtime(String::new()).exit_code(),
        ];
        assert_eq!(codes, [1, 2, 3, 4]);
    }

    #[test]
    fn test_exit_code_through_anyhow() {
        let err: anyhow::Error = AuditError::Auth("expired token".to_string()).into();
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::from(AuditError::Config("missing jq".to_string()))
            .context("pre-flight checks");
        assert_eq!(exit_code(&err), 3);

        assert_eq!(exit_code(&anyhow::anyhow!("anything else")), 1);
    }

    #[test]
    fn test_raw_output_prefers_stderr() {
        let err = ProviderError::Command {
            command: "aws ec2 describe-instances".to_string(),
            status: "exit status: 255".to_string(),
            stderr: "An error occurred (UnauthorizedOperation)".to_string(),
        };
        assert_eq!(err.raw_output(), "An error occurred (UnauthorizedOperation)");
    }
}
