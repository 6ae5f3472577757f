//! Email delivery of audit reports over an SMTP relay.

use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::report::ReportSummary;
use crate::types::Config;

/// Lines of the narrative report quoted at the end of the email body.
pub const REPORT_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

pub fn compose_email(
    summary: &ReportSummary,
    services: &str,
    narrative: &str,
    account: &str,
    date: &str,
) -> EmailContent {
    let subject = format!("AWS Audit Report - {} - {}", account, date);

    let mut body = String::new();
    body.push_str("AWS resource audit completed.\n\n");
    body.push_str(&format!("Total resources: {}\n", summary.total_resources));
    body.push_str(&format!("Regions audited: {}\n", summary.region_count));
    body.push_str(&format!("Services: {}\n", services));
    body.push_str("\nFull reports are attached.\n\n");
    body.push_str("--- Report excerpt ---\n");
    body.push_str(&tail_lines(narrative, REPORT_TAIL_LINES));
    if !body.ends_with('\n') {
        body.push('\n');
    }

    EmailContent { subject, body }
}

pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// SMTP relay connection details, borrowed from the config.
pub struct EmailSender<'a> {
    config: &'a Config,
}

impl<'a> EmailSender<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub async fn send(&self, content: &EmailContent, attachments: &[PathBuf]) -> Result<(), NotifyError> {
        let to = self.config.email_to.as_deref().unwrap_or_default();
        let message = build_message(&self.config.email_from, to, content, attachments)?;

        let host = self.config.smtp_host.as_deref().unwrap_or_default();
        let user = self
            .config
            .smtp_user
            .clone()
            .unwrap_or_else(|| self.config.email_from.clone());
        let password = self
            .config
            .smtp_password
            .as_ref()
            .map(|p| p.expose_secret().to_string())
            .unwrap_or_default();

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?
                .port(self.config.smtp_port)
                .credentials(Credentials::new(user, password))
                .build();

        mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        info!(to = %to, subject = %content.subject, "Email sent");
        Ok(())
    }
}

pub fn build_message(
    from: &str,
    to: &str,
    content: &EmailContent,
    attachments: &[PathBuf],
) -> Result<Message, NotifyError> {
    let from: Mailbox = from.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: from.to_string(),
        reason: e.to_string(),
    })?;
    let to: Mailbox = to.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: to.to_string(),
        reason: e.to_string(),
    })?;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(content.body.clone()));
    for path in attachments {
        match std::fs::read(path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "report".to_string());
                parts = parts.singlepart(Attachment::new(name).body(bytes, content_type_for(path)));
            }
            Err(e) => warn!("not attaching {}: {}", path.display(), e),
        }
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(content.subject.clone())
        .multipart(parts)
        .map_err(|e| NotifyError::Message(e.to_string()))
}

fn content_type_for(path: &Path) -> ContentType {
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        _ => "text/plain",
    };
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}
