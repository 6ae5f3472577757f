//! Notification dispatch to Slack and email.
//!
//! Each channel is gated independently: the run-level `--no-notify` flag
//! wins, then the `NOTIFICATIONS_ENABLED` master switch, then the channel's
//! own switch and settings. Delivery failures are logged and never fail the
//! run.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::email::{compose_email, EmailContent, EmailSender};
use crate::report::{AuditReport, ReportPaths};
use crate::slack::{build_slack_payload, send_to_slack, REPORT_TITLE};
use crate::types::{Config, RunFlags};

/// Whether a channel will be used on this run, and why not if it won't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Ready,
    Disabled,
    SkippedByFlag,
    NotConfigured(&'static str),
    /// Email only: no SMTP relay to hand the message to.
    NoTransport,
}

impl ChannelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ChannelState::Ready)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Ready => f.write_str("enabled"),
            ChannelState::Disabled => f.write_str("disabled"),
            ChannelState::SkippedByFlag => f.write_str("skipped (--no-notify)"),
            ChannelState::NotConfigured(what) => write!(f, "not configured ({} not set)", what),
            ChannelState::NoTransport => f.write_str("unavailable (SMTP_HOST not set)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStates {
    pub slack: ChannelState,
    pub email: ChannelState,
}

impl Default for ChannelStates {
    fn default() -> Self {
        Self {
            slack: ChannelState::Disabled,
            email: ChannelState::Disabled,
        }
    }
}

pub fn should_notify(config: &Config, flags: &RunFlags) -> bool {
    !flags.no_notify && config.notifications_enabled
}

pub fn channel_states(config: &Config, flags: &RunFlags) -> ChannelStates {
    if flags.no_notify {
        return ChannelStates {
            slack: ChannelState::SkippedByFlag,
            email: ChannelState::SkippedByFlag,
        };
    }
    if !config.notifications_enabled {
        return ChannelStates::default();
    }

    let slack = if !config.slack_enabled {
        ChannelState::Disabled
    } else if config.slack_webhook_url.is_none() {
        ChannelState::NotConfigured("SLACK_WEBHOOK_URL")
    } else {
        ChannelState::Ready
    };

    let email = if !config.email_enabled {
        ChannelState::Disabled
    } else if config.email_to.is_none() {
        ChannelState::NotConfigured("EMAIL_TO")
    } else if config.smtp_password.is_none() {
        ChannelState::NotConfigured("SMTP_PASSWORD")
    } else if config.smtp_host.is_none() {
        ChannelState::NoTransport
    } else {
        ChannelState::Ready
    };

    ChannelStates { slack, email }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
    Skipped(ChannelState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub slack: DeliveryOutcome,
    pub email: DeliveryOutcome,
}

/// What gets sent: the chat summary plus the composed email and its attachments.
pub struct NotificationMessage {
    pub summary: String,
    pub account: String,
    pub timestamp: DateTime<Utc>,
    pub email: EmailContent,
    pub attachments: Vec<PathBuf>,
}

impl NotificationMessage {
    pub fn from_report(report: &AuditReport, paths: &ReportPaths, narrative: &str, account: &str) -> Self {
        let email = compose_email(
            &report.summary(),
            &report.service_list(),
            narrative,
            account,
            &report.generated_at.format("%Y-%m-%d").to_string(),
        );
        Self {
            summary: report.headline(),
            account: account.to_string(),
            timestamp: report.generated_at,
            email,
            attachments: paths.files().iter().map(|p| p.to_path_buf()).collect(),
        }
    }

    /// Configuration check message for `--test`.
    pub fn test_message(account: &str, now: DateTime<Utc>) -> Self {
        let summary = "Test notification: aws-audit notification settings are working.".to_string();
        Self {
            email: EmailContent {
                subject: format!("AWS Audit Test Notification - {}", account),
                body: format!("{}\n\nSent at {}.\n", summary, now.to_rfc3339()),
            },
            summary,
            account: account.to_string(),
            timestamp: now,
            attachments: Vec::new(),
        }
    }
}

pub struct Notifier<'a> {
    config: &'a Config,
    http: reqwest::Client,
}

impl<'a> Notifier<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub async fn dispatch(&self, states: &ChannelStates, message: &NotificationMessage) -> DeliveryReport {
        let slack = if states.slack.is_ready() {
            self.send_slack(message).await
        } else {
            skipped("Slack", states.slack)
        };
        let email = if states.email.is_ready() {
            self.send_email(message).await
        } else {
            skipped("Email", states.email)
        };
        DeliveryReport { slack, email }
    }

    async fn send_slack(&self, message: &NotificationMessage) -> DeliveryOutcome {
        let url = match self.config.slack_webhook_url.as_deref() {
            Some(url) => url,
            None => return DeliveryOutcome::Skipped(ChannelState::NotConfigured("SLACK_WEBHOOK_URL")),
        };
        let payload = build_slack_payload(REPORT_TITLE, &message.summary, message.timestamp, &message.account);
        match send_to_slack(&self.http, url, &payload).await {
            Ok(()) => {
                info!(status = "success", "Slack notification sent");
                DeliveryOutcome::Sent
            }
            Err(e) => {
                warn!("Slack notification failed: {}", e);
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    async fn send_email(&self, message: &NotificationMessage) -> DeliveryOutcome {
        match EmailSender::new(self.config)
            .send(&message.email, &message.attachments)
            .await
        {
            Ok(()) => {
                info!(status = "success", "Email notification sent");
                DeliveryOutcome::Sent
            }
            Err(e) => {
                warn!("Email notification failed: {}", e);
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }
}

fn skipped(channel: &str, state: ChannelState) -> DeliveryOutcome {
    match state {
        ChannelState::NoTransport => warn!("{} notification skipped: {}", channel, state),
        _ => info!("{} notification skipped: {}", channel, state),
    }
    DeliveryOutcome::Skipped(state)
}
