use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::NotifyError;
use crate::types::SlackPayload;

pub const REPORT_TITLE: &str = "AWS Resource Audit Report";

/// Header, free-text summary, then a context line with time and account.
pub fn build_slack_payload(
    title: &str,
    summary: &str,
    timestamp: DateTime<Utc>,
    account: &str,
) -> SlackPayload {
    let mut blocks: Vec<serde_json::Value> = Vec::new();
    blocks.push(serde_json::json!({
        "type": "header",
        "text": {"type": "plain_text", "text": title}
    }));

    let summary = if summary.trim().is_empty() {
        "No summary available."
    } else {
        summary
    };
    blocks.push(serde_json::json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": summary}
    }));

    let context = format!(
        "*Time:* {} | *Account:* `{}`",
        timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        account
    );
    blocks.push(serde_json::json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": context}]
    }));

    SlackPayload {
        text: Some(format!("{}: {}", title, summary)),
        blocks,
    }
}

pub async fn send_to_slack(
    client: &reqwest::Client,
    webhook_url: &str,
    payload: &SlackPayload,
) -> Result<(), NotifyError> {
    let res = client.post(webhook_url).json(payload).send().await?;
    if !res.status().is_success() {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        return Err(NotifyError::Status { status, body });
    }
    debug!("Slack webhook accepted the message");
    Ok(())
}
