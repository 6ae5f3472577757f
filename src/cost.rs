use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, warn};

use crate::aws::CloudProvider;
use crate::error::ProviderError;
use crate::parsing::parse_cost_response;
use crate::types::{CostSnapshot, CostUnavailable, CostWindow};

const WINDOW_DAYS: i64 = 30;

impl CostWindow {
    /// `[today - 30d, today)`; Cost Explorer treats the end date as exclusive.
    pub fn trailing_30_days(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(WINDOW_DAYS),
            end: today,
        }
    }
}

/// Tag-filtered Cost Explorer query.
pub struct CostEstimator<'a, P: CloudProvider> {
    provider: &'a P,
    tag_key: &'a str,
    tag_value: &'a str,
}

impl<'a, P: CloudProvider> CostEstimator<'a, P> {
    pub fn new(provider: &'a P, tag_key: &'a str, tag_value: &'a str) -> Self {
        Self {
            provider,
            tag_key,
            tag_value,
        }
    }

    pub async fn estimate_trailing(&self) -> CostSnapshot {
        self.estimate(CostWindow::trailing_30_days(Utc::now().date_naive()))
            .await
    }

    pub async fn estimate(&self, window: CostWindow) -> CostSnapshot {
        info!(
            "Querying cost for {}={} from {} to {}",
            self.tag_key, self.tag_value, window.start, window.end
        );
        let raw = match self
            .provider
            .cost_and_usage_raw(window, self.tag_key, self.tag_value)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                let reason = classify_cost_error(&e);
                warn!("Cost data unavailable: {}", reason);
                return CostSnapshot::Unavailable(reason);
            }
        };

        match parse_cost_response(&raw, window, self.tag_key, self.tag_value) {
            Ok(series) => {
                info!(
                    "Cost over {} period(s): {:.2} {}",
                    series.entries.len(),
                    series.total(),
                    series.currency()
                );
                CostSnapshot::Available(series)
            }
            Err(e) => {
                warn!("Cost response unusable: {}", e);
                CostSnapshot::Unavailable(CostUnavailable::Failed(e.to_string()))
            }
        }
    }
}

const UNAUTHORIZED_MARKERS: &[&str] = &[
    "accessdenied",
    "not authorized",
    "unauthorizedoperation",
    "optinrequired",
    "subscription",
];

/// Separate "this account cannot use Cost Explorer" from other failures.
pub fn classify_cost_error(err: &ProviderError) -> CostUnavailable {
    let message = err.raw_output();
    let lowered = message.to_ascii_lowercase();
    if UNAUTHORIZED_MARKERS.iter().any(|m| lowered.contains(m)) {
        CostUnavailable::Unauthorized(message)
    } else {
        CostUnavailable::Failed(message)
    }
}
