use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::types::{CallerIdentity, CostEntry, CostSeries, CostWindow};

/// Normalize a `--query` listing into an ordered identifier list.
///
/// Empty output and `null` mean no resources. Nested arrays are flattened,
/// numbers and booleans are stringified, objects are dropped.
pub fn parse_identifier_list(raw: &str) -> Result<Vec<String>, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut out = Vec::new();
            flatten_into(items, &mut out);
            Ok(out)
        }
        Value::String(s) => Ok(vec![s]),
        other => Err(ParseError::UnexpectedShape(format!(
            "expected an array of identifiers, got {}",
            kind_of(&other)
        ))),
    }
}

fn flatten_into(items: Vec<Value>, out: &mut Vec<String>) {
    for item in items {
        match item {
            Value::String(s) if !s.is_empty() => out.push(s),
            Value::Number(n) => out.push(n.to_string()),
            Value::Bool(b) => out.push(b.to_string()),
            Value::Array(inner) => flatten_into(inner, out),
            _ => {}
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentityResponse {
    account: Option<String>,
    arn: Option<String>,
}

pub fn parse_caller_identity(raw: &str) -> Result<CallerIdentity, ParseError> {
    let resp: CallerIdentityResponse = serde_json::from_str(raw.trim())?;
    let account = resp
        .account
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ParseError::UnexpectedShape("identity has no Account".to_string()))?;
    Ok(CallerIdentity {
        account,
        arn: resp.arn.unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CostAndUsageResponse {
    #[serde(default)]
    results_by_time: Vec<ResultByTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultByTime {
    time_period: TimePeriod,
    #[serde(default)]
    total: std::collections::HashMap<String, MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TimePeriod {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetricValue {
    amount: String,
    unit: String,
}

pub const COST_METRIC: &str = "UnblendedCost";

/// Turn a `ce get-cost-and-usage` response into a cost series.
///
/// A period without the metric counts as zero in USD; a non-numeric amount
/// is a shape error.
pub fn parse_cost_response(
    raw: &str,
    window: CostWindow,
    tag_key: &str,
    tag_value: &str,
) -> Result<CostSeries, ParseError> {
    let resp: CostAndUsageResponse = serde_json::from_str(raw.trim())?;
    let mut entries = Vec::with_capacity(resp.results_by_time.len());
    for period in resp.results_by_time {
        let (amount, currency) = match period.total.get(COST_METRIC) {
            Some(m) => {
                let amount = parse_amount(&m.amount).ok_or_else(|| {
                    ParseError::UnexpectedShape(format!("non-numeric amount '{}'", m.amount))
                })?;
                (amount, m.unit.clone())
            }
            None => (0.0, "USD".to_string()),
        };
        entries.push(CostEntry {
            period_start: period.time_period.start,
            period_end: period.time_period.end,
            amount,
            currency,
        });
    }
    Ok(CostSeries {
        window,
        tag_key: tag_key.to_string(),
        tag_value: tag_value.to_string(),
        entries,
    })
}

pub fn parse_amount(q: &str) -> Option<f64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }
    q.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> CostWindow {
        CostWindow {
            start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        }
    }

    #[test]
    fn test_parse_identifier_list() {
        assert_eq!(
            parse_identifier_list(r#"["i-0abc", "i-0def"]"#).unwrap(),
            vec!["i-0abc", "i-0def"]
        );

        // Instances nested per reservation
        assert_eq!(
            parse_identifier_list(r#"[["i-1", "i-2"], ["i-3"]]"#).unwrap(),
            vec!["i-1", "i-2", "i-3"]
        );

        // Empty and null output
        assert!(parse_identifier_list("").unwrap().is_empty());
        assert!(parse_identifier_list("  \n").unwrap().is_empty());
        assert!(parse_identifier_list("null").unwrap().is_empty());
        assert!(parse_identifier_list("[]").unwrap().is_empty());

        // Single scalar
        assert_eq!(parse_identifier_list(r#""only-bucket""#).unwrap(), vec!["only-bucket"]);
    }

    #[test]
    fn test_parse_identifier_list_coercion() {
        let ids = parse_identifier_list(r#"["fn-a", null, 42, {"x": 1}, "", "fn-b"]"#).unwrap();
        assert_eq!(ids, vec!["fn-a", "42", "fn-b"]);
    }

    #[test]
    fn test_parse_identifier_list_rejects_garbage() {
        assert!(matches!(
            parse_identifier_list("An error occurred (AccessDenied)"),
            Err(ParseError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_identifier_list(r#"{"Reservations": []}"#),
            Err(ParseError::UnexpectedShape(_))
        ));
        assert!(parse_identifier_list("[\"unterminated").is_err());
    }

    #[test]
    fn test_parse_caller_identity() {
        let raw = r#"{"UserId":"AIDA123","Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/ops"}"#;
        let id = parse_caller_identity(raw).unwrap();
        assert_eq!(id.account, "123456789012");
        assert_eq!(id.arn, "arn:aws:iam::123456789012:user/ops");

        assert!(parse_caller_identity(r#"{"UserId":"x"}"#).is_err());
        assert!(parse_caller_identity("not json").is_err());
    }

    #[test]
    fn test_parse_cost_response() {
        let raw = r#"{
            "ResultsByTime": [
                {"TimePeriod": {"Start": "2024-05-01", "End": "2024-05-31"},
                 "Total": {"UnblendedCost": {"Amount": "12.3456", "Unit": "USD"}},
                 "Groups": [], "Estimated": true}
            ],
            "DimensionValueAttributes": []
        }"#;
        let series = parse_cost_response(raw, window(), "Project", "web").unwrap();
        assert_eq!(series.entries.len(), 1);
        assert_eq!(series.entries[0].period_start, "2024-05-01");
        assert_eq!(series.entries[0].period_end, "2024-05-31");
        assert!((series.entries[0].amount - 12.3456).abs() < 1e-9);
        assert_eq!(series.entries[0].currency, "USD");
        assert_eq!(series.tag_key, "Project");
        assert_eq!(series.tag_value, "web");
    }

    #[test]
    fn test_parse_cost_response_zero_and_missing_metric() {
        let raw = r#"{"ResultsByTime": [
            {"TimePeriod": {"Start": "2024-04-16", "End": "2024-05-01"},
             "Total": {"UnblendedCost": {"Amount": "0", "Unit": "USD"}}},
            {"TimePeriod": {"Start": "2024-05-01", "End": "2024-05-16"}, "Total": {}}
        ]}"#;
        let series = parse_cost_response(raw, window(), "Project", "web").unwrap();
        assert_eq!(series.entries.len(), 2);
        assert_eq!(series.total(), 0.0);
        assert_eq!(series.entries[1].currency, "USD");
    }

    #[test]
    fn test_parse_cost_response_errors() {
        let bad_amount = r#"{"ResultsByTime": [
            {"TimePeriod": {"Start": "a", "End": "b"},
             "Total": {"UnblendedCost": {"Amount": "lots", "Unit": "USD"}}}
        ]}"#;
        assert!(matches!(
            parse_cost_response(bad_amount, window(), "k", "v"),
            Err(ParseError::UnexpectedShape(_))
        ));
        assert!(parse_cost_response("", window(), "k", "v").is_err());
        assert!(parse_cost_response("{}", window(), "k", "v").unwrap().entries.is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount(" 1.50 "), Some(1.5));
        assert_eq!(parse_amount("0.0000001"), Some(0.0000001));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("$3"), None);
    }
}
