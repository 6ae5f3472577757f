//! Serializers for the four report artifacts.

use std::fmt::Write as _;

use serde_json::{json, Value};

use super::{AuditReport, ReportPaths};
use crate::collector::raw_file_name;
use crate::types::{CostSnapshot, ResourceRecord};

pub const CSV_HEADER: &str = "region,service,resource_count";

const RULE: &str = "==============================================================";

pub fn detailed_json(records: &[ResourceRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Per-record counts, plus one trailing cost entry when cost data exists.
pub fn summary_json(records: &[ResourceRecord], cost: &CostSnapshot) -> Result<String, serde_json::Error> {
    let mut entries: Vec<Value> = records
        .iter()
        .map(|r| {
            json!({
                "region": r.region,
                "service": r.service,
                "count": r.resources.len(),
            })
        })
        .collect();

    if let Some(series) = cost.series() {
        entries.push(json!({
            "type": "cost",
            "tag_key": series.tag_key,
            "tag_value": series.tag_value,
            "window": series.window,
            "periods": series.entries,
            "total": series.total(),
            "currency": series.currency(),
        }));
    }
    serde_json::to_string_pretty(&entries)
}

pub fn summary_csv(records: &[ResourceRecord], cost: &CostSnapshot) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for r in records {
        let _ = writeln!(
            out,
            "{},{},{}",
            csv_field(&r.region),
            csv_field(r.service.as_str()),
            r.resources.len()
        );
    }
    if let Some(series) = cost.series() {
        for e in &series.entries {
            let _ = writeln!(
                out,
                "cost,{},{}",
                csv_field(&format!("{}/{}", e.period_start, e.period_end)),
                csv_field(&format!("{:.2} {}", e.amount, e.currency))
            );
        }
    }
    out
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Fixed-section narrative report.
pub fn summary_text(report: &AuditReport, paths: &ReportPaths) -> String {
    let summary = report.summary();
    let mut out = String::new();

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "AWS RESOURCE AUDIT REPORT");
    let _ = writeln!(out, "Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "{}", RULE);

    section(&mut out, "EXECUTIVE SUMMARY");
    let _ = writeln!(out, "Regions audited:   {}", summary.region_count);
    let _ = writeln!(out, "Services audited:  {}", summary.service_count);
    let _ = writeln!(out, "Total resources:   {}", summary.total_resources);

    section(&mut out, "RESOURCE BREAKDOWN");
    let _ = writeln!(out, "{:<18}{:<10}{}", "REGION", "SERVICE", "COUNT");
    if report.records.is_empty() {
        let _ = writeln!(out, "(no resources recorded)");
    }
    for r in &report.records {
        let _ = writeln!(out, "{:<18}{:<10}{}", r.region, r.service, r.resources.len());
    }

    if let Some(series) = report.cost.series() {
        section(&mut out, "COST ANALYSIS (last 30 days)");
        let _ = writeln!(out, "Tag filter: {}={}", series.tag_key, series.tag_value);
        let _ = writeln!(out, "Window:     {} to {}", series.window.start, series.window.end);
        for e in &series.entries {
            let _ = writeln!(
                out,
                "{} to {}: {:.2} {}",
                e.period_start, e.period_end, e.amount, e.currency
            );
        }
        let _ = writeln!(out, "Total: {:.2} {}", series.total(), series.currency());
    }

    section(&mut out, "NOTIFICATIONS");
    let _ = writeln!(out, "Slack: {}", report.channels.slack);
    let _ = writeln!(out, "Email: {}", report.channels.email);

    section(&mut out, "GENERATED FILES");
    for path in paths.files() {
        let _ = writeln!(out, "{}", path.display());
    }
    if !report.records.is_empty() {
        let _ = writeln!(
            out,
            "{} raw listing file(s), e.g. {}",
            report.records.len(),
            raw_file_name(report.records[0].service, &report.records[0].region)
        );
    }

    section(&mut out, "CONFIGURATION");
    let regions = if report.regions.is_empty() {
        "none".to_string()
    } else {
        report.regions.join(", ")
    };
    let _ = writeln!(out, "Regions:          {}", regions);
    let _ = writeln!(out, "Services:         {}", report.service_list());
    let _ = writeln!(out, "Report directory: {}", report.config.report_dir.display());
    let _ = writeln!(
        out,
        "Cost tag:         {}={}",
        report.config.cost_tag_key, report.config.cost_tag_value
    );
    let _ = writeln!(
        out,
        "Notifications:    {}",
        if report.config.notifications_enabled { "enabled" } else { "disabled" }
    );
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_with_env, MockEnvironment};
    use crate::types::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn cost() -> CostSnapshot {
        CostSnapshot::Available(CostSeries {
            window: CostWindow {
                start: NaiveDate::from_ymd_opt(2024, 4, 16).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 5, 16).unwrap(),
            },
            tag_key: "Project".to_string(),
            tag_value: "web".to_string(),
            entries: vec![
                CostEntry {
                    period_start: "2024-04-16".to_string(),
                    period_end: "2024-05-01".to_string(),
                    amount: 4.5,
                    currency: "USD".to_string(),
                },
                CostEntry {
                    period_start: "2024-05-01".to_string(),
                    period_end: "2024-05-16".to_string(),
                    amount: 0.0,
                    currency: "USD".to_string(),
                },
            ],
        })
    }

    fn records() -> Vec<ResourceRecord> {
        let at = Utc.with_ymd_and_hms(2024, 5, 16, 10, 0, 0).unwrap();
        vec![
            ResourceRecord::captured("us-east-1", ServiceKind::Ec2, vec!["i-1".into(), "i-2".into()], at),
            ResourceRecord::captured("us-east-1", ServiceKind::S3, vec![], at),
        ]
    }

    #[test]
    fn test_detailed_json_is_verbatim() {
        let json: Value = serde_json::from_str(&detailed_json(&records()).unwrap()).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["region"], "us-east-1");
        assert_eq!(arr[0]["service"], "ec2");
        assert_eq!(arr[0]["resources"][1], "i-2");
        assert_eq!(arr[0]["count"], 2);
        assert_eq!(arr[0]["timestamp"], "2024-05-16T10:00:00Z");
        assert_eq!(arr[1]["count"], 0);
    }

    #[test]
    fn test_summary_json_counts_and_cost_entry() {
        let json: Value = serde_json::from_str(&summary_json(&records(), &cost()).unwrap()).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0], json!({"region": "us-east-1", "service": "ec2", "count": 2}));
        assert_eq!(arr[2]["type"], "cost");
        assert_eq!(arr[2]["window"]["start"], "2024-04-16");
        assert_eq!(arr[2]["periods"].as_array().unwrap().len(), 2);
        assert_eq!(arr[2]["periods"][0]["amount"], 4.5);
    }

    #[test]
    fn test_summary_json_without_cost() {
        for unavailable in [
            CostUnavailable::Disabled,
            CostUnavailable::Unauthorized("denied".to_string()),
            CostUnavailable::Failed("timeout".to_string()),
        ] {
            let snapshot = CostSnapshot::Unavailable(unavailable);
            let json: Value = serde_json::from_str(&summary_json(&records(), &snapshot).unwrap()).unwrap();
            let arr = json.as_array().unwrap();
            assert_eq!(arr.len(), 2);
            assert!(arr.iter().all(|e| e.get("type").is_none()));
        }
    }

    #[test]
    fn test_summary_csv() {
        let csv = summary_csv(&records(), &cost());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "region,service,resource_count",
                "us-east-1,ec2,2",
                "us-east-1,s3,0",
                "cost,2024-04-16/2024-05-01,4.50 USD",
                "cost,2024-05-01/2024-05-16,0.00 USD",
            ]
        );

        let unavailable = CostSnapshot::Unavailable(CostUnavailable::Disabled);
        assert_eq!(summary_csv(&[], &unavailable), "region,service,resource_count\n");
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_summary_text_sections() {
        let config = load_config_with_env(&MockEnvironment::new());
        let at = Utc.with_ymd_and_hms(2024, 5, 16, 10, 0, 0).unwrap();
        let paths = ReportPaths::new(&config.report_dir, at);
        let mut report = AuditReport::new(config, at);
        report.set_scope(vec!["us-east-1".to_string()], vec![ServiceKind::Ec2, ServiceKind::S3]);
        report.add_records(records());
        report.set_cost(cost());

        let text = summary_text(&report, &paths);
        let order = [
            "AWS RESOURCE AUDIT REPORT",
            "EXECUTIVE SUMMARY",
            "RESOURCE BREAKDOWN",
            "COST ANALYSIS",
            "NOTIFICATIONS",
            "GENERATED FILES",
            "CONFIGURATION",
        ];
        let positions: Vec<usize> = order.iter().map(|s| text.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(text.contains("Regions audited:   1"));
        assert!(text.contains("Services audited:  2"));
        assert!(text.contains("Total resources:   2"));
        assert!(text.contains("Total: 4.50 USD"));
        assert!(text.contains("aws_audit_20240516_100000_summary.csv"));
        assert!(text.contains("Services:         ec2, s3"));
    }

    #[test]
    fn test_summary_text_omits_cost_when_unavailable() {
        let config = load_config_with_env(&MockEnvironment::new());
        let at = Utc::now();
        let paths = ReportPaths::new(&config.report_dir, at);
        let mut report = AuditReport::new(config, at);
        report.set_cost(CostSnapshot::Unavailable(CostUnavailable::Unauthorized("denied".into())));

        let text = summary_text(&report, &paths);
        assert!(!text.contains("COST ANALYSIS"));
        assert!(text.contains("Total resources:   0"));
        assert!(text.contains("(no resources recorded)"));
    }
}
