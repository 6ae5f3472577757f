use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::notify::ChannelStates;
use crate::types::*;

pub mod render;
pub mod writer;

pub use writer::{report_prefix, write_reports, ReportPaths};

/// Everything one audit run found, ready to be serialized.
pub struct AuditReport {
    pub config: Config,
    pub generated_at: DateTime<Utc>,
    pub regions: Vec<String>,
    pub services: Vec<ServiceKind>,
    pub records: Vec<ResourceRecord>,
    pub cost: CostSnapshot,
    pub channels: ChannelStates,
}

impl AuditReport {
    pub fn new(config: Config, generated_at: DateTime<Utc>) -> Self {
        Self {
            config,
            generated_at,
            regions: Vec::new(),
            services: Vec::new(),
            records: Vec::new(),
            cost: CostSnapshot::Unavailable(CostUnavailable::Disabled),
            channels: ChannelStates::default(),
        }
    }

    pub fn set_scope(&mut self, regions: Vec<String>, services: Vec<ServiceKind>) {
        self.regions = regions;
        self.services = services;
    }

    pub fn add_records(&mut self, records: Vec<ResourceRecord>) {
        self.records.extend(records);
    }

    pub fn set_cost(&mut self, cost: CostSnapshot) {
        self.cost = cost;
    }

    pub fn set_channels(&mut self, channels: ChannelStates) {
        self.channels = channels;
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary::from_records(&self.records)
    }

    /// One-line description used by chat and email notifications.
    pub fn headline(&self) -> String {
        let summary = self.summary();
        let mut text = format!(
            "Found {} resource(s) across {} region(s) and {} service(s): {}.",
            summary.total_resources,
            summary.region_count,
            summary.service_count,
            self.service_list()
        );
        if let Some(series) = self.cost.series() {
            text.push_str(&format!(
                " 30-day cost for {}={}: {:.2} {}.",
                series.tag_key,
                series.tag_value,
                series.total(),
                series.currency()
            ));
        }
        text
    }

    pub fn service_list(&self) -> String {
        if self.services.is_empty() {
            return "none".to_string();
        }
        self.services
            .iter()
            .map(ServiceKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub region_count: usize,
    pub service_count: usize,
    pub record_count: usize,
    pub total_resources: usize,
}

impl ReportSummary {
    pub fn from_records(records: &[ResourceRecord]) -> Self {
        let regions: BTreeSet<&str> = records.iter().map(|r| r.region.as_str()).collect();
        let services: BTreeSet<&str> = records.iter().map(|r| r.service.as_str()).collect();
        Self {
            region_count: regions.len(),
            service_count: services.len(),
            record_count: records.len(),
            total_resources: records.iter().map(|r| r.resources.len()).sum(),
        }
    }

    pub fn has_resources(&self) -> bool {
        self.total_resources > 0
    }
}
