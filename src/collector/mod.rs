use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::aws::CloudProvider;
use crate::error::CollectError;
use crate::parsing::parse_identifier_list;
use crate::types::{ResourceRecord, ServiceKind};

/// Runs one listing per (region, service) pair and keeps a raw copy of each response.
pub struct ResourceCollector<'a, P: CloudProvider> {
    provider: &'a P,
    raw_dir: &'a Path,
}

/// A record plus the error that forced it empty, if any.
#[derive(Debug)]
pub struct Collection {
    pub record: ResourceRecord,
    pub error: Option<CollectError>,
}

impl<'a, P: CloudProvider> ResourceCollector<'a, P> {
    pub fn new(provider: &'a P, raw_dir: &'a Path) -> Self {
        Self { provider, raw_dir }
    }

    /// Collect one pair, degrading any failure to an empty record.
    pub async fn collect(&self, region: &str, service: ServiceKind) -> ResourceRecord {
        let collection = degrade_to_empty(region, service, self.try_collect(region, service).await);
        match &collection.error {
            Some(err) => warn!("{}; recording 0 resources", err),
            None => debug!(
                "{} {}: {} found",
                region,
                service.description(),
                collection.record.count
            ),
        }
        collection.record
    }

    /// Collect every region (outer) and service (inner) in order.
    ///
    /// Always returns `regions.len() * services.len()` records.
    pub async fn collect_all(&self, regions: &[String], services: &[ServiceKind]) -> Vec<ResourceRecord> {
        let mut records = Vec::with_capacity(regions.len() * services.len());
        for region in regions {
            info!("Auditing region: {}", region);
            for service in services {
                records.push(self.collect(region, *service).await);
            }
        }
        records
    }

    pub async fn try_collect(
        &self,
        region: &str,
        service: ServiceKind,
    ) -> Result<ResourceRecord, CollectError> {
        let stdout = match self.provider.list_resources_raw(service, region).await {
            Ok(out) => {
                self.persist_raw(service, region, &out);
                out
            }
            Err(source) => {
                self.persist_raw(service, region, &source.raw_output());
                return Err(CollectError::Provider {
                    region: region.to_string(),
                    service: service.to_string(),
                    source,
                });
            }
        };

        let resources = parse_identifier_list(&stdout).map_err(|source| CollectError::Malformed {
            region: region.to_string(),
            service: service.to_string(),
            source,
        })?;
        Ok(ResourceRecord::new(region, service, resources))
    }

    pub fn raw_path(&self, service: ServiceKind, region: &str) -> PathBuf {
        self.raw_dir.join(raw_file_name(service, region))
    }

    fn persist_raw(&self, service: ServiceKind, region: &str, raw: &str) {
        let path = self.raw_path(service, region);
        if let Err(e) = std::fs::write(&path, raw) {
            warn!("could not save raw output to {}: {}", path.display(), e);
        }
    }
}

/// The one failure-isolation rule: a failed pair becomes an explicit zero-resource record.
pub fn degrade_to_empty(
    region: &str,
    service: ServiceKind,
    result: Result<ResourceRecord, CollectError>,
) -> Collection {
    match result {
        Ok(record) => Collection { record, error: None },
        Err(err) => Collection {
            record: ResourceRecord::empty(region, service),
            error: Some(err),
        },
    }
}

pub fn raw_file_name(service: ServiceKind, region: &str) -> String {
    format!("{}_{}_raw.table", service, region)
}
