use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use super::render;
use super::AuditReport;
use crate::error::ReportError;

/// File names for one run; all four share a prefix fixed at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub prefix: String,
    pub detailed_json: PathBuf,
    pub summary_json: PathBuf,
    pub summary_csv: PathBuf,
    pub summary_text: PathBuf,
}

impl ReportPaths {
    pub fn new(dir: &Path, started_at: DateTime<Utc>) -> Self {
        let prefix = report_prefix(started_at);
        Self {
            dir: dir.to_path_buf(),
            detailed_json: dir.join(format!("{}_detailed.json", prefix)),
            summary_json: dir.join(format!("{}_summary.json", prefix)),
            summary_csv: dir.join(format!("{}_summary.csv", prefix)),
            summary_text: dir.join(format!("{}_summary.txt", prefix)),
            prefix,
        }
    }

    pub fn files(&self) -> [&Path; 4] {
        [
            &self.detailed_json,
            &self.summary_json,
            &self.summary_csv,
            &self.summary_text,
        ]
    }
}

pub fn report_prefix(started_at: DateTime<Utc>) -> String {
    format!("aws_audit_{}", started_at.format("%Y%m%d_%H%M%S"))
}

pub fn ensure_report_dir(dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Render and write all four artifacts. Returns the narrative text for reuse in email.
pub fn write_reports(report: &AuditReport, paths: &ReportPaths) -> Result<String, ReportError> {
    ensure_report_dir(&paths.dir)?;

    let detailed = render::detailed_json(&report.records)?;
    let summary = render::summary_json(&report.records, &report.cost)?;
    let csv = render::summary_csv(&report.records, &report.cost);
    let text = render::summary_text(report, paths);

    write_atomic(&paths.detailed_json, &detailed)?;
    write_atomic(&paths.summary_json, &summary)?;
    write_atomic(&paths.summary_csv, &csv)?;
    write_atomic(&paths.summary_text, &text)?;

    info!(status = "success", "Reports written to {} ({}_*)", paths.dir.display(), paths.prefix);
    Ok(text)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ReportError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|source| ReportError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}
