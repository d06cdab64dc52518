use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analyzer::ScanResult;
use crate::model::CallSite;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallSiteRecord {
    pub method: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub snippet: String,
    pub has_side_effects: bool,
    pub is_global_receiver: bool,
}

impl From<&CallSite> for CallSiteRecord {
    fn from(site: &CallSite) -> Self {
        Self {
            method: site.method.clone(),
            start_line: site.start_line,
            start_column: site.start_column,
            end_line: site.end_line,
            end_column: site.end_column,
            snippet: site.snippet.clone(),
            has_side_effects: site.has_side_effects,
            is_global_receiver: site.is_global_receiver,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MethodStats {
    pub count: usize,
    pub files: BTreeSet<String>,
}

/// Aggregate of every call site found in a scan, grouped by method and by file.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_count: usize,
    pub file_count: usize,
    pub methods: BTreeMap<String, MethodStats>,
    pub files: BTreeMap<String, Vec<CallSiteRecord>>,
}

impl Report {
    pub fn from_scan(result: &ScanResult) -> Self {
        let mut report = Report::default();
        for file in &result.files {
            if file.sites.is_empty() {
                continue;
            }
            let key = file.path.display().to_string();
            for site in &file.sites {
                let stats = report.methods.entry(site.method.clone()).or_default();
                stats.count += 1;
                stats.files.insert(key.clone());
            }
            report.total_count += file.sites.len();
            report.files.insert(key, file.sites.iter().map(CallSiteRecord::from).collect());
        }
        report.file_count = report.files.len();
        report
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        fs::write(path, raw).with_context(|| format!("failed writing report {}", path.display()))
    }
}
