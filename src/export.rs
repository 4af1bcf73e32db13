//! JSON export of listings
//!
//! Records are written sorted by name so two exports of the same machine
//! state compare equal.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WslError};
use crate::types::{AvailableDistribution, Distribution, Snapshot};

/// Combined export written by the TUI and `wslm-cli export`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub installed_distributions: Vec<Distribution>,
    pub available_distributions: Vec<AvailableDistribution>,
    pub summary: ExportSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub installed_count: usize,
    pub available_count: usize,
}

impl ExportDocument {
    pub fn new(installed: &Snapshot<Distribution>, available: &Snapshot<AvailableDistribution>) -> Self {
        let installed_distributions = sorted_installed(installed);
        let available_distributions = sorted_available(available);
        Self {
            summary: ExportSummary {
                installed_count: installed_distributions.len(),
                available_count: available_distributions.len(),
            },
            installed_distributions,
            available_distributions,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| WslError::io(path, e))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| WslError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn sorted_installed(snapshot: &Snapshot<Distribution>) -> Vec<Distribution> {
    let mut entries = snapshot.entries.clone();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

fn sorted_available(snapshot: &Snapshot<AvailableDistribution>) -> Vec<AvailableDistribution> {
    let mut entries = snapshot.entries.clone();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Installed records as a JSON array, sorted by name
pub fn installed_to_json(snapshot: &Snapshot<Distribution>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&sorted_installed(snapshot))?)
}

/// Catalog records as a JSON array, sorted by name
pub fn available_to_json(snapshot: &Snapshot<AvailableDistribution>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&sorted_available(snapshot))?)
}

pub fn installed_from_json(json: &str) -> Result<Vec<Distribution>> {
    Ok(serde_json::from_str(json)?)
}
