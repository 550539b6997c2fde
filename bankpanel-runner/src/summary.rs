//! Run summaries, printed by the CLI and saved next to the artifacts.

use bankpanel_core::data::{MacroMeta, PanelMeta};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::PipelineError;

/// An institution whose fetch failed and was left out of the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionFailure {
    pub name: String,
    pub zip: String,
    pub error: String,
}

/// A filing the normalizer refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedFiling {
    pub name: String,
    pub zip: String,
    pub id: Option<String>,
    pub error: String,
}

/// Outcome of one FDIC panel build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub institutions: usize,
    pub fetched: usize,
    pub failures: Vec<InstitutionFailure>,
    pub raw_records: usize,
    pub rejected: Vec<RejectedFiling>,
    pub out_of_scope_records: usize,
    pub panel_path: PathBuf,
    pub csv_path: Option<PathBuf>,
    pub panel: PanelMeta,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Save as `<panel>.run.json`.
    pub fn write_manifest(&self) -> Result<PathBuf, PipelineError> {
        write_json(&self.panel_path, self)
    }
}

/// Outcome of one macro table build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroSummary {
    pub series: usize,
    pub observations: usize,
    pub missing_values: usize,
    pub table_path: PathBuf,
    pub table: MacroMeta,
    pub elapsed_ms: u64,
}

impl MacroSummary {
    pub fn write_manifest(&self) -> Result<PathBuf, PipelineError> {
        write_json(&self.table_path, self)
    }
}

fn write_json<T: Serialize>(artifact: &Path, value: &T) -> Result<PathBuf, PipelineError> {
    let path = artifact.with_extension("run.json");
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::Manifest(format!("serialize: {e}")))?;
    std::fs::write(&path, json)
        .map_err(|e| PipelineError::Manifest(format!("write {}: {e}", path.display())))?;
    Ok(path)
}
