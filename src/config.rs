//! Run configuration.
//!
//! One JSON file describes everything a reconciliation run consumes: the
//! analyzed solution root, the modules with their report locations, the
//! active-rule set, coverage report patterns, and the toggles the host
//! build sets per run. Field names are camelCase on the wire because the
//! host toolchain writes this file. CLI flags override individual toggles
//! after loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::coverage::CoverageDialect;
use crate::error::{Result, ScanMergeError};
use crate::issues::{ActiveRule, RuleType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Root the file index is built from and cache keys are relative to.
    /// Optional because the coverage-only command has no use for it.
    #[serde(default)]
    pub solution_root: Option<PathBuf>,
    pub modules: Vec<ModuleConfig>,
    #[serde(default)]
    pub active_rules: Vec<ActiveRule>,
    /// External-issue category to rule-type table, case-insensitive keys.
    #[serde(default)]
    pub rule_categories: BTreeMap<String, RuleType>,
    #[serde(default)]
    pub coverage_reports: Vec<CoverageReportConfig>,
    #[serde(default = "default_true")]
    pub import_external_issues: bool,
    #[serde(default)]
    pub pull_request: bool,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Overrides `solution_root` as the cache-key base when set.
    #[serde(default)]
    pub cache_base_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub id: String,
    /// Directories holding the binary record streams this module produced.
    #[serde(default)]
    pub report_dirs: Vec<PathBuf>,
    /// JSON issue report files this module produced.
    #[serde(default)]
    pub issue_reports: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReportConfig {
    /// Wildcard pattern, expanded with `glob`.
    pub pattern: String,
    pub dialect: CoverageDialect,
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScanMergeError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = fs::read_to_string(path).map_err(|e| ScanMergeError::io(path, e))?;
        let config: RunConfig =
            serde_json::from_str(&text).map_err(|e| ScanMergeError::InvalidConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if config.modules.is_empty() {
            return Err(ScanMergeError::InvalidConfig {
                path: path.to_path_buf(),
                message: "at least one module must be configured".to_string(),
            });
        }
        Ok(config)
    }

    /// Base directory for cache keys: the explicit override when present,
    /// the solution root otherwise.
    pub fn cache_base(&self) -> Option<&Path> {
        self.cache_base_dir
            .as_deref()
            .or(self.solution_root.as_deref())
    }
}
