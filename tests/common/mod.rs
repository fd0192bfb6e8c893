//! Common test utilities for scanmerge integration tests
//!
//! `ReportTree` builds a disposable solution: source files under a
//! `solution/` root, per-module report directories holding binary record
//! streams and JSON issue reports, and coverage reports, all inside one
//! TempDir.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;

use scanmerge::binary::wire;
use scanmerge::config::{ModuleConfig, RunConfig};
use scanmerge::index::InMemoryFileIndex;

pub struct ReportTree {
    dir: TempDir,
}

impl ReportTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("solution")).expect("Failed to create solution dir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Root the file index is built from.
    pub fn solution_root(&self) -> PathBuf {
        self.dir.path().join("solution")
    }

    /// Write a source file under the solution root; returns the canonical
    /// path reports should use to refer to it.
    pub fn add_source(&self, relative: &str, content: &str) -> String {
        self.add_source_bytes(relative, content.as_bytes())
    }

    /// Byte-level variant for BOM and encoding scenarios.
    pub fn add_source_bytes(&self, relative: &str, content: &[u8]) -> String {
        let path = self.solution_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write source");
        path.canonicalize()
            .expect("Failed to canonicalize source path")
            .to_string_lossy()
            .into_owned()
    }

    /// Report directory for one module, created on first use.
    pub fn report_dir(&self, module: &str) -> PathBuf {
        let dir = self.dir.path().join("reports").join(module);
        fs::create_dir_all(&dir).expect("Failed to create report dir");
        dir
    }

    /// Write one binary record stream into a module's report directory.
    pub fn write_stream<T: Serialize>(&self, module: &str, stream: &str, records: &[T]) {
        let mut buf = Vec::new();
        for record in records {
            wire::append_record(&mut buf, record).expect("Failed to encode record");
        }
        fs::write(self.report_dir(module).join(stream), buf).expect("Failed to write stream");
    }

    /// Write a JSON issue report into a module's report directory.
    pub fn write_issue_report(&self, module: &str, name: &str, json: &str) -> PathBuf {
        let path = self.report_dir(module).join(name);
        fs::write(&path, json).expect("Failed to write issue report");
        path
    }

    /// Write a coverage report under `coverage/`.
    pub fn write_coverage_report(&self, name: &str, text: &str) -> PathBuf {
        let dir = self.dir.path().join("coverage");
        fs::create_dir_all(&dir).expect("Failed to create coverage dir");
        let path = dir.join(name);
        fs::write(&path, text).expect("Failed to write coverage report");
        path
    }

    /// Wildcard pattern over the coverage directory.
    pub fn coverage_pattern(&self, glob: &str) -> String {
        format!("{}/coverage/{}", self.dir.path().display(), glob)
    }

    /// Index the solution root the way the CLI driver does.
    pub fn index(&self) -> InMemoryFileIndex {
        InMemoryFileIndex::from_root(&self.solution_root())
    }

    /// A run configuration over this tree with the given modules and
    /// everything else defaulted.
    pub fn config(&self, modules: Vec<ModuleConfig>) -> RunConfig {
        RunConfig {
            solution_root: Some(self.solution_root()),
            modules,
            active_rules: Vec::new(),
            rule_categories: BTreeMap::new(),
            coverage_reports: Vec::new(),
            import_external_issues: true,
            pull_request: false,
            cache_enabled: true,
            cache_base_dir: None,
        }
    }

    /// Module whose report directory is this tree's directory for `id`.
    pub fn module_config(&self, id: &str, issue_reports: Vec<PathBuf>) -> ModuleConfig {
        ModuleConfig {
            id: id.to_string(),
            report_dirs: vec![self.report_dir(id)],
            issue_reports,
        }
    }
}

impl Default for ReportTree {
    fn default() -> Self {
        Self::new()
    }
}
