//! Active-rule resolution and external-finding classification.
//!
//! The active rule set tells the engine which repository owns each bare rule
//! id. Anything it does not resolve is an "external" finding from a
//! third-party analyzer shipping inside the build, classified from the
//! report's own category and level data. The one exception is the internal
//! numeric id convention: those ids are never surfaced as external, so a
//! rule momentarily missing from the active set drops instead of leaking
//! out under a foreign badge.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanMergeError};

/// Ids following the internal `S` + 3-to-5-digits convention.
static INTERNAL_ID_CONVENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S[0-9]{3,5}$").expect("internal id pattern is valid"));

/// One entry of the active rule set: a repository key plus the bare rule id
/// it claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRule {
    pub repository: String,
    pub rule_id: String,
}

/// Classification attached to external findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Bug,
    Vulnerability,
    CodeSmell,
    SecurityHotspot,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Vulnerability => "vulnerability",
            Self::CodeSmell => "code_smell",
            Self::SecurityHotspot => "security_hotspot",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity ladder for published issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocker => "blocker",
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a report level to a published severity. Reports speak compiler
/// (`error`/`warning`/`info`); anything unrecognized is informational.
pub fn severity_from_level(level: &str) -> Severity {
    match level.to_ascii_lowercase().as_str() {
        "error" => Severity::Critical,
        "warning" => Severity::Major,
        _ => Severity::Info,
    }
}

/// How a reported rule id maps onto the active rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Owned by an active internal repository.
    Internal { repository: &'a str },
    /// Matches the internal id convention but is absent from the active
    /// set; the issue must drop, never go external.
    InactiveInternal,
    /// A third-party analyzer's rule.
    External,
}

/// Immutable per-run rule lookup, built once from the active rule set.
#[derive(Debug)]
pub struct RuleTable {
    repository_by_rule: AHashMap<String, String>,
    /// Category label (case-folded) to issue type, for external findings.
    type_by_category: AHashMap<String, RuleType>,
}

impl RuleTable {
    /// Build the table, refusing ambiguous attribution up front: the same
    /// bare rule id claimed by two repositories is a configuration
    /// contradiction, not something to resolve by picking one.
    pub fn build(
        active_rules: &[ActiveRule],
        categories: &BTreeMap<String, RuleType>,
    ) -> Result<Self> {
        let mut repository_by_rule: AHashMap<String, String> =
            AHashMap::with_capacity(active_rules.len());
        for rule in active_rules {
            match repository_by_rule.get(&rule.rule_id) {
                Some(first) if *first != rule.repository => {
                    return Err(ScanMergeError::RuleIdCollision {
                        rule: rule.rule_id.clone(),
                        first: first.clone(),
                        second: rule.repository.clone(),
                    });
                }
                Some(_) => {} // same repository listed twice
                None => {
                    repository_by_rule.insert(rule.rule_id.clone(), rule.repository.clone());
                }
            }
        }

        let type_by_category = categories
            .iter()
            .map(|(category, rule_type)| (category.to_ascii_lowercase(), *rule_type))
            .collect();

        Ok(Self {
            repository_by_rule,
            type_by_category,
        })
    }

    pub fn resolve(&self, rule_id: &str) -> Resolution<'_> {
        if let Some(repository) = self.repository_by_rule.get(rule_id) {
            return Resolution::Internal { repository };
        }
        if INTERNAL_ID_CONVENTION.is_match(rule_id) {
            return Resolution::InactiveInternal;
        }
        Resolution::External
    }

    /// Issue type for an external finding: the declared category wins when
    /// the table maps it; otherwise `error` means a bug and everything else
    /// a code smell.
    pub fn external_type(&self, category: Option<&str>, level: Option<&str>) -> RuleType {
        if let Some(mapped) = category.and_then(|c| self.type_by_category.get(&c.to_ascii_lowercase())) {
            return *mapped;
        }
        match level.map(str::to_ascii_lowercase).as_deref() {
            Some("error") => RuleType::Bug,
            _ => RuleType::CodeSmell,
        }
    }

    pub fn len(&self) -> usize {
        self.repository_by_rule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repository_by_rule.is_empty()
    }
}

/// Severity for an external finding; unlike internal rules there is no
/// profile to fall back to, so absent levels are informational.
pub fn external_severity(level: Option<&str>) -> Severity {
    level.map(severity_from_level).unwrap_or(Severity::Info)
}
