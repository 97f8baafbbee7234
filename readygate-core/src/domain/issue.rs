//! Canonical issue model

use serde::{Deserialize, Serialize};

/// Issue severity (closed enumeration)
///
/// Every tool-specific severity vocabulary maps onto this set; adapters
/// translate unrecognized native severities to [`Severity::Medium`] rather
/// than dropping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Score penalty subtracted from a category's base score per issue
    pub fn penalty(&self) -> u32 {
        match self {
            Self::Critical => 10,
            Self::High => 5,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A single normalized finding from an analysis engine
///
/// Immutable value object; all engines produce issues in this shape so the
/// scorer stays tool-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    /// Human-readable description of the finding
    pub message: String,
    /// File path the finding refers to, relative to the project root where
    /// the underlying tool reports it that way
    pub file: String,
    /// Starting line number (1-indexed)
    pub line: Option<u32>,
    /// Starting column number (1-indexed)
    pub column: Option<u32>,
    /// Rule identifier that triggered this finding (if the tool has one)
    pub rule: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: file.into(),
            line: None,
            column: None,
            rule: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}
