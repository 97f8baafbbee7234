//! Test run model and state machine

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::engine::{EngineFamily, EngineStatus};
use super::issue::{Issue, Severity};

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run accepted, engines not yet dispatched
    Pending,
    /// Engines dispatched
    Running,
    /// All categories completed and the readiness verdict holds
    Passed,
    /// All engines completed but thresholds or the critical-issue rule failed
    Failed,
    /// One or more engines never produced a usable result
    Error,
    /// Run was explicitly cancelled before completion
    Cancelled,
}

impl RunStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Pending ──► Running ──► Passed | Failed | Error
    ///   │           │
    ///   └──────────►└──► Cancelled
    /// ```
    pub fn valid_transitions(&self) -> &[RunStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Passed, Self::Failed, Self::Error, Self::Cancelled],
            Self::Passed | Self::Failed | Self::Error | Self::Cancelled => &[],
        }
    }

    /// Check whether transitioning to `target` is allowed from the current state.
    pub fn can_transition_to(&self, target: &RunStatus) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Failed | Self::Error | Self::Cancelled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid run transition from {from} to {to}")]
pub struct RunTransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Normalized, scored output of one engine within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Display name of the owning family (e.g. "Security")
    pub name: String,
    pub family: EngineFamily,
    /// Engine that produced this category (categories sort by this name)
    pub engine: String,
    /// Score in [0, 100]; floored to 0 when the engine errored or timed out
    pub score: f64,
    /// Mirrors the owning engine result's status
    pub status: EngineStatus,
    pub issues: Vec<Issue>,
}

/// Issue counts per severity across all categories of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeveritySummary {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// The single canonical record of one orchestration execution.
///
/// Single-writer: only the orchestrator mutates a `TestRun`; engines report
/// results exclusively through their own return values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub run_id: Uuid,
    pub project_id: String,
    pub status: RunStatus,
    /// Weighted average of category scores, in [0, 100]
    pub overall_score: f64,
    pub production_ready: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered by engine name for deterministic reporting, independent of
    /// completion order
    pub categories: Vec<Category>,
    pub summary: SeveritySummary,
}

impl TestRun {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project_id: project_id.into(),
            status: RunStatus::Pending,
            overall_score: 0.0,
            production_ready: false,
            created_at: Utc::now(),
            completed_at: None,
            categories: Vec::new(),
            summary: SeveritySummary::default(),
        }
    }

    /// Validated status transition; terminal states reject all transitions.
    pub fn transition(&mut self, to: RunStatus) -> Result<(), RunTransitionError> {
        if !self.status.can_transition_to(&to) {
            return Err(RunTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Caller-supplied configuration for one orchestration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfiguration {
    /// Explicit engine list; takes precedence over type-based defaults
    pub engines: Option<Vec<String>>,
    /// Explicit file/path subsets per category family
    pub file_subsets: HashMap<EngineFamily, Vec<PathBuf>>,
    /// Per-engine timeout overrides in seconds, keyed by engine name
    pub timeout_overrides: HashMap<String, u64>,
    /// Category weight overrides; families absent here carry weight 1.0
    /// relative to the overrides
    pub weights: HashMap<EngineFamily, f64>,
    /// Overrides the configured production-readiness threshold for this run
    pub readiness_threshold: Option<f64>,
    /// Performance test plan (e.g. a JMeter .jmx file); selecting the
    /// performance engine requires one
    pub performance_test_plan: Option<PathBuf>,
}
