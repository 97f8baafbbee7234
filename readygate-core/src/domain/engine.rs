//! Engine adapter contract and result model

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::issue::{Issue, Severity};

/// Category family an engine reports into
///
/// Each run carries at most one engine per family, so families double as the
/// category identity on the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFamily {
    Quality,
    Security,
    Functionality,
    Performance,
}

impl EngineFamily {
    /// Stable display name used on reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Quality => "Code Quality",
            Self::Security => "Security",
            Self::Functionality => "Functionality",
            Self::Performance => "Performance",
        }
    }
}

impl std::fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Outcome status of one engine invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine ran to completion and its output was decoded
    Completed,
    /// Engine could not run or produced undecodable output
    Error,
    /// Engine exceeded its time budget and was killed
    Timeout,
    /// Engine decided it was not applicable to the given inputs
    Skipped,
    /// Run was cancelled while the engine was in flight
    Cancelled,
}

impl EngineStatus {
    /// A usable result contributes normally to the aggregate; error and
    /// timeout force the owning category score to zero.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// Result of exactly one engine invocation within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResult {
    /// Engine name (e.g. "eslint")
    pub engine: String,
    pub family: EngineFamily,
    pub status: EngineStatus,
    /// Ordered sequence of normalized findings
    pub issues: Vec<Issue>,
    /// Scalar metrics (e.g. "tests_passed", "response_time_avg")
    pub metrics: BTreeMap<String, f64>,
    /// Wall-clock duration of the invocation in milliseconds
    pub duration_ms: u64,
}

impl EngineResult {
    pub fn completed(engine: impl Into<String>, family: EngineFamily, issues: Vec<Issue>) -> Self {
        Self {
            engine: engine.into(),
            family,
            status: EngineStatus::Completed,
            issues,
            metrics: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    /// Result for an engine that declined to run against the given inputs
    pub fn skipped(engine: impl Into<String>, family: EngineFamily) -> Self {
        Self {
            engine: engine.into(),
            family,
            status: EngineStatus::Skipped,
            issues: Vec::new(),
            metrics: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    /// Result for an engine interrupted by run cancellation
    pub fn cancelled(engine: impl Into<String>, family: EngineFamily) -> Self {
        Self {
            engine: engine.into(),
            family,
            status: EngineStatus::Cancelled,
            issues: Vec::new(),
            metrics: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    /// Result for a failed or timed-out invocation.
    ///
    /// Carries a single synthetic high-severity issue describing the tooling
    /// failure so downstream consumers always see something explaining a
    /// missing category.
    pub fn tooling_failure(
        engine: impl Into<String>,
        family: EngineFamily,
        status: EngineStatus,
        detail: impl Into<String>,
    ) -> Self {
        let engine = engine.into();
        let issue = Issue::new(
            Severity::High,
            format!("Tooling failure: {}", detail.into()),
            format!("<{}>", engine),
        )
        .with_rule("tooling-failure");

        Self {
            engine,
            family,
            status,
            issues: vec![issue],
            metrics: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// Inputs for one engine invocation
///
/// The project tree is read-only for the run's duration; engines needing
/// scratch space must use an isolated temporary location.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub project_root: PathBuf,
    /// Explicit file/path subset; empty means the whole tree
    pub files: Vec<PathBuf>,
    /// Time budget for this invocation; the engine owns killing its
    /// subprocess when the budget is exceeded
    pub timeout: Duration,
    /// Raised when the run is cancelled; the engine must terminate its
    /// subprocess and return promptly
    pub cancel: CancellationToken,
}

impl EngineRequest {
    pub fn new(project_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            project_root: project_root.into(),
            files: Vec::new(),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Trait all analysis engines implement
///
/// This is the pluggability boundary: new analysis tools are added by
/// implementing this contract, never by modifying the orchestrator. An
/// adapter never raises past its own boundary; every invocation failure is
/// folded into the returned [`EngineResult`].
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Unique engine name used for registration and report ordering
    fn name(&self) -> &'static str;

    /// Category family this engine reports into
    fn family(&self) -> EngineFamily;

    /// Execute the engine against the given inputs
    async fn run(&self, request: &EngineRequest) -> EngineResult;
}

impl std::fmt::Debug for dyn EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("name", &self.name())
            .field("family", &self.family())
            .finish()
    }
}
