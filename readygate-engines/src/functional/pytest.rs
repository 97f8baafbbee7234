//! PyTest adapter for Python test suites
//!
//! Relies on the `pytest-json-report` plugin: the run writes its machine
//! readable report to a temp file, which sidesteps pytest's noisy stdout.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for PyTest invocation
#[derive(Debug, Clone)]
pub struct PytestConfig {
    pub executable: String,
    pub extra_args: Vec<String>,
    /// Test path used when the request carries no file subset
    pub default_path: String,
    /// Collect coverage alongside the run (requires `pytest-cov`)
    pub coverage: bool,
}

impl Default for PytestConfig {
    fn default() -> Self {
        Self {
            executable: "pytest".to_string(),
            extra_args: vec![],
            default_path: "tests".to_string(),
            coverage: true,
        }
    }
}

/// PyTest engine adapter
pub struct PytestAdapter {
    config: PytestConfig,
}

impl PytestAdapter {
    pub fn new() -> Self {
        Self {
            config: PytestConfig::default(),
        }
    }

    pub fn with_config(config: PytestConfig) -> Self {
        Self { config }
    }
}

impl Default for PytestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// `pytest-json-report` output
#[derive(Debug, Deserialize)]
struct PytestReport {
    #[serde(default)]
    summary: Summary,
    #[serde(default)]
    tests: Vec<TestEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    passed: u32,
    #[serde(default)]
    failed: u32,
    #[serde(default)]
    error: u32,
}

#[derive(Debug, Deserialize)]
struct TestEntry {
    /// e.g. `tests/test_cart.py::test_discount`
    nodeid: String,
    outcome: String,
    #[serde(default)]
    call: Option<CallPhase>,
}

#[derive(Debug, Deserialize)]
struct CallPhase {
    #[serde(default)]
    longrepr: Option<String>,
}

struct ParsedRun {
    issues: Vec<Issue>,
    passed: u32,
    failed: u32,
}

/// `pytest-cov` JSON report, reduced to its totals block
#[derive(Debug, Deserialize)]
struct CoverageReport {
    totals: CoverageTotals,
}

#[derive(Debug, Deserialize)]
struct CoverageTotals {
    percent_covered: f64,
}

fn parse_coverage(contents: &str) -> Option<f64> {
    serde_json::from_str::<CoverageReport>(contents)
        .ok()
        .map(|r| r.totals.percent_covered)
}

fn parse_report(contents: &str) -> Result<ParsedRun, serde_json::Error> {
    let report: PytestReport = serde_json::from_str(contents)?;

    let mut issues = Vec::new();
    for test in &report.tests {
        if test.outcome != "failed" && test.outcome != "error" {
            continue;
        }
        let file = test
            .nodeid
            .split("::")
            .next()
            .unwrap_or(&test.nodeid)
            .to_string();
        let detail = test
            .call
            .as_ref()
            .and_then(|c| c.longrepr.as_ref())
            .and_then(|r| r.lines().last())
            .map(str::trim);
        let message = match detail {
            Some(detail) if !detail.is_empty() => {
                format!("Test failed: {} ({})", test.nodeid, detail)
            }
            _ => format!("Test failed: {}", test.nodeid),
        };
        issues.push(Issue::new(Severity::High, message, file));
    }

    Ok(ParsedRun {
        issues,
        passed: report.summary.passed,
        failed: report.summary.failed + report.summary.error,
    })
}

#[async_trait]
impl EngineAdapter for PytestAdapter {
    fn name(&self) -> &'static str {
        "pytest"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Functionality
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let report_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("cannot create report directory: {}", e),
                );
            }
        };
        let report_path = report_dir.path().join("report.json");
        let coverage_path = report_dir.path().join("coverage.json");

        let mut command = ToolCommand::new(&self.config.executable)
            .arg("--json-report")
            .arg(format!("--json-report-file={}", report_path.display()))
            .arg("-q")
            .args(self.config.extra_args.clone())
            .current_dir(&request.project_root);
        if self.config.coverage {
            command = command
                .arg("--cov")
                .arg(format!("--cov-report=json:{}", coverage_path.display()));
        }

        if request.files.is_empty() {
            command = command.arg(&self.config.default_path);
        } else {
            for file in &request.files {
                command = command.arg_path(file);
            }
        }

        match command.run(request.timeout, &request.cancel).await {
            Ok(output) => {
                let contents = match tokio::fs::read_to_string(&report_path).await {
                    Ok(contents) => contents,
                    Err(e) => {
                        return EngineResult::tooling_failure(
                            self.name(),
                            self.family(),
                            EngineStatus::Error,
                            format!("missing pytest report: {}", e),
                        )
                        .with_duration(started.elapsed());
                    }
                };
                match parse_report(&contents) {
                    Ok(run) => {
                        debug!(
                            passed = run.passed,
                            failed = run.failed,
                            "PyTest finished"
                        );
                        let coverage = tokio::fs::read_to_string(&coverage_path)
                            .await
                            .ok()
                            .and_then(|c| parse_coverage(&c));
                        let mut result =
                            EngineResult::completed(self.name(), self.family(), run.issues)
                                .with_metric("tests_passed", run.passed as f64)
                                .with_metric("tests_failed", run.failed as f64)
                                .with_duration(output.duration);
                        if let Some(coverage) = coverage {
                            result = result.with_metric("coverage", coverage);
                        }
                        result
                    }
                    Err(e) => EngineResult::tooling_failure(
                        self.name(),
                        self.family(),
                        EngineStatus::Error,
                        format!("undecodable pytest report: {}", e),
                    )
                    .with_duration(started.elapsed()),
                }
            }
            Err(e) => e
                .into_result(self.name(), self.family())
                .with_duration(started.elapsed()),
        }
    }
}
