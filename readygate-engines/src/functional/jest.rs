//! Jest adapter for JavaScript test suites

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for Jest invocation
#[derive(Debug, Clone)]
pub struct JestConfig {
    /// Launcher executable; Jest normally runs through npx
    pub executable: String,
    pub extra_args: Vec<String>,
    /// Collect coverage alongside the run
    pub coverage: bool,
}

impl Default for JestConfig {
    fn default() -> Self {
        Self {
            executable: "npx".to_string(),
            extra_args: vec![],
            coverage: true,
        }
    }
}

/// Jest engine adapter
pub struct JestAdapter {
    config: JestConfig,
}

impl JestAdapter {
    pub fn new() -> Self {
        Self {
            config: JestConfig::default(),
        }
    }

    pub fn with_config(config: JestConfig) -> Self {
        Self { config }
    }
}

impl Default for JestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level Jest `--json` run report
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestReport {
    #[serde(default)]
    num_passed_tests: u32,
    #[serde(default)]
    num_failed_tests: u32,
    #[serde(default)]
    test_results: Vec<SuiteResult>,
    #[serde(default)]
    coverage_map: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiteResult {
    /// Absolute path of the test file
    #[serde(default)]
    name: String,
    #[serde(default)]
    assertion_results: Vec<AssertionResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssertionResult {
    status: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    failure_messages: Vec<String>,
}

struct ParsedRun {
    issues: Vec<Issue>,
    passed: u32,
    failed: u32,
    coverage: Option<f64>,
}

/// Statement coverage percentage from Jest's coverage map.
///
/// The map is file path to `{ s: { "<id>": <hit count>, ... }, ... }`.
fn statement_coverage(map: &serde_json::Value) -> Option<f64> {
    let files = map.as_object()?;
    let mut total = 0u64;
    let mut covered = 0u64;
    for entry in files.values() {
        let hits = entry.get("s")?.as_object()?;
        for count in hits.values() {
            total += 1;
            if count.as_u64().unwrap_or(0) > 0 {
                covered += 1;
            }
        }
    }
    if total == 0 {
        return None;
    }
    Some(covered as f64 / total as f64 * 100.0)
}

fn parse_report(stdout: &str) -> Result<ParsedRun, serde_json::Error> {
    let report: JestReport = serde_json::from_str(stdout)?;

    let mut issues = Vec::new();
    for suite in &report.test_results {
        for assertion in &suite.assertion_results {
            if assertion.status != "failed" {
                continue;
            }
            let detail = assertion
                .failure_messages
                .first()
                .map(|m| m.lines().next().unwrap_or(m).to_string());
            let message = match detail {
                Some(detail) => format!("Test failed: {} ({})", assertion.full_name, detail),
                None => format!("Test failed: {}", assertion.full_name),
            };
            issues.push(Issue::new(Severity::High, message, suite.name.clone()));
        }
    }

    let coverage = report.coverage_map.as_ref().and_then(statement_coverage);

    Ok(ParsedRun {
        issues,
        passed: report.num_passed_tests,
        failed: report.num_failed_tests,
        coverage,
    })
}

#[async_trait]
impl EngineAdapter for JestAdapter {
    fn name(&self) -> &'static str {
        "jest"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Functionality
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let mut command = ToolCommand::new(&self.config.executable)
            .arg("jest")
            .arg("--json")
            .arg("--silent")
            .args(self.config.extra_args.clone())
            .current_dir(&request.project_root);
        if self.config.coverage {
            command = command.arg("--coverage");
        }
        for file in &request.files {
            command = command.arg_path(file);
        }

        match command.run(request.timeout, &request.cancel).await {
            Ok(output) => match parse_report(&output.stdout) {
                Ok(run) => {
                    debug!(
                        passed = run.passed,
                        failed = run.failed,
                        "Jest finished"
                    );
                    let mut result =
                        EngineResult::completed(self.name(), self.family(), run.issues)
                            .with_metric("tests_passed", run.passed as f64)
                            .with_metric("tests_failed", run.failed as f64)
                            .with_duration(output.duration);
                    if let Some(coverage) = run.coverage {
                        result = result.with_metric("coverage", coverage);
                    }
                    result
                }
                Err(e) => EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("undecodable Jest output: {}", e),
                )
                .with_duration(started.elapsed()),
            },
            Err(e) => e
                .into_result(self.name(), self.family())
                .with_duration(started.elapsed()),
        }
    }
}
