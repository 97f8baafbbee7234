//! Pylint adapter for Python code quality

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for Pylint invocation
#[derive(Debug, Clone)]
pub struct PylintConfig {
    pub executable: String,
    pub extra_args: Vec<String>,
}

impl Default for PylintConfig {
    fn default() -> Self {
        Self {
            executable: "pylint".to_string(),
            extra_args: vec![],
        }
    }
}

/// Pylint engine adapter
pub struct PylintAdapter {
    config: PylintConfig,
}

impl PylintAdapter {
    pub fn new() -> Self {
        Self {
            config: PylintConfig::default(),
        }
    }

    pub fn with_config(config: PylintConfig) -> Self {
        Self { config }
    }
}

impl Default for PylintAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// One diagnostic from Pylint's JSON output format
#[derive(Debug, Deserialize)]
struct Diagnostic {
    /// Message category: fatal, error, warning, convention, refactor
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    message: String,
    /// Symbolic message name, e.g. `unused-import`
    #[serde(default)]
    symbol: Option<String>,
}

fn translate_severity(kind: &str) -> Severity {
    match kind {
        "fatal" | "error" => Severity::High,
        "warning" => Severity::Medium,
        "convention" | "refactor" => Severity::Low,
        _ => Severity::Medium,
    }
}

fn parse_report(stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let diagnostics: Vec<Diagnostic> = serde_json::from_str(stdout)?;
    let issues = diagnostics
        .into_iter()
        .map(|d| {
            let mut issue = Issue::new(translate_severity(&d.kind), d.message, d.path);
            if let Some(line) = d.line {
                issue = issue.with_line(line);
            }
            if let Some(column) = d.column {
                issue = issue.with_column(column);
            }
            if let Some(symbol) = d.symbol {
                issue = issue.with_rule(symbol);
            }
            issue
        })
        .collect();
    Ok(issues)
}

#[async_trait]
impl EngineAdapter for PylintAdapter {
    fn name(&self) -> &'static str {
        "pylint"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Quality
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let mut command = ToolCommand::new(&self.config.executable)
            .arg("--output-format=json")
            .args(self.config.extra_args.clone())
            .current_dir(&request.project_root);

        if request.files.is_empty() {
            command = command.arg(".");
        } else {
            for file in &request.files {
                command = command.arg_path(file);
            }
        }

        match command.run(request.timeout, &request.cancel).await {
            Ok(output) => match parse_report(&output.stdout) {
                Ok(issues) => {
                    debug!(issue_count = issues.len(), "Pylint finished");
                    let count = issues.len() as f64;
                    EngineResult::completed(self.name(), self.family(), issues)
                        .with_metric("issues_count", count)
                        .with_duration(output.duration)
                }
                Err(e) => EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("undecodable Pylint output: {}", e),
                )
                .with_duration(started.elapsed()),
            },
            Err(e) => e
                .into_result(self.name(), self.family())
                .with_duration(started.elapsed()),
        }
    }
}
