//! Bandit adapter for Python security analysis

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for Bandit invocation
#[derive(Debug, Clone)]
pub struct BanditConfig {
    pub executable: String,
    pub extra_args: Vec<String>,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            executable: "bandit".to_string(),
            extra_args: vec![],
        }
    }
}

/// Bandit engine adapter
pub struct BanditAdapter {
    config: BanditConfig,
}

impl BanditAdapter {
    pub fn new() -> Self {
        Self {
            config: BanditConfig::default(),
        }
    }

    pub fn with_config(config: BanditConfig) -> Self {
        Self { config }
    }
}

impl Default for BanditAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditFinding>,
}

#[derive(Debug, Deserialize)]
struct BanditFinding {
    filename: String,
    #[serde(default)]
    line_number: Option<u32>,
    /// HIGH, MEDIUM or LOW
    issue_severity: String,
    issue_text: String,
    /// Bandit plugin id, e.g. `B105`
    #[serde(default)]
    test_id: Option<String>,
}

fn translate_severity(native: &str) -> Severity {
    match native {
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        _ => Severity::Medium,
    }
}

fn parse_report(stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let report: BanditReport = serde_json::from_str(stdout)?;
    let issues = report
        .results
        .into_iter()
        .map(|f| {
            let mut issue = Issue::new(
                translate_severity(&f.issue_severity),
                f.issue_text,
                f.filename,
            );
            if let Some(line) = f.line_number {
                issue = issue.with_line(line);
            }
            if let Some(test_id) = f.test_id {
                issue = issue.with_rule(test_id);
            }
            issue
        })
        .collect();
    Ok(issues)
}

#[async_trait]
impl EngineAdapter for BanditAdapter {
    fn name(&self) -> &'static str {
        "bandit"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Security
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let mut command = ToolCommand::new(&self.config.executable)
            .arg("-r")
            .arg("-f")
            .arg("json")
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
                    debug!(issue_count = issues.len(), "Bandit finished");
                    let count = issues.len() as f64;
                    EngineResult::completed(self.name(), self.family(), issues)
                        .with_metric("issues_count", count)
                        .with_duration(output.duration)
                }
                Err(e) => EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("undecodable Bandit output: {}", e),
                )
                .with_duration(started.elapsed()),
            },
            Err(e) => e
                .into_result(self.name(), self.family())
                .with_duration(started.elapsed()),
        }
    }
}
