//! Snyk adapter for dependency vulnerability scanning

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for Snyk invocation
#[derive(Debug, Clone)]
pub struct SnykConfig {
    pub executable: String,
    pub extra_args: Vec<String>,
}

impl Default for SnykConfig {
    fn default() -> Self {
        Self {
            executable: "snyk".to_string(),
            extra_args: vec![],
        }
    }
}

/// Snyk engine adapter
///
/// Runs a dependency scan, so it ignores file subsets: the manifest at the
/// project root is the unit of analysis.
pub struct SnykAdapter {
    config: SnykConfig,
}

impl SnykAdapter {
    pub fn new() -> Self {
        Self {
            config: SnykConfig::default(),
        }
    }

    pub fn with_config(config: SnykConfig) -> Self {
        Self { config }
    }
}

impl Default for SnykAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SnykReport {
    #[serde(default)]
    vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Deserialize)]
struct Vulnerability {
    /// critical, high, medium or low
    severity: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    id: Option<String>,
    /// Affected package name
    #[serde(default, rename = "packageName")]
    package_name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

fn translate_severity(native: &str) -> Severity {
    match native {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Medium,
    }
}

fn parse_report(stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let report: SnykReport = serde_json::from_str(stdout)?;
    let issues = report
        .vulnerabilities
        .into_iter()
        .map(|v| {
            let package = match (&v.package_name, &v.version) {
                (Some(name), Some(version)) => format!("{}@{}", name, version),
                (Some(name), None) => name.clone(),
                _ => "dependencies".to_string(),
            };
            let message = v
                .title
                .unwrap_or_else(|| "Known vulnerability in dependency".to_string());
            let mut issue = Issue::new(translate_severity(&v.severity), message, package);
            if let Some(id) = v.id {
                issue = issue.with_rule(id);
            }
            issue
        })
        .collect();
    Ok(issues)
}

#[async_trait]
impl EngineAdapter for SnykAdapter {
    fn name(&self) -> &'static str {
        "snyk"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Security
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let command = ToolCommand::new(&self.config.executable)
            .arg("test")
            .arg("--json")
            .args(self.config.extra_args.clone())
            .current_dir(&request.project_root);

        match command.run(request.timeout, &request.cancel).await {
            Ok(output) => match parse_report(&output.stdout) {
                Ok(issues) => {
                    debug!(issue_count = issues.len(), "Snyk finished");
                    let count = issues.len() as f64;
                    EngineResult::completed(self.name(), self.family(), issues)
                        .with_metric("vulnerabilities_count", count)
                        .with_duration(output.duration)
                }
                Err(e) => EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("undecodable Snyk output: {}", e),
                )
                .with_duration(started.elapsed()),
            },
            Err(e) => e
                .into_result(self.name(), self.family())
                .with_duration(started.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snyk_json_into_issues() {
        let stdout = r#"{
            "vulnerabilities": [
                {"severity": "critical", "title": "Prototype Pollution",
                 "id": "SNYK-JS-LODASH-567746",
                 "packageName": "lodash", "version": "4.17.15"},
                {"severity": "medium", "title": "Regular Expression Denial of Service",
                 "id": "SNYK-JS-MS-1064664",
                 "packageName": "ms", "version": "0.7.0"}
            ],
            "ok": false
        }"#;

        let issues = parse_report(stdout).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].file, "lodash@4.17.15");
        assert_eq!(issues[0].rule.as_deref(), Some("SNYK-JS-LODASH-567746"));
        assert_eq!(issues[1].severity, Severity::Medium);
    }

    #[test]
    fn native_severities_pass_through_verbatim() {
        assert_eq!(translate_severity("critical"), Severity::Critical);
        assert_eq!(translate_severity("high"), Severity::High);
        assert_eq!(translate_severity("medium"), Severity::Medium);
        assert_eq!(translate_severity("low"), Severity::Low);
        assert_eq!(translate_severity("informational"), Severity::Medium);
    }

    #[test]
    fn clean_scan_has_no_issues() {
        let issues = parse_report(r#"{"vulnerabilities": [], "ok": true}"#).unwrap();
        assert!(issues.is_empty());
    }
}
