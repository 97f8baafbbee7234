//! ESLint adapter for JavaScript/TypeScript code quality

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for ESLint invocation
#[derive(Debug, Clone)]
pub struct EslintConfig {
    /// Launcher executable; ESLint normally runs through npx
    pub executable: String,
    /// Additional CLI arguments
    pub extra_args: Vec<String>,
}

impl Default for EslintConfig {
    fn default() -> Self {
        Self {
            executable: "npx".to_string(),
            extra_args: vec![],
        }
    }
}

/// ESLint engine adapter
pub struct EslintAdapter {
    config: EslintConfig,
}

impl EslintAdapter {
    pub fn new() -> Self {
        Self {
            config: EslintConfig::default(),
        }
    }

    pub fn with_config(config: EslintConfig) -> Self {
        Self { config }
    }
}

impl Default for EslintAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// ESLint JSON formatter output: one entry per linted file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileReport {
    file_path: String,
    #[serde(default)]
    messages: Vec<LintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintMessage {
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    /// ESLint severity: 2 = error, 1 = warning
    severity: u8,
    message: String,
    #[serde(default)]
    rule_id: Option<String>,
}

fn translate_severity(native: u8) -> Severity {
    match native {
        2 => Severity::High,
        1 => Severity::Medium,
        _ => Severity::Medium,
    }
}

fn parse_report(stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let reports: Vec<FileReport> = serde_json::from_str(stdout)?;
    let mut issues = Vec::new();
    for report in reports {
        for message in report.messages {
            let mut issue = Issue::new(
                translate_severity(message.severity),
                message.message,
                report.file_path.clone(),
            );
            if let Some(line) = message.line {
                issue = issue.with_line(line);
            }
            if let Some(column) = message.column {
                issue = issue.with_column(column);
            }
            if let Some(rule) = message.rule_id {
                issue = issue.with_rule(rule);
            }
            issues.push(issue);
        }
    }
    Ok(issues)
}

#[async_trait]
impl EngineAdapter for EslintAdapter {
    fn name(&self) -> &'static str {
        "eslint"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Quality
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let mut command = ToolCommand::new(&self.config.executable)
            .arg("eslint")
            .arg("--format")
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
                    debug!(issue_count = issues.len(), "ESLint finished");
                    let count = issues.len() as f64;
                    EngineResult::completed(self.name(), self.family(), issues)
                        .with_metric("issues_count", count)
                        .with_duration(output.duration)
                }
                Err(e) => EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("undecodable ESLint output: {}", e),
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
    fn parses_eslint_json_into_issues() {
        let stdout = r#"[
            {
                "filePath": "src/app.js",
                "messages": [
                    {"line": 15, "column": 7, "severity": 1, "message": "Unused variable detected", "ruleId": "no-unused-vars"},
                    {"line": 32, "column": 1, "severity": 2, "message": "Unexpected console statement", "ruleId": "no-console"}
                ]
            },
            {"filePath": "src/utils.js", "messages": []}
        ]"#;

        let issues = parse_report(stdout).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(issues[0].file, "src/app.js");
        assert_eq!(issues[0].line, Some(15));
        assert_eq!(issues[1].severity, Severity::High);
        assert_eq!(issues[1].rule.as_deref(), Some("no-console"));
    }

    #[test]
    fn empty_stdout_means_no_issues() {
        assert!(parse_report("").unwrap().is_empty());
        assert!(parse_report("  \n").unwrap().is_empty());
    }

    #[test]
    fn unknown_native_severity_maps_to_medium() {
        assert_eq!(translate_severity(0), Severity::Medium);
        assert_eq!(translate_severity(7), Severity::Medium);
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        assert!(parse_report("not json at all").is_err());
    }
}
