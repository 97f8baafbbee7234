//! JMeter adapter for load testing
//!
//! Runs JMeter headless against a `.jmx` test plan and aggregates the JTL
//! sample log into response-time, throughput and error-rate metrics.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Issue, Severity,
};

use crate::invoke::ToolCommand;

/// Configuration for JMeter invocation
#[derive(Debug, Clone)]
pub struct JmeterConfig {
    pub executable: String,
    pub extra_args: Vec<String>,
    /// Error-rate ceiling in percent; breaches become a High issue
    pub max_error_rate: f64,
    /// Average response-time ceiling in milliseconds; breaches become a
    /// Medium issue
    pub max_avg_response_ms: f64,
}

impl Default for JmeterConfig {
    fn default() -> Self {
        Self {
            executable: "jmeter".to_string(),
            extra_args: vec![],
            max_error_rate: 5.0,
            max_avg_response_ms: 2000.0,
        }
    }
}

/// JMeter engine adapter
///
/// The first entry in the request's file subset is the `.jmx` test plan.
/// Without a plan there is nothing to load-test and the engine reports
/// itself skipped.
pub struct JmeterAdapter {
    config: JmeterConfig,
}

impl JmeterAdapter {
    pub fn new() -> Self {
        Self {
            config: JmeterConfig::default(),
        }
    }

    pub fn with_config(config: JmeterConfig) -> Self {
        Self { config }
    }
}

impl Default for JmeterAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq)]
struct JtlAggregate {
    samples: u64,
    response_time_avg: f64,
    /// Samples per second over the observed span
    throughput: f64,
    /// Percent of failed samples
    error_rate: f64,
}

/// Aggregate a CSV JTL sample log.
///
/// Expects the default JTL header with at least the `timeStamp`, `elapsed`
/// and `success` columns.
fn aggregate_jtl(contents: &str) -> Result<JtlAggregate, String> {
    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| "empty JTL file".to_string())?;

    let columns: Vec<&str> = header.split(',').collect();
    let col = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| format!("JTL header missing column '{}'", name))
    };
    let ts_idx = col("timeStamp")?;
    let elapsed_idx = col("elapsed")?;
    let success_idx = col("success")?;

    let mut samples = 0u64;
    let mut failures = 0u64;
    let mut elapsed_sum = 0f64;
    let mut first_ts = u64::MAX;
    let mut last_ts = 0u64;

    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();
        let (Some(ts), Some(elapsed), Some(success)) = (
            fields.get(ts_idx),
            fields.get(elapsed_idx),
            fields.get(success_idx),
        ) else {
            continue;
        };
        let Ok(ts) = ts.parse::<u64>() else { continue };
        let Ok(elapsed) = elapsed.parse::<f64>() else {
            continue;
        };

        samples += 1;
        elapsed_sum += elapsed;
        first_ts = first_ts.min(ts);
        last_ts = last_ts.max(ts);
        if !success.eq_ignore_ascii_case("true") {
            failures += 1;
        }
    }

    if samples == 0 {
        return Err("JTL file contains no samples".to_string());
    }

    let span_seconds = ((last_ts.saturating_sub(first_ts)) as f64 / 1000.0).max(1.0);
    Ok(JtlAggregate {
        samples,
        response_time_avg: elapsed_sum / samples as f64,
        throughput: samples as f64 / span_seconds,
        error_rate: failures as f64 / samples as f64 * 100.0,
    })
}

fn threshold_issues(aggregate: &JtlAggregate, config: &JmeterConfig, plan: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    if aggregate.error_rate > config.max_error_rate {
        issues.push(
            Issue::new(
                Severity::High,
                format!(
                    "Error rate {:.1}% exceeds the {:.1}% ceiling",
                    aggregate.error_rate, config.max_error_rate
                ),
                plan,
            )
            .with_rule("error-rate"),
        );
    }
    if aggregate.response_time_avg > config.max_avg_response_ms {
        issues.push(
            Issue::new(
                Severity::Medium,
                format!(
                    "Average response time {:.0}ms exceeds the {:.0}ms ceiling",
                    aggregate.response_time_avg, config.max_avg_response_ms
                ),
                plan,
            )
            .with_rule("response-time"),
        );
    }
    issues
}

#[async_trait]
impl EngineAdapter for JmeterAdapter {
    fn name(&self) -> &'static str {
        "jmeter"
    }

    fn family(&self) -> EngineFamily {
        EngineFamily::Performance
    }

    async fn run(&self, request: &EngineRequest) -> EngineResult {
        let started = Instant::now();

        let Some(plan) = request.files.first() else {
            return EngineResult::skipped(self.name(), self.family());
        };
        let plan_label = plan.to_string_lossy().into_owned();

        let jtl_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return EngineResult::tooling_failure(
                    self.name(),
                    self.family(),
                    EngineStatus::Error,
                    format!("cannot create results directory: {}", e),
                );
            }
        };
        let jtl_path = jtl_dir.path().join("results.jtl");

        let command = ToolCommand::new(&self.config.executable)
            .arg("-n")
            .arg("-t")
            .arg_path(plan)
            .arg("-l")
            .arg_path(&jtl_path)
            .args(self.config.extra_args.clone())
            .current_dir(&request.project_root);

        match command.run(request.timeout, &request.cancel).await {
            Ok(output) => {
                let contents = match tokio::fs::read_to_string(&jtl_path).await {
                    Ok(contents) => contents,
                    Err(e) => {
                        return EngineResult::tooling_failure(
                            self.name(),
                            self.family(),
                            EngineStatus::Error,
                            format!("missing JTL results: {}", e),
                        )
                        .with_duration(started.elapsed());
                    }
                };
                match aggregate_jtl(&contents) {
                    Ok(aggregate) => {
                        debug!(
                            samples = aggregate.samples,
                            error_rate = aggregate.error_rate,
                            "JMeter finished"
                        );
                        let issues = threshold_issues(&aggregate, &self.config, &plan_label);
                        EngineResult::completed(self.name(), self.family(), issues)
                            .with_metric("samples", aggregate.samples as f64)
                            .with_metric("response_time_avg", aggregate.response_time_avg)
                            .with_metric("throughput", aggregate.throughput)
                            .with_metric("error_rate", aggregate.error_rate)
                            .with_duration(output.duration)
                    }
                    Err(e) => EngineResult::tooling_failure(
                        self.name(),
                        self.family(),
                        EngineStatus::Error,
                        format!("undecodable JTL results: {}", e),
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
