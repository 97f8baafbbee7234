//! Shared subprocess invocation layer
//!
//! All adapters spawn their tools through [`ToolCommand`], which enforces
//! the timeout and cancellation contract: the child process is spawned with
//! `kill_on_drop`, so abandoning the wait future (on timeout or
//! cancellation) tears the process down rather than leaking it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Captured output of a finished tool invocation
///
/// Non-zero exit does not surface as an error here: most linters exit
/// non-zero when they find issues. Adapters decide what an exit status means.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

/// Errors from a tool invocation
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("Tool exceeded its {0:?} budget and was killed")]
    Timeout(Duration),

    #[error("Invocation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Fold an invocation failure into the canonical result shape.
    ///
    /// Timeouts keep their distinct status; cancellation carries no synthetic
    /// issue because the run's report is not scored; everything else is a
    /// tooling error.
    pub fn into_result(
        self,
        engine: impl Into<String>,
        family: readygate_core::domain::EngineFamily,
    ) -> readygate_core::domain::EngineResult {
        use readygate_core::domain::{EngineResult, EngineStatus};

        match self {
            Self::Timeout(budget) => EngineResult::tooling_failure(
                engine,
                family,
                EngineStatus::Timeout,
                format!("killed after exceeding the {}s budget", budget.as_secs()),
            ),
            Self::Cancelled => EngineResult::cancelled(engine, family),
            other => {
                EngineResult::tooling_failure(engine, family, EngineStatus::Error, other.to_string())
            }
        }
    }
}

/// Builder for one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Spawn the tool and wait for it under the given budget.
    ///
    /// The child is killed when the budget expires or the cancellation token
    /// fires; in both cases the wait future is dropped and `kill_on_drop`
    /// reaps the process.
    pub async fn run(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        debug!(program = %self.program, args = ?self.args, "Spawning tool");

        let start = Instant::now();
        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(self.program.clone())
            } else {
                ToolError::Io(e)
            }
        })?;

        let output = tokio::select! {
            waited = tokio::time::timeout(timeout, child.wait_with_output()) => {
                match waited {
                    Ok(result) => result?,
                    Err(_) => return Err(ToolError::Timeout(timeout)),
                }
            }
            _ = cancel.cancelled() => return Err(ToolError::Cancelled),
        };

        let duration = start.elapsed();
        debug!(
            program = %self.program,
            exit_code = ?output.status.code(),
            elapsed_ms = duration.as_millis() as u64,
            "Tool finished"
        );

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_of_a_short_command() {
        let output = ToolCommand::new("echo")
            .arg("hello")
            .run(Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn missing_executable_maps_to_not_found() {
        let err = ToolCommand::new("definitely-not-a-real-tool-xyz")
            .run(Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn slow_command_is_killed_on_timeout() {
        let start = Instant::now();
        let err = ToolCommand::new("sleep")
            .arg("30")
            .run(Duration::from_millis(100), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_running_command() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = ToolCommand::new("sleep")
            .arg("30")
            .run(Duration::from_secs(60), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_zero_exit_still_returns_output() {
        let output = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo findings; exit 1")
            .run(Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(1));
        assert_eq!(output.stdout.trim(), "findings");
    }
}
