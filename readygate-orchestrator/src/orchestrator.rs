//! Concurrent engine execution
//!
//! Fans the selected engines out as tokio tasks bounded by a semaphore,
//! enforces per-engine budgets and the optional run-level ceiling, retries
//! errored engines with linear backoff, and collects one result per engine
//! regardless of how each invocation ended.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use readygate_core::config::OrchestratorConfig;
use readygate_core::domain::{
    EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus, Project,
    TestConfiguration,
};

/// Slack granted past an engine's own budget before the orchestrator cuts
/// it off. Adapters enforce their budget themselves; this outer guard fires
/// only for an adapter that violates that contract and never returns.
const ENGINE_FAILSAFE_GRACE: Duration = Duration::from_secs(5);

/// How a run's engine phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTermination {
    /// Every engine produced its own result
    Completed,
    /// The caller cancelled the run while engines were in flight
    Cancelled,
    /// The run-level ceiling expired; outstanding engines were cancelled
    CeilingExceeded,
}

/// Executes the engine phase of a run
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    fn timeout_for(&self, engine: &str, config: &TestConfiguration) -> Duration {
        config
            .timeout_overrides
            .get(engine)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_else(|| self.config.default_timeout())
    }

    fn files_for(
        &self,
        family: EngineFamily,
        config: &TestConfiguration,
    ) -> Vec<std::path::PathBuf> {
        if family == EngineFamily::Performance {
            // The test plan is the performance engine's sole input
            return config
                .performance_test_plan
                .iter()
                .cloned()
                .collect();
        }
        config.file_subsets.get(&family).cloned().unwrap_or_default()
    }

    /// Run all selected engines to completion.
    ///
    /// Always returns exactly one result per engine: a panicked engine task
    /// degrades to a tooling-failure result rather than losing its category.
    /// `cancel` is the caller's token; the run ceiling cancels through a
    /// child token so caller cancellation stays distinguishable.
    pub async fn execute(
        &self,
        engines: Vec<Arc<dyn EngineAdapter>>,
        project: &Project,
        config: &TestConfiguration,
        cancel: CancellationToken,
    ) -> (Vec<EngineResult>, RunTermination) {
        let run_cancel = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_engines));
        let retry = self.config.retry.clone();

        let mut tasks: JoinSet<EngineResult> = JoinSet::new();
        let mut identities: HashMap<tokio::task::Id, (&'static str, EngineFamily)> =
            HashMap::new();

        for engine in engines {
            let name = engine.name();
            let family = engine.family();
            let request = EngineRequest::new(&project.root, self.timeout_for(name, config))
                .with_files(self.files_for(family, config))
                .with_cancel(run_cancel.clone());
            let semaphore = Arc::clone(&semaphore);
            let run_cancel = run_cancel.clone();
            let retry = retry.clone();

            let handle = tasks.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return EngineResult::cancelled(name, family),
                    },
                    _ = run_cancel.cancelled() => {
                        return EngineResult::cancelled(name, family);
                    }
                };

                let failsafe = request.timeout + ENGINE_FAILSAFE_GRACE;
                let mut attempt: u32 = 0;
                loop {
                    debug!(engine = name, attempt, "Dispatching engine");
                    let result = match tokio::time::timeout(failsafe, engine.run(&request)).await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(engine = name, "Engine failed to stop within its budget");
                            EngineResult::tooling_failure(
                                name,
                                family,
                                EngineStatus::Timeout,
                                format!(
                                    "engine failed to stop within its {}s budget",
                                    request.timeout.as_secs()
                                ),
                            )
                        }
                    };

                    // Timeouts already consumed their full budget; only
                    // plain errors are worth another attempt.
                    let retryable = result.status == EngineStatus::Error
                        && attempt < retry.max_retries
                        && !run_cancel.is_cancelled();
                    if !retryable {
                        return result;
                    }

                    attempt += 1;
                    warn!(engine = name, attempt, "Engine errored, retrying");
                    let backoff = Duration::from_millis(retry.backoff_ms * u64::from(attempt));
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = run_cancel.cancelled() => {
                            return EngineResult::cancelled(name, family);
                        }
                    }
                }
            });
            identities.insert(handle.id(), (name, family));
        }

        let deadline = self
            .config
            .run_timeout()
            .map(|ceiling| tokio::time::Instant::now() + ceiling);
        let mut ceiling_hit = false;
        let mut results = Vec::with_capacity(identities.len());

        loop {
            let joined = match deadline {
                Some(deadline) if !ceiling_hit => {
                    tokio::select! {
                        joined = tasks.join_next_with_id() => joined,
                        _ = tokio::time::sleep_until(deadline) => {
                            warn!("Run ceiling expired, cancelling outstanding engines");
                            ceiling_hit = true;
                            run_cancel.cancel();
                            continue;
                        }
                    }
                }
                _ => tasks.join_next_with_id().await,
            };

            match joined {
                Some(Ok((id, result))) => {
                    identities.remove(&id);
                    results.push(result);
                }
                Some(Err(join_error)) => {
                    // Engine task panicked; synthesize its result so the
                    // category is not silently lost.
                    let id = join_error.id();
                    if let Some((name, family)) = identities.remove(&id) {
                        warn!(engine = name, error = %join_error, "Engine task failed");
                        results.push(EngineResult::tooling_failure(
                            name,
                            family,
                            EngineStatus::Error,
                            format!("engine task failed: {}", join_error),
                        ));
                    }
                }
                None => break,
            }
        }

        let termination = if cancel.is_cancelled() {
            RunTermination::Cancelled
        } else if ceiling_hit {
            RunTermination::CeilingExceeded
        } else {
            RunTermination::Completed
        };
        (results, termination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use readygate_core::config::RetryConfig;

    fn project() -> Project {
        Project {
            id: "/tmp/demo".to_string(),
            root: PathBuf::from("/tmp/demo"),
            primary_type: readygate_core::domain::ProjectType::Javascript,
            markers: BTreeSet::new(),
        }
    }

    fn orchestrator(config: OrchestratorConfig) -> Orchestrator {
        Orchestrator::new(config)
    }

    /// Adapter that sleeps then reports a fixed status
    struct FakeEngine {
        name: &'static str,
        family: EngineFamily,
        delay: Duration,
        status: EngineStatus,
    }

    #[async_trait]
    impl EngineAdapter for FakeEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        fn family(&self) -> EngineFamily {
            self.family
        }

        async fn run(&self, request: &EngineRequest) -> EngineResult {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = request.cancel.cancelled() => {
                    return EngineResult::cancelled(self.name, self.family);
                }
            }
            match self.status {
                EngineStatus::Completed => {
                    EngineResult::completed(self.name, self.family, Vec::new())
                }
                status => EngineResult::tooling_failure(self.name, self.family, status, "boom"),
            }
        }
    }

    /// Adapter that errors a fixed number of times before succeeding
    struct FlakyEngine {
        calls: Arc<AtomicU32>,
        failures: u32,
    }

    #[async_trait]
    impl EngineAdapter for FlakyEngine {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn family(&self) -> EngineFamily {
            EngineFamily::Security
        }

        async fn run(&self, _request: &EngineRequest) -> EngineResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                EngineResult::tooling_failure(
                    "flaky",
                    EngineFamily::Security,
                    EngineStatus::Error,
                    "transient",
                )
            } else {
                EngineResult::completed("flaky", EngineFamily::Security, Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn collects_one_result_per_engine() {
        let engines: Vec<Arc<dyn EngineAdapter>> = vec![
            Arc::new(FakeEngine {
                name: "eslint",
                family: EngineFamily::Quality,
                delay: Duration::from_millis(10),
                status: EngineStatus::Completed,
            }),
            Arc::new(FakeEngine {
                name: "jest",
                family: EngineFamily::Functionality,
                delay: Duration::from_millis(5),
                status: EngineStatus::Completed,
            }),
        ];

        let (results, termination) = orchestrator(OrchestratorConfig::default())
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(termination, RunTermination::Completed);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == EngineStatus::Completed));
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_limit() {
        struct CountingEngine {
            name: &'static str,
            family: EngineFamily,
            live: Arc<AtomicUsize>,
            peak: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl EngineAdapter for CountingEngine {
            fn name(&self) -> &'static str {
                self.name
            }

            fn family(&self) -> EngineFamily {
                self.family
            }

            async fn run(&self, _request: &EngineRequest) -> EngineResult {
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(live, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.live.fetch_sub(1, Ordering::SeqCst);
                EngineResult::completed(self.name, self.family, Vec::new())
            }
        }

        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let families = [
            ("eslint", EngineFamily::Quality),
            ("jest", EngineFamily::Functionality),
            ("snyk", EngineFamily::Security),
            ("jmeter", EngineFamily::Performance),
        ];
        let engines: Vec<Arc<dyn EngineAdapter>> = families
            .into_iter()
            .map(|(name, family)| {
                Arc::new(CountingEngine {
                    name,
                    family,
                    live: Arc::clone(&live),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn EngineAdapter>
            })
            .collect();

        let config = OrchestratorConfig {
            max_concurrent_engines: 2,
            ..Default::default()
        };
        let (results, _) = orchestrator(config)
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(results.len(), 4);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn errored_engines_are_retried_until_they_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let engines: Vec<Arc<dyn EngineAdapter>> = vec![Arc::new(FlakyEngine {
            calls: Arc::clone(&calls),
            failures: 2,
        })];

        let config = OrchestratorConfig {
            retry: RetryConfig {
                max_retries: 2,
                backoff_ms: 1,
            },
            ..Default::default()
        };
        let (results, _) = orchestrator(config)
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(results[0].status, EngineStatus::Completed);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let engines: Vec<Arc<dyn EngineAdapter>> = vec![Arc::new(FlakyEngine {
            calls: Arc::clone(&calls),
            failures: 10,
        })];

        let config = OrchestratorConfig {
            retry: RetryConfig {
                max_retries: 1,
                backoff_ms: 1,
            },
            ..Default::default()
        };
        let (results, _) = orchestrator(config)
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(results[0].status, EngineStatus::Error);
    }

    #[tokio::test]
    async fn timeouts_are_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));

        struct TimingOutEngine {
            calls: Arc<AtomicU32>,
        }

        #[async_trait]
        impl EngineAdapter for TimingOutEngine {
            fn name(&self) -> &'static str {
                "slowpoke"
            }

            fn family(&self) -> EngineFamily {
                EngineFamily::Performance
            }

            async fn run(&self, _request: &EngineRequest) -> EngineResult {
                self.calls.fetch_add(1, Ordering::SeqCst);
                EngineResult::tooling_failure(
                    "slowpoke",
                    EngineFamily::Performance,
                    EngineStatus::Timeout,
                    "budget exceeded",
                )
            }
        }

        let engines: Vec<Arc<dyn EngineAdapter>> = vec![Arc::new(TimingOutEngine {
            calls: Arc::clone(&calls),
        })];
        let (results, _) = orchestrator(OrchestratorConfig::default())
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results[0].status, EngineStatus::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_that_never_returns_is_cut_off_by_the_failsafe() {
        struct RogueEngine;

        #[async_trait]
        impl EngineAdapter for RogueEngine {
            fn name(&self) -> &'static str {
                "rogue"
            }

            fn family(&self) -> EngineFamily {
                EngineFamily::Quality
            }

            // Ignores both its budget and the cancellation token
            async fn run(&self, _request: &EngineRequest) -> EngineResult {
                std::future::pending().await
            }
        }

        let engines: Vec<Arc<dyn EngineAdapter>> = vec![Arc::new(RogueEngine)];
        let (results, termination) = orchestrator(OrchestratorConfig::default())
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(termination, RunTermination::Completed);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, EngineStatus::Timeout);
        assert!(results[0].issues[0].message.contains("failed to stop"));
    }

    #[tokio::test]
    async fn caller_cancellation_stops_in_flight_engines() {
        let engines: Vec<Arc<dyn EngineAdapter>> = vec![Arc::new(FakeEngine {
            name: "eslint",
            family: EngineFamily::Quality,
            delay: Duration::from_secs(60),
            status: EngineStatus::Completed,
        })];

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let (results, termination) = orchestrator(OrchestratorConfig::default())
            .execute(engines, &project(), &TestConfiguration::default(), cancel)
            .await;

        assert_eq!(termination, RunTermination::Cancelled);
        assert_eq!(results[0].status, EngineStatus::Cancelled);
    }

    #[tokio::test]
    async fn run_ceiling_cancels_outstanding_engines() {
        let engines: Vec<Arc<dyn EngineAdapter>> = vec![
            Arc::new(FakeEngine {
                name: "eslint",
                family: EngineFamily::Quality,
                delay: Duration::from_millis(5),
                status: EngineStatus::Completed,
            }),
            Arc::new(FakeEngine {
                name: "jest",
                family: EngineFamily::Functionality,
                delay: Duration::from_secs(60),
                status: EngineStatus::Completed,
            }),
        ];

        let config = OrchestratorConfig {
            run_timeout_seconds: Some(1),
            ..Default::default()
        };
        let started = std::time::Instant::now();
        let (results, termination) = orchestrator(config)
            .execute(
                engines,
                &project(),
                &TestConfiguration::default(),
                CancellationToken::new(),
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(termination, RunTermination::CeilingExceeded);
        let jest = results.iter().find(|r| r.engine == "jest").unwrap();
        assert_eq!(jest.status, EngineStatus::Cancelled);
        let eslint = results.iter().find(|r| r.engine == "eslint").unwrap();
        assert_eq!(eslint.status, EngineStatus::Completed);
    }

    #[tokio::test]
    async fn per_engine_timeout_overrides_apply() {
        let orchestrator = orchestrator(OrchestratorConfig::default());
        let mut config = TestConfiguration::default();
        config.timeout_overrides.insert("jest".to_string(), 30);

        assert_eq!(
            orchestrator.timeout_for("jest", &config),
            Duration::from_secs(30)
        );
        assert_eq!(
            orchestrator.timeout_for("eslint", &config),
            Duration::from_secs(300)
        );
    }
}
