//! Run lifecycle facade
//!
//! `RunService` is the single entry point: it detects the project, selects
//! engines, enforces the duplicate-run guard, executes the run in the
//! background, and exposes lookup and cancellation. Listeners observe
//! terminal runs without the service knowing what they do with them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};
use uuid::Uuid;

use readygate_core::Config;
use readygate_core::domain::{EngineStatus, RunStatus, TestConfiguration, TestRun};
use readygate_core::scoring;

use crate::detection::{DetectionError, ProjectTypeDetector};
use crate::orchestrator::{Orchestrator, RunTermination};
use crate::registry::EngineRegistry;
use crate::selection::{EngineSelector, SelectionError};
use crate::store::{InMemoryRunStore, RunStore, RunStoreError};

/// Observer notified when a run reaches a terminal state
#[async_trait]
pub trait RunListener: Send + Sync {
    async fn run_completed(&self, run: &TestRun);
}

/// Errors from run submission
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("A run is already active for project {0}")]
    DuplicateRun(String),

    #[error("Invalid test configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors from run cancellation
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("Run not found: {0}")]
    NotFound(Uuid),

    #[error("Run {0} already reached a terminal state")]
    AlreadyTerminal(Uuid),
}

/// Orchestration facade
pub struct RunService {
    detector: ProjectTypeDetector,
    registry: EngineRegistry,
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn RunStore>,
    listeners: Vec<Arc<dyn RunListener>>,
    default_threshold: f64,
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl RunService {
    /// Service with the built-in engines and in-memory storage
    pub fn new(config: Config) -> Self {
        Self::with_parts(
            config,
            EngineRegistry::with_builtin_engines(),
            Arc::new(InMemoryRunStore::new()),
        )
    }

    pub fn with_parts(config: Config, registry: EngineRegistry, store: Arc<dyn RunStore>) -> Self {
        Self {
            detector: ProjectTypeDetector::new(config.detection.clone()),
            registry,
            orchestrator: Arc::new(Orchestrator::new(config.orchestrator.clone())),
            store,
            listeners: Vec::new(),
            default_threshold: config.orchestrator.readiness_threshold,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn RunListener>) {
        self.listeners.push(listener);
    }

    /// Start a run for the project at `root`.
    ///
    /// Returns as soon as the run record exists; engines execute in the
    /// background. The returned id is the handle for lookup and
    /// cancellation.
    #[instrument(skip(self, config), fields(root = %root.display()))]
    pub async fn submit_run(
        &self,
        root: &Path,
        config: TestConfiguration,
    ) -> Result<Uuid, SubmitError> {
        if let Some(threshold) = config.readiness_threshold
            && !(0.0..=100.0).contains(&threshold)
        {
            return Err(SubmitError::InvalidConfiguration(format!(
                "readiness_threshold {} is outside [0, 100]",
                threshold
            )));
        }

        let project = self.detector.detect(root)?;
        let engines = EngineSelector::select(&self.registry, &project, &config)?;

        let run = TestRun::new(project.id.clone());
        let run_id = run.run_id;
        self.store.begin(run).await.map_err(|e| match e {
            RunStoreError::DuplicateRun(project_id) => SubmitError::DuplicateRun(project_id),
            RunStoreError::NotFound(_) => SubmitError::DuplicateRun(project.id.clone()),
        })?;

        let cancel = CancellationToken::new();
        self.lock_active().insert(run_id, cancel.clone());

        info!(
            run_id = %run_id,
            project_id = %project.id,
            project_type = %project.primary_type,
            "Run accepted"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let store = Arc::clone(&self.store);
        let listeners = self.listeners.clone();
        let active = Arc::clone(&self.active);
        let threshold = config.readiness_threshold.unwrap_or(self.default_threshold);

        tokio::spawn(async move {
            let outcome = Self::execute_run(
                run_id,
                orchestrator,
                Arc::clone(&store),
                engines,
                project,
                config,
                threshold,
                cancel,
            )
            .await;

            active.lock().unwrap_or_else(|e| e.into_inner()).remove(&run_id);

            match outcome {
                Ok(run) => {
                    for listener in &listeners {
                        listener.run_completed(&run).await;
                    }
                }
                Err(e) => error!(run_id = %run_id, error = %e, "Run bookkeeping failed"),
            }
        });

        Ok(run_id)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_run(
        run_id: Uuid,
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn RunStore>,
        engines: Vec<Arc<dyn readygate_core::domain::EngineAdapter>>,
        project: readygate_core::domain::Project,
        config: TestConfiguration,
        threshold: f64,
        cancel: CancellationToken,
    ) -> Result<TestRun, RunLifecycleError> {
        let mut run = store.get(run_id).await.ok_or(RunLifecycleError::Lost(run_id))?;
        run.transition(RunStatus::Running)?;
        store.update(run.clone()).await?;

        let (results, termination) = orchestrator
            .execute(engines, &project, &config, cancel)
            .await;

        let terminal = match termination {
            // An interrupted run records its partial categories as-is for
            // diagnostics; the aggregate scorer never sees them and no
            // verdict is computed.
            RunTermination::Cancelled | RunTermination::CeilingExceeded => {
                let mut categories: Vec<_> = results.iter().map(scoring::normalize).collect();
                categories.sort_by(|a, b| a.engine.cmp(&b.engine));
                run.summary = scoring::summarize(&categories);
                run.categories = categories;
                run.overall_score = 0.0;
                if termination == RunTermination::Cancelled {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Error
                }
            }
            RunTermination::Completed => {
                let outcome = scoring::aggregate(&results, &config.weights, threshold);
                run.categories = outcome.categories;
                run.summary = outcome.summary;
                run.overall_score = outcome.overall_score;

                let tooling_failed = run
                    .categories
                    .iter()
                    .any(|c| matches!(c.status, EngineStatus::Error | EngineStatus::Timeout));
                if tooling_failed {
                    RunStatus::Error
                } else if outcome.production_ready {
                    RunStatus::Passed
                } else {
                    RunStatus::Failed
                }
            }
        };
        // A cancelled or errored run never carries a positive verdict
        run.production_ready = terminal == RunStatus::Passed;
        run.transition(terminal)?;
        store.finish(run.clone()).await?;

        info!(
            run_id = %run_id,
            status = %run.status,
            overall_score = run.overall_score,
            production_ready = run.production_ready,
            "Run finished"
        );
        Ok(run)
    }

    pub async fn get_run(&self, run_id: Uuid) -> Option<TestRun> {
        self.store.get(run_id).await
    }

    /// Run history for a project, newest first.
    pub async fn list_runs(&self, project_id: &str) -> Vec<TestRun> {
        self.store.list_for_project(project_id).await
    }

    /// Cancel an in-flight run.
    ///
    /// Signals the run's engines and returns immediately; the run reaches
    /// its Cancelled terminal state once in-flight engines have stopped.
    pub async fn cancel_run(&self, run_id: Uuid) -> Result<(), CancelError> {
        let token = self.lock_active().get(&run_id).cloned();
        match token {
            Some(token) => {
                info!(run_id = %run_id, "Cancelling run");
                token.cancel();
                Ok(())
            }
            None => match self.store.get(run_id).await {
                Some(_) => Err(CancelError::AlreadyTerminal(run_id)),
                None => Err(CancelError::NotFound(run_id)),
            },
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Internal bookkeeping failures of the background run task
#[derive(Debug, thiserror::Error)]
enum RunLifecycleError {
    #[error("Run record disappeared: {0}")]
    Lost(Uuid),

    #[error(transparent)]
    Transition(#[from] readygate_core::domain::RunTransitionError),

    #[error(transparent)]
    Store(#[from] RunStoreError),
}
