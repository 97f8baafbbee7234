//! Run persistence
//!
//! The store owns two pieces of state: the run records themselves and the
//! set of projects with a run currently in flight. The latter backs the
//! duplicate-run guard, whose check-and-reserve must be atomic so two
//! concurrent submissions for the same project cannot both pass.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use readygate_core::domain::TestRun;

/// Errors from the run store
#[derive(Debug, thiserror::Error)]
pub enum RunStoreError {
    #[error("A run is already active for project {0}")]
    DuplicateRun(String),

    #[error("Run not found: {0}")]
    NotFound(Uuid),
}

/// Storage abstraction for run records
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Atomically reserve the project for a new run and persist the pending
    /// record. Fails when the project already has a non-terminal run.
    async fn begin(&self, run: TestRun) -> Result<(), RunStoreError>;

    /// Persist updated run state.
    async fn update(&self, run: TestRun) -> Result<(), RunStoreError>;

    /// Persist terminal run state and release the project reservation.
    async fn finish(&self, run: TestRun) -> Result<(), RunStoreError>;

    async fn get(&self, run_id: Uuid) -> Option<TestRun>;

    /// All runs for a project, newest first.
    async fn list_for_project(&self, project_id: &str) -> Vec<TestRun>;
}

#[derive(Default)]
struct Inner {
    runs: HashMap<Uuid, TestRun>,
    active_projects: HashSet<String>,
}

/// In-memory run store
///
/// Run history lives for the process lifetime only.
#[derive(Default)]
pub struct InMemoryRunStore {
    inner: Mutex<Inner>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens when a holder panicked; the data is
        // plain maps, safe to keep using.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn begin(&self, run: TestRun) -> Result<(), RunStoreError> {
        let mut inner = self.lock();
        if !inner.active_projects.insert(run.project_id.clone()) {
            return Err(RunStoreError::DuplicateRun(run.project_id));
        }
        inner.runs.insert(run.run_id, run);
        Ok(())
    }

    async fn update(&self, run: TestRun) -> Result<(), RunStoreError> {
        let mut inner = self.lock();
        if !inner.runs.contains_key(&run.run_id) {
            return Err(RunStoreError::NotFound(run.run_id));
        }
        inner.runs.insert(run.run_id, run);
        Ok(())
    }

    async fn finish(&self, run: TestRun) -> Result<(), RunStoreError> {
        let mut inner = self.lock();
        if !inner.runs.contains_key(&run.run_id) {
            return Err(RunStoreError::NotFound(run.run_id));
        }
        inner.active_projects.remove(&run.project_id);
        inner.runs.insert(run.run_id, run);
        Ok(())
    }

    async fn get(&self, run_id: Uuid) -> Option<TestRun> {
        self.lock().runs.get(&run_id).cloned()
    }

    async fn list_for_project(&self, project_id: &str) -> Vec<TestRun> {
        let inner = self.lock();
        let mut runs: Vec<TestRun> = inner
            .runs
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }
}
