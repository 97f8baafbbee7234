//! Canonical domain model

pub mod engine;
pub mod issue;
pub mod project;
pub mod run;

pub use engine::{EngineAdapter, EngineFamily, EngineRequest, EngineResult, EngineStatus};
pub use issue::{Issue, Severity};
pub use project::{Project, ProjectType};
pub use run::{
    Category, RunStatus, RunTransitionError, SeveritySummary, TestConfiguration, TestRun,
};
