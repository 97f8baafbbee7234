//! ReadyGate Orchestrator - run lifecycle and concurrent engine execution
//!
//! ```text
//! readygate-orchestrator
//! ├── detection      Project type detection from marker files
//! ├── selection      Engine selection rules (explicit list or type defaults)
//! ├── registry       Name-keyed registry of engine adapters
//! ├── store          Run persistence and the duplicate-run guard
//! ├── orchestrator   Bounded concurrent engine execution
//! └── service        RunService facade: submit, inspect, cancel
//! ```

pub mod detection;
pub mod orchestrator;
pub mod registry;
pub mod selection;
pub mod service;
pub mod store;

pub use detection::{DetectionError, ProjectTypeDetector};
pub use orchestrator::{Orchestrator, RunTermination};
pub use registry::EngineRegistry;
pub use selection::{EngineSelector, SelectionError};
pub use service::{CancelError, RunListener, RunService, SubmitError};
pub use store::{InMemoryRunStore, RunStore, RunStoreError};
