//! ReadyGate Core - Foundation crate for the ReadyGate platform
//!
//! This crate provides the pieces shared by every ReadyGate component:
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] - Canonical domain model: issues, engine results, runs, projects
//! - [`scoring`] - Pure normalization and aggregate scoring of engine results
//! - [`logging`] - Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! readygate-core/
//! ├── domain/           # Pure business model
//! │   ├── issue.rs      # Severity + canonical Issue
//! │   ├── engine.rs     # EngineAdapter contract + EngineResult
//! │   ├── run.rs        # TestRun state machine + TestConfiguration
//! │   └── project.rs    # Project + detected technology markers
//! ├── scoring/          # Normalizer + Scorer (no I/O)
//! ├── config/           # Configuration management
//! └── logging.rs        # tracing-subscriber setup
//! ```
//!
//! # Configuration
//!
//! Environment variables use the `READYGATE__` prefix with double underscore
//! separators:
//!
//! ```bash
//! READYGATE__ORCHESTRATOR__MAX_CONCURRENT_ENGINES=8
//! READYGATE__ORCHESTRATOR__READINESS_THRESHOLD=85
//! ```

pub mod config;
pub mod domain;
pub mod logging;
pub mod scoring;

pub use config::Config;
pub use logging::init_tracing;
