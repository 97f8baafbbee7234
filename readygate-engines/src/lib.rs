//! ReadyGate Engines - Analysis tool adapters
//!
//! One adapter per external analysis tool, all implementing the
//! [`EngineAdapter`](readygate_core::domain::EngineAdapter) contract:
//!
//! | Engine | Family | Tool |
//! |--------|--------|------|
//! | `eslint` | Code Quality | ESLint (JavaScript/TypeScript) |
//! | `pylint` | Code Quality | Pylint (Python) |
//! | `jest` | Functionality | Jest test runner |
//! | `pytest` | Functionality | PyTest with JSON report |
//! | `bandit` | Security | Bandit (Python) |
//! | `snyk` | Security | Snyk dependency scan |
//! | `jmeter` | Performance | JMeter load test |
//!
//! Every adapter owns its subprocess lifetime: the process is killed on
//! timeout or cancellation, never abandoned. Invocation failures never
//! escape an adapter; they come back as an `EngineResult` carrying a
//! synthetic high-severity tooling-failure issue.

pub mod functional;
pub mod invoke;
pub mod performance;
pub mod quality;
pub mod security;

use std::sync::Arc;

use readygate_core::domain::EngineAdapter;

pub use invoke::{ToolCommand, ToolError, ToolOutput};

/// All built-in engine adapters with default tool configurations
pub fn builtin_engines() -> Vec<Arc<dyn EngineAdapter>> {
    vec![
        Arc::new(quality::EslintAdapter::new()),
        Arc::new(quality::PylintAdapter::new()),
        Arc::new(functional::JestAdapter::new()),
        Arc::new(functional::PytestAdapter::new()),
        Arc::new(security::BanditAdapter::new()),
        Arc::new(security::SnykAdapter::new()),
        Arc::new(performance::JmeterAdapter::new()),
    ]
}
