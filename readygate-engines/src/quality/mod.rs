//! Code quality engines

pub mod eslint;
pub mod pylint;

pub use eslint::{EslintAdapter, EslintConfig};
pub use pylint::{PylintAdapter, PylintConfig};
