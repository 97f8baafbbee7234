//! Functional test engines

pub mod jest;
pub mod pytest;

pub use jest::{JestAdapter, JestConfig};
pub use pytest::{PytestAdapter, PytestConfig};
