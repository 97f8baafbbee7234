//! Performance engines

pub mod jmeter;

pub use jmeter::{JmeterAdapter, JmeterConfig};
