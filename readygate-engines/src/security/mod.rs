//! Security engines

pub mod bandit;
pub mod snyk;

pub use bandit::{BanditAdapter, BanditConfig};
pub use snyk::{SnykAdapter, SnykConfig};
