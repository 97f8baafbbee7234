//! Project model

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Primary project type (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Javascript,
    Python,
    Java,
    Unknown,
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Javascript => write!(f, "javascript"),
            Self::Python => write!(f, "python"),
            Self::Java => write!(f, "java"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A project under assessment
///
/// Immutable once a run starts; the orchestrator treats the file tree as
/// read-only for the run's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier derived from the project root (used by the
    /// duplicate-run guard)
    pub id: String,
    pub root: PathBuf,
    pub primary_type: ProjectType,
    /// Detected technology markers (e.g. "javascript", "docker", "maven")
    pub markers: BTreeSet<String>,
}
