//! Engine selection
//!
//! Decides which registered engines participate in a run. An explicit engine
//! list in the request wins; otherwise defaults are derived from the detected
//! project type. Either way the selection carries at most one engine per
//! category family, so each family maps to exactly one category on the
//! report.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use readygate_core::domain::{
    EngineAdapter, EngineFamily, Project, ProjectType, TestConfiguration,
};

use crate::registry::EngineRegistry;

/// Errors from engine selection
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Unknown engine requested: {0}")]
    UnknownEngine(String),

    #[error("Engines {first} and {second} both report into the {family} category")]
    FamilyConflict {
        first: String,
        second: String,
        family: EngineFamily,
    },
}

/// Rule-based engine selector
pub struct EngineSelector;

impl EngineSelector {
    /// Default engine names for a detected project type.
    ///
    /// Projects of unknown type still get a dependency scan: the manifest
    /// formats Snyk understands are exactly the markers detection may have
    /// missed deeper in the tree.
    fn defaults_for(project_type: ProjectType) -> &'static [&'static str] {
        match project_type {
            ProjectType::Javascript => &["eslint", "jest", "snyk"],
            ProjectType::Python => &["pylint", "pytest", "bandit"],
            ProjectType::Java => &["snyk"],
            ProjectType::Unknown => &["snyk"],
        }
    }

    /// Resolve the engine set for one run.
    pub fn select(
        registry: &EngineRegistry,
        project: &Project,
        config: &TestConfiguration,
    ) -> Result<Vec<Arc<dyn EngineAdapter>>, SelectionError> {
        let names: Vec<String> = match &config.engines {
            Some(explicit) => explicit.clone(),
            None => {
                let mut names: Vec<String> = Self::defaults_for(project.primary_type)
                    .iter()
                    .map(|n| n.to_string())
                    .collect();
                // The performance engine only joins when a test plan exists
                if config.performance_test_plan.is_some() {
                    names.push("jmeter".to_string());
                }
                names
            }
        };

        let mut selected: Vec<Arc<dyn EngineAdapter>> = Vec::with_capacity(names.len());
        let mut families: HashSet<EngineFamily> = HashSet::new();
        for name in &names {
            let engine = registry
                .get(name)
                .ok_or_else(|| SelectionError::UnknownEngine(name.clone()))?;
            if !families.insert(engine.family()) {
                let first = selected
                    .iter()
                    .find(|e| e.family() == engine.family())
                    .map(|e| e.name().to_string())
                    .unwrap_or_default();
                return Err(SelectionError::FamilyConflict {
                    first,
                    second: engine.name().to_string(),
                    family: engine.family(),
                });
            }
            selected.push(engine);
        }

        debug!(
            project_type = %project.primary_type,
            engines = ?selected.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "Selected engines"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn project(primary_type: ProjectType) -> Project {
        Project {
            id: "/tmp/demo".to_string(),
            root: PathBuf::from("/tmp/demo"),
            primary_type,
            markers: BTreeSet::new(),
        }
    }

    fn names(engines: &[Arc<dyn EngineAdapter>]) -> Vec<&'static str> {
        engines.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn javascript_defaults_cover_quality_functionality_security() {
        let registry = EngineRegistry::with_builtin_engines();
        let selected = EngineSelector::select(
            &registry,
            &project(ProjectType::Javascript),
            &TestConfiguration::default(),
        )
        .unwrap();
        assert_eq!(names(&selected), vec!["eslint", "jest", "snyk"]);
    }

    #[test]
    fn python_defaults_pick_the_python_toolchain() {
        let registry = EngineRegistry::with_builtin_engines();
        let selected = EngineSelector::select(
            &registry,
            &project(ProjectType::Python),
            &TestConfiguration::default(),
        )
        .unwrap();
        assert_eq!(names(&selected), vec!["pylint", "pytest", "bandit"]);
    }

    #[test]
    fn unknown_projects_still_get_a_dependency_scan() {
        let registry = EngineRegistry::with_builtin_engines();
        let selected = EngineSelector::select(
            &registry,
            &project(ProjectType::Unknown),
            &TestConfiguration::default(),
        )
        .unwrap();
        assert_eq!(names(&selected), vec!["snyk"]);
    }

    #[test]
    fn performance_engine_joins_only_with_a_test_plan() {
        let registry = EngineRegistry::with_builtin_engines();
        let config = TestConfiguration {
            performance_test_plan: Some(PathBuf::from("plans/load.jmx")),
            ..Default::default()
        };
        let selected =
            EngineSelector::select(&registry, &project(ProjectType::Javascript), &config).unwrap();
        assert_eq!(names(&selected), vec!["eslint", "jest", "snyk", "jmeter"]);
    }

    #[test]
    fn explicit_list_overrides_defaults() {
        let registry = EngineRegistry::with_builtin_engines();
        let config = TestConfiguration {
            engines: Some(vec!["bandit".to_string()]),
            ..Default::default()
        };
        let selected =
            EngineSelector::select(&registry, &project(ProjectType::Javascript), &config).unwrap();
        assert_eq!(names(&selected), vec!["bandit"]);
    }

    #[test]
    fn unknown_engine_name_is_rejected() {
        let registry = EngineRegistry::with_builtin_engines();
        let config = TestConfiguration {
            engines: Some(vec!["clippy".to_string()]),
            ..Default::default()
        };
        let err = EngineSelector::select(&registry, &project(ProjectType::Javascript), &config)
            .unwrap_err();
        assert!(matches!(err, SelectionError::UnknownEngine(name) if name == "clippy"));
    }

    #[test]
    fn two_engines_in_one_family_are_rejected() {
        let registry = EngineRegistry::with_builtin_engines();
        let config = TestConfiguration {
            engines: Some(vec!["bandit".to_string(), "snyk".to_string()]),
            ..Default::default()
        };
        let err = EngineSelector::select(&registry, &project(ProjectType::Python), &config)
            .unwrap_err();
        assert!(matches!(
            err,
            SelectionError::FamilyConflict {
                family: EngineFamily::Security,
                ..
            }
        ));
    }
}
