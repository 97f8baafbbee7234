//! Engine registry

use std::collections::HashMap;
use std::sync::Arc;

use readygate_core::domain::EngineAdapter;

/// Name-keyed registry of available engine adapters
///
/// Built once at startup and shared read-only across runs. Pluggability
/// lives here: a new analysis tool is one `register` call away.
#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<&'static str, Arc<dyn EngineAdapter>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with all built-in adapters
    pub fn with_builtin_engines() -> Self {
        let mut registry = Self::new();
        for engine in readygate_engines::builtin_engines() {
            registry.register(engine);
        }
        registry
    }

    /// Register an adapter under its own name; replaces any previous
    /// registration of the same name.
    pub fn register(&mut self, engine: Arc<dyn EngineAdapter>) {
        self.engines.insert(engine.name(), engine);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Registered engine names in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.engines.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_all_engines() {
        let registry = EngineRegistry::with_builtin_engines();
        assert_eq!(
            registry.names(),
            vec!["bandit", "eslint", "jest", "jmeter", "pylint", "pytest", "snyk"]
        );
        assert!(registry.get("eslint").is_some());
        assert!(registry.get("clippy").is_none());
    }

    #[test]
    fn registration_replaces_same_name() {
        let mut registry = EngineRegistry::with_builtin_engines();
        let replacement: Arc<dyn EngineAdapter> =
            Arc::new(readygate_engines::quality::EslintAdapter::new());
        registry.register(replacement);
        assert_eq!(registry.names().len(), 7);
    }
}
