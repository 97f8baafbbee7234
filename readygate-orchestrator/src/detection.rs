//! Project type detection
//!
//! Walks the project tree looking for well-known marker files, collects all
//! technology markers found, and picks the primary type by configured
//! priority when markers for multiple types are present.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

use readygate_core::config::DetectionConfig;
use readygate_core::domain::{Project, ProjectType};

/// Errors from project detection
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Project root not found: {0}")]
    NotFound(String),

    #[error("Project root is not a directory: {0}")]
    NotADirectory(String),
}

/// File system-based project type detector
pub struct ProjectTypeDetector {
    config: DetectionConfig,
}

impl ProjectTypeDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Detect the project at `root`.
    ///
    /// The project id is the canonicalized root path, which is what makes the
    /// duplicate-run guard see two spellings of the same directory as one
    /// project.
    pub fn detect(&self, root: &Path) -> Result<Project, DetectionError> {
        if !root.exists() {
            return Err(DetectionError::NotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(DetectionError::NotADirectory(root.display().to_string()));
        }
        let canonical = root
            .canonicalize()
            .map_err(|_| DetectionError::NotFound(root.display().to_string()))?;

        let mut markers = BTreeSet::new();

        let walker = WalkDir::new(&canonical)
            .max_depth(self.config.max_depth)
            .into_iter();
        for entry in walker.filter_entry(|e| e.depth() == 0 || !is_ignored(e)) {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();

            match file_name.as_ref() {
                "package.json" | "package-lock.json" | "yarn.lock" => {
                    markers.insert("javascript".to_string());
                }
                "requirements.txt" | "Pipfile" | "pyproject.toml" | "poetry.lock" => {
                    markers.insert("python".to_string());
                }
                "pom.xml" => {
                    markers.insert("java".to_string());
                    markers.insert("maven".to_string());
                }
                "build.gradle" | "build.gradle.kts" => {
                    markers.insert("java".to_string());
                    markers.insert("gradle".to_string());
                }
                "Dockerfile" | "docker-compose.yml" | "docker-compose.yaml" => {
                    markers.insert("docker".to_string());
                }
                _ => {
                    if let Some(ext) = entry.path().extension() {
                        match ext.to_string_lossy().as_ref() {
                            "py" => {
                                markers.insert("python".to_string());
                            }
                            "js" | "jsx" => {
                                markers.insert("javascript".to_string());
                            }
                            // TS implies the JS toolchain
                            "ts" | "tsx" => {
                                markers.insert("typescript".to_string());
                                markers.insert("javascript".to_string());
                            }
                            "java" => {
                                markers.insert("java".to_string());
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        let primary_type = self.primary_type(&markers);

        Ok(Project {
            id: canonical.display().to_string(),
            root: canonical,
            primary_type,
            markers,
        })
    }

    /// First configured priority whose marker is present; Unknown otherwise.
    fn primary_type(&self, markers: &BTreeSet<String>) -> ProjectType {
        for candidate in &self.config.priority {
            let marker = match candidate {
                ProjectType::Javascript => "javascript",
                ProjectType::Python => "python",
                ProjectType::Java => "java",
                ProjectType::Unknown => continue,
            };
            if markers.contains(marker) {
                return *candidate;
            }
        }
        ProjectType::Unknown
    }
}

/// Check if a directory entry should be skipped during the walk
fn is_ignored(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| {
            s.starts_with('.')
                || s == "node_modules"
                || s == "target"
                || s == "vendor"
                || s == "venv"
                || s == "__pycache__"
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_dummy_file(dir: &Path, name: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        writeln!(file, "dummy content").unwrap();
    }

    fn detector() -> ProjectTypeDetector {
        ProjectTypeDetector::new(DetectionConfig::default())
    }

    #[test]
    fn detects_javascript_from_package_json() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "package.json");
        create_dummy_file(temp_dir.path(), "src/index.js");

        let project = detector().detect(temp_dir.path()).unwrap();
        assert_eq!(project.primary_type, ProjectType::Javascript);
        assert!(project.markers.contains("javascript"));
    }

    #[test]
    fn detects_python_from_requirements() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "requirements.txt");
        create_dummy_file(temp_dir.path(), "app/views.py");

        let project = detector().detect(temp_dir.path()).unwrap();
        assert_eq!(project.primary_type, ProjectType::Python);
    }

    #[test]
    fn detects_java_from_pom() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "pom.xml");
        create_dummy_file(temp_dir.path(), "src/main/java/App.java");

        let project = detector().detect(temp_dir.path()).unwrap();
        assert_eq!(project.primary_type, ProjectType::Java);
        assert!(project.markers.contains("maven"));
    }

    #[test]
    fn mixed_markers_resolve_by_priority() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "package.json");
        create_dummy_file(temp_dir.path(), "requirements.txt");

        // Default priority puts javascript before python
        let project = detector().detect(temp_dir.path()).unwrap();
        assert_eq!(project.primary_type, ProjectType::Javascript);
        assert!(project.markers.contains("python"));
    }

    #[test]
    fn empty_tree_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "README.md");

        let project = detector().detect(temp_dir.path()).unwrap();
        assert_eq!(project.primary_type, ProjectType::Unknown);
    }

    #[test]
    fn markers_inside_ignored_directories_are_not_counted() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "node_modules/left-pad/package.json");
        create_dummy_file(temp_dir.path(), "requirements.txt");

        let project = detector().detect(temp_dir.path()).unwrap();
        assert_eq!(project.primary_type, ProjectType::Python);
        assert!(!project.markers.contains("javascript"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = detector()
            .detect(Path::new("/definitely/not/a/real/path"))
            .unwrap_err();
        assert!(matches!(err, DetectionError::NotFound(_)));
    }

    #[test]
    fn project_id_is_stable_across_path_spellings() {
        let temp_dir = TempDir::new().unwrap();
        create_dummy_file(temp_dir.path(), "package.json");

        let direct = detector().detect(temp_dir.path()).unwrap();
        let dotted = detector()
            .detect(&temp_dir.path().join("./."))
            .unwrap();
        assert_eq!(direct.id, dotted.id);
    }
}
