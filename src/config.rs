//! Project configuration: which roots to index and how, read from JSON.
//!
//! Lookup order: an explicit `--config` file, `<project>/.rootcallers.json`,
//! `<user config dir>/rootcallers/config.json`, then built-in defaults.
//! Command-line flags are merged on top with [`ProjectConfig::merge`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FinderError;
use crate::java::IndexConfig;

pub const PROJECT_CONFIG_FILE: &str = ".rootcallers.json";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directories with editable sources; empty means the project directory
    pub source_roots: Vec<String>,
    /// Directories whose sources are library code
    pub library_roots: Vec<String>,
    /// Path regexes marking individual source files as library code
    pub library_patterns: Vec<String>,
    pub hidden: bool,
    pub no_ignore: bool,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, FinderError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| FinderError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Find and load the configuration for `project_dir`.
    ///
    /// Returns the configuration and the file it came from (`None` for defaults).
    pub fn discover(explicit: Option<&Path>, project_dir: &Path) -> Result<(Self, Option<PathBuf>), FinderError> {
        Self::discover_in(explicit, project_dir, user_config_path().as_deref())
    }

    fn discover_in(
        explicit: Option<&Path>,
        project_dir: &Path,
        user_config: Option<&Path>,
    ) -> Result<(Self, Option<PathBuf>), FinderError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(FinderError::Config {
                    path: path.display().to_string(),
                    message: "config file not found".to_string(),
                });
            }
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let candidates = std::iter::once(project_dir.join(PROJECT_CONFIG_FILE))
            .chain(user_config.map(Path::to_path_buf));
        for path in candidates {
            if path.is_file() {
                debug!(path = %path.display(), "Using config file");
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Layer `overrides` on top: lists are appended, flags are or-ed,
    /// scalar options replace when set.
    pub fn merge(&mut self, overrides: ProjectConfig) {
        self.source_roots.extend(overrides.source_roots);
        self.library_roots.extend(overrides.library_roots);
        self.library_patterns.extend(overrides.library_patterns);
        self.hidden |= overrides.hidden;
        self.no_ignore |= overrides.no_ignore;
        if overrides.threads.is_some() {
            self.threads = overrides.threads;
        }
        if overrides.log_level.is_some() {
            self.log_level = overrides.log_level;
        }
    }

    /// Index settings with relative roots resolved against `project_dir`.
    pub fn to_index_config(&self, project_dir: &Path) -> Result<IndexConfig, FinderError> {
        let resolve = |root: &String| {
            let path = Path::new(root);
            if path.is_absolute() { path.to_path_buf() } else { project_dir.join(path) }
        };
        let source_roots = if self.source_roots.is_empty() {
            vec![project_dir.to_path_buf()]
        } else {
            self.source_roots.iter().map(resolve).collect()
        };
        let config = IndexConfig {
            source_roots,
            library_roots: self.library_roots.iter().map(resolve).collect(),
            library_patterns: Vec::new(),
            hidden: self.hidden,
            no_ignore: self.no_ignore,
            threads: self.threads.unwrap_or(0),
        };
        config.with_library_patterns(&self.library_patterns)
    }
}

/// `<user config dir>/rootcallers/config.json`, when the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rootcallers").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_camel_case() {
        let config: ProjectConfig = serde_json::from_str(r#"{
            "sourceRoots": ["src/main/java"],
            "libraryRoots": ["vendor"],
            "libraryPatterns": ["/generated/"],
            "noIgnore": true,
            "threads": 2,
            "logLevel": "debug"
        }"#).unwrap();
        assert_eq!(config.source_roots, vec!["src/main/java"]);
        assert_eq!(config.library_roots, vec!["vendor"]);
        assert!(config.no_ignore);
        assert!(!config.hidden);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_field_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, r#"{"sourceRoot": "src"}"#).unwrap();
        let err = ProjectConfig::load(&path).unwrap_err();
        assert!(matches!(err, FinderError::Config { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_discovery_order() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        fs::create_dir_all(&project).unwrap();
        let user = tmp.path().join("user.json");
        fs::write(&user, r#"{"threads": 3}"#).unwrap();

        let (config, source) = ProjectConfig::discover_in(None, &project, Some(&user)).unwrap();
        assert_eq!(config.threads, Some(3));
        assert_eq!(source.as_deref(), Some(user.as_path()));

        let project_file = project.join(PROJECT_CONFIG_FILE);
        fs::write(&project_file, r#"{"threads": 5}"#).unwrap();
        let (config, source) = ProjectConfig::discover_in(None, &project, Some(&user)).unwrap();
        assert_eq!(config.threads, Some(5));
        assert_eq!(source.as_deref(), Some(project_file.as_path()));

        let explicit = tmp.path().join("explicit.json");
        fs::write(&explicit, r#"{"threads": 7}"#).unwrap();
        let (config, _) = ProjectConfig::discover_in(Some(&explicit), &project, Some(&user)).unwrap();
        assert_eq!(config.threads, Some(7));
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, source) = ProjectConfig::discover_in(None, tmp.path(), None).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert!(source.is_none());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.json");
        let err = ProjectConfig::discover_in(Some(&missing), tmp.path(), None).unwrap_err();
        assert!(matches!(err, FinderError::Config { .. }));
    }

    #[test]
    fn test_merge_appends_and_overrides() {
        let mut config = ProjectConfig {
            library_roots: vec!["vendor".into()],
            threads: Some(2),
            log_level: Some("warn".into()),
            ..ProjectConfig::default()
        };
        config.merge(ProjectConfig {
            library_roots: vec!["third_party".into()],
            hidden: true,
            threads: Some(8),
            ..ProjectConfig::default()
        });
        assert_eq!(config.library_roots, vec!["vendor", "third_party"]);
        assert!(config.hidden);
        assert_eq!(config.threads, Some(8));
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_index_config_resolves_relative_roots() {
        let project = Path::new("/work/project");
        let config = ProjectConfig {
            library_roots: vec!["lib".into(), "/opt/shared".into()],
            library_patterns: vec!["/generated/".into()],
            ..ProjectConfig::default()
        };
        let index = config.to_index_config(project).unwrap();
        assert_eq!(index.source_roots, vec![project.to_path_buf()]);
        assert_eq!(index.library_roots, vec![project.join("lib"), PathBuf::from("/opt/shared")]);
        assert!(index.is_library_path("/work/project/generated/A.java"));
        assert_eq!(index.threads, 0);

        let bad = ProjectConfig { library_patterns: vec!["[".into()], ..ProjectConfig::default() };
        assert!(matches!(bad.to_index_config(project), Err(FinderError::InvalidPattern { .. })));
    }
}
