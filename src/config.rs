//! Project configuration.
//!
//! One explicit context object carries everything the orchestrator and its
//! collaborators need: directories, tool paths per build type, exclude
//! substrings, package root searches, and the raw argument groups the
//! change tracker checksums. Loaded from `mason-project.toml` in the
//! project directory; every collaborator receives it by reference.

use crate::error::{MasonError, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

pub const PROJECT_CONFIG_FILENAME: &str = "mason-project.toml";
pub const COMPONENT_TYPES_FILENAME: &str = "mason-comptypes.txt";
pub const COMPONENT_SOURCES_FILENAME: &str = "mason-compsources.txt";
pub const BUILD_PACKAGES_FILENAME: &str = "mason-buildpkgs.txt";

/// External tool names or paths, resolvable per build type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub compiler: String,
    pub archiver: String,
    pub symbol_dump: String,
    pub analyzer: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            compiler: "g++".to_string(),
            archiver: "ar".to_string(),
            symbol_dump: "nm".to_string(),
            analyzer: "mason-analyze".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Not serialized; fixed by where the config file was found.
    #[serde(skip)]
    project_dir: PathBuf,
    /// Source tree root, absolute or relative to the project dir.
    pub source_root: PathBuf,
    /// Build type built when the caller names none.
    pub default_build_config: String,
    /// Substring-based path exclusions applied to every scan.
    pub exclude_dirs: Vec<String>,
    /// External package root searches, `/root/!/excl/` syntax.
    pub external_root_searches: Vec<String>,
    /// Argument groups, checksummed by the change tracker.
    pub external_args: Vec<String>,
    pub compile_args: Vec<String>,
    pub link_args: Vec<String>,
    /// Tool paths keyed by build type; `default` applies to the rest.
    pub tools: BTreeMap<String, ToolPaths>,
}

impl ProjectConfig {
    /// Read `mason-project.toml` from the project directory.
    pub fn load<P: AsRef<Path>>(project_dir: P) -> Result<ProjectConfig> {
        let project_dir = project_dir.as_ref().to_path_buf();
        let path = project_dir.join(PROJECT_CONFIG_FILENAME);
        tracing::debug!("Reading project config {:?}", path);
        let content = read_to_string(&path).map_err(|e| {
            MasonError::Config(format!("Unable to read project file {path:?}: {e}"))
        })?;
        let mut config: ProjectConfig = toml::from_str(&content)?;
        config.project_dir = project_dir;
        Ok(config)
    }

    /// Like [`ProjectConfig::load`] but a missing file yields defaults, for
    /// callers that treat an unconfigured project as "scan everything".
    pub fn load_or_default<P: AsRef<Path>>(project_dir: P) -> Result<ProjectConfig> {
        let project_dir = project_dir.as_ref();
        if project_dir.join(PROJECT_CONFIG_FILENAME).exists() {
            Self::load(project_dir)
        } else {
            Ok(ProjectConfig {
                project_dir: project_dir.to_path_buf(),
                ..ProjectConfig::default()
            })
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = self.project_dir.join(PROJECT_CONFIG_FILENAME);
        tracing::debug!("Writing project config {:?}", path);
        write(path, toml::to_string(self)?)?;
        Ok(())
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Absolute source root.
    pub fn source_root_dir(&self) -> PathBuf {
        if self.source_root.is_absolute() {
            self.source_root.clone()
        } else {
            self.project_dir.join(&self.source_root)
        }
    }

    /// Tool paths for a build type, falling back to the `default` entry and
    /// then to built-in defaults.
    pub fn tool_paths(&self, build_type: &str) -> ToolPaths {
        self.tools
            .get(build_type)
            .or_else(|| self.tools.get("default"))
            .cloned()
            .unwrap_or_default()
    }

    /// Where compiled objects and archives for a build type live.
    pub fn intermediate_dir(&self, build_type: &str) -> PathBuf {
        self.project_dir.join(format!("obj-{build_type}"))
    }

    /// Where linked programs and shared libraries for a build type live.
    pub fn output_dir(&self, build_type: &str) -> PathBuf {
        self.project_dir.join(format!("out-{build_type}"))
    }

    pub fn component_types_path(&self) -> PathBuf {
        self.project_dir.join(COMPONENT_TYPES_FILENAME)
    }

    pub fn component_sources_path(&self) -> PathBuf {
        self.project_dir.join(COMPONENT_SOURCES_FILENAME)
    }

    pub fn build_packages_path(&self) -> PathBuf {
        self.project_dir.join(BUILD_PACKAGES_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_roundtrips_through_toml() {
        let dir = TempDir::new().unwrap();
        let mut config = ProjectConfig::load_or_default(dir.path()).unwrap();
        config.source_root = PathBuf::from("src");
        config.default_build_config = "dbg".to_string();
        config.exclude_dirs = vec!["/test/".to_string()];
        config.external_args = vec!["-I/pkgs/gtk/include".to_string()];
        config.tools.insert(
            "rls".to_string(),
            ToolPaths {
                compiler: "clang++".to_string(),
                ..ToolPaths::default()
            },
        );
        config.save().unwrap();

        let reread = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(reread, config);
        assert_eq!(reread.source_root_dir(), dir.path().join("src"));
        assert_eq!(reread.tool_paths("rls").compiler, "clang++");
        // Unconfigured build types fall back to defaults.
        assert_eq!(reread.tool_paths("dbg").compiler, "g++");
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        match ProjectConfig::load(dir.path()) {
            Err(MasonError::Config(_)) => {}
            other => panic!("expected Config error, got {other:?}"),
        }
        assert!(ProjectConfig::load_or_default(dir.path()).is_ok());
    }

    #[test]
    fn per_build_type_directories_are_distinct() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load_or_default(dir.path()).unwrap();
        assert_ne!(config.intermediate_dir("dbg"), config.intermediate_dir("rls"));
        assert_ne!(config.intermediate_dir("dbg"), config.output_dir("dbg"));
    }
}
