//! Directory-scoped component model.
//!
//! Every source-bearing directory under the project root defines a
//! component named by its path relative to the root (the root itself is
//! `<Root>`). Component metadata lives in two `key|value` stores: the types
//! file (`Comp-type-<name>`, `Comp-args-<name>`, the component name list)
//! kept by the user, and the source-list file (`Comp-src-<name>`,
//! `Comp-inc-<name>`) regenerated by each scan.

use crate::error::Result;
use crate::storage::{join_compound, split_compound, KeyValueFile};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

pub const ROOT_COMPONENT: &str = "<Root>";
const COMPONENT_NAMES_KEY: &str = "Components";

pub fn is_header(path: &Path) -> bool {
    matches!(extension(path), "h" | "hpp" | "hxx")
}

pub fn is_source(path: &Path) -> bool {
    matches!(extension(path), "cpp" | "cc" | "cxx" | "java")
}

pub fn is_library(path: &Path) -> bool {
    matches!(extension(path), "a" | "lib")
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// What a component builds into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentKind {
    #[default]
    Unknown,
    StaticLib,
    SharedLib,
    Program,
}

impl ComponentKind {
    pub fn as_file_value(self) -> &'static str {
        match self {
            ComponentKind::Unknown => "Unknown",
            ComponentKind::StaticLib => "StaticLib",
            ComponentKind::SharedLib => "SharedLib",
            ComponentKind::Program => "Program",
        }
    }

    pub fn from_file_value(value: &str) -> ComponentKind {
        match value {
            "StaticLib" => ComponentKind::StaticLib,
            "SharedLib" => ComponentKind::SharedLib,
            "Program" => ComponentKind::Program,
            _ => ComponentKind::Unknown,
        }
    }
}

/// True when `other` is `name` itself or a descendant at a path-segment
/// boundary: `Parameter` matches `Parameter/PLib` but never `ParameterSim`.
pub fn same_or_descendant(name: &str, other: &str) -> bool {
    other == name
        || (other.len() > name.len()
            && other.as_bytes()[name.len()] == b'/'
            && other.starts_with(name))
}

fn tag(kind: &str, comp_name: &str) -> String {
    format!("Comp-{kind}-{comp_name}")
}

#[derive(Debug, Default)]
pub struct ComponentTypes {
    types: KeyValueFile,
    files: KeyValueFile,
}

impl ComponentTypes {
    /// Read both stores. The source-list file is regenerated by every scan,
    /// so its absence is normal; the types file holds user choices and is
    /// also optional on a fresh project.
    pub fn read<P: AsRef<Path>, Q: AsRef<Path>>(
        types_path: P,
        source_list_path: Q,
    ) -> Result<ComponentTypes> {
        let mut types = KeyValueFile::new(types_path);
        types.read_or_default()?;
        let mut files = KeyValueFile::new(source_list_path);
        files.read_or_default()?;
        Ok(ComponentTypes { types, files })
    }

    pub fn write(&self) -> Result<()> {
        self.types.write()?;
        self.files.write()
    }

    pub fn component_names(&self) -> Vec<String> {
        split_compound(&self.types.get(COMPONENT_NAMES_KEY))
    }

    pub fn set_component_names<S: AsRef<str>>(&mut self, names: &[S]) {
        self.types.set(COMPONENT_NAMES_KEY, &join_compound(names));
    }

    pub fn any_components_defined(&self) -> bool {
        self.component_names()
            .iter()
            .any(|name| self.kind(name) != ComponentKind::Unknown)
    }

    pub fn kind(&self, comp_name: &str) -> ComponentKind {
        ComponentKind::from_file_value(&self.types.get(&tag("type", comp_name)))
    }

    /// Set a component's kind. A component and its ancestors/descendants
    /// cannot simultaneously build artifacts, so assigning a concrete kind
    /// coerces every strict ancestor and strict descendant to Unknown.
    pub fn set_kind(&mut self, comp_name: &str, kind: ComponentKind) {
        if kind != ComponentKind::Unknown && kind != self.kind(comp_name) {
            self.coerce_ancestors(comp_name);
            self.coerce_descendants(comp_name);
        }
        self.set_kind_raw(comp_name, kind);
    }

    fn set_kind_raw(&mut self, comp_name: &str, kind: ComponentKind) {
        self.types.set(&tag("type", comp_name), kind.as_file_value());
    }

    fn coerce_ancestors(&mut self, comp_name: &str) {
        let mut name = comp_name.to_string();
        while let Some(pos) = name.rfind('/') {
            name.truncate(pos);
            self.set_kind_raw(&name, ComponentKind::Unknown);
        }
    }

    fn coerce_descendants(&mut self, comp_name: &str) {
        for name in self.component_names() {
            if name != comp_name && same_or_descendant(comp_name, &name) {
                self.set_kind_raw(&name, ComponentKind::Unknown);
            }
        }
    }

    pub fn set_sources(&mut self, comp_name: &str, sources: &BTreeSet<String>) {
        self.files.set(&tag("src", comp_name), &join_compound(sources));
    }

    pub fn set_includes(&mut self, comp_name: &str, includes: &BTreeSet<String>) {
        self.files.set(&tag("inc", comp_name), &join_compound(includes));
    }

    /// Source files of the component and all its descendant components.
    pub fn component_sources(&self, comp_name: &str) -> Vec<String> {
        self.component_files(comp_name, "src")
    }

    /// Include files of the component and all its descendant components.
    pub fn component_includes(&self, comp_name: &str) -> Vec<String> {
        self.component_files(comp_name, "inc")
    }

    fn component_files(&self, comp_name: &str, kind: &str) -> Vec<String> {
        let mut files = Vec::new();
        for name in self.component_names() {
            if same_or_descendant(comp_name, &name) {
                files.extend(split_compound(&self.files.get(&tag(kind, &name))));
            }
        }
        files
    }

    pub fn build_args(&self, comp_name: &str) -> Vec<String> {
        split_compound(&self.types.get(&tag("args", comp_name)))
    }

    pub fn set_build_args<S: AsRef<str>>(&mut self, comp_name: &str, args: &[S]) {
        self.types.set(&tag("args", comp_name), &join_compound(args));
    }

    /// The directory holding the component's files: parent of its first
    /// source, falling back to its first include.
    pub fn component_dir(&self, comp_name: &str) -> Option<PathBuf> {
        let sources = self.component_sources(comp_name);
        let first = sources
            .first()
            .cloned()
            .or_else(|| self.component_includes(comp_name).first().cloned())?;
        Path::new(&first).parent().map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn types_in(dir: &Path) -> ComponentTypes {
        ComponentTypes::read(dir.join("comptypes.txt"), dir.join("compsources.txt")).unwrap()
    }

    #[test]
    fn descendant_match_respects_segment_boundaries() {
        assert!(same_or_descendant("Parameter", "Parameter"));
        assert!(same_or_descendant("Parameter", "Parameter/PLib"));
        assert!(same_or_descendant("Parameter", "Parameter/PLib/Deep"));
        assert!(!same_or_descendant("Parameter", "ParameterSim"));
        assert!(!same_or_descendant("Comm", "CommSim"));
        assert!(!same_or_descendant("Parameter/PLib", "Parameter"));
    }

    #[test]
    fn setting_a_kind_coerces_ancestors_to_unknown() {
        let dir = TempDir::new().unwrap();
        let mut types = types_in(dir.path());
        types.set_component_names(&["A", "A/B"]);
        types.set_kind("A", ComponentKind::Program);
        assert_eq!(types.kind("A"), ComponentKind::Program);

        types.set_kind("A/B", ComponentKind::StaticLib);
        assert_eq!(types.kind("A/B"), ComponentKind::StaticLib);
        assert_eq!(types.kind("A"), ComponentKind::Unknown);
    }

    #[test]
    fn setting_a_kind_coerces_descendants_to_unknown() {
        let dir = TempDir::new().unwrap();
        let mut types = types_in(dir.path());
        types.set_component_names(&["A", "A/B", "ASim"]);
        types.set_kind("A/B", ComponentKind::StaticLib);
        types.set_kind("ASim", ComponentKind::Program);

        types.set_kind("A", ComponentKind::Program);
        assert_eq!(types.kind("A"), ComponentKind::Program);
        assert_eq!(types.kind("A/B"), ComponentKind::Unknown);
        // A sibling sharing a name prefix is untouched.
        assert_eq!(types.kind("ASim"), ComponentKind::Program);
    }

    #[test]
    fn resetting_the_same_kind_does_not_coerce() {
        let dir = TempDir::new().unwrap();
        let mut types = types_in(dir.path());
        types.set_component_names(&["A", "A/B"]);
        types.set_kind("A/B", ComponentKind::StaticLib);
        types.set_kind_raw("A", ComponentKind::Unknown);

        types.set_kind("A/B", ComponentKind::StaticLib);
        assert_eq!(types.kind("A/B"), ComponentKind::StaticLib);
    }

    #[test]
    fn component_files_aggregate_descendants() {
        let dir = TempDir::new().unwrap();
        let mut types = types_in(dir.path());
        types.set_component_names(&["A", "A/B", "ASim"]);
        types.set_sources("A", &["/proj/A/a.cpp".to_string()].into_iter().collect());
        types.set_sources("A/B", &["/proj/A/B/b.cpp".to_string()].into_iter().collect());
        types.set_sources("ASim", &["/proj/ASim/s.cpp".to_string()].into_iter().collect());

        let sources = types.component_sources("A");
        assert_eq!(sources, vec!["/proj/A/a.cpp", "/proj/A/B/b.cpp"]);
        assert_eq!(types.component_dir("A"), Some(PathBuf::from("/proj/A")));
    }

    #[test]
    fn kinds_survive_a_write_read_cycle() {
        let dir = TempDir::new().unwrap();
        let mut types = types_in(dir.path());
        types.set_component_names(&[ROOT_COMPONENT]);
        types.set_kind(ROOT_COMPONENT, ComponentKind::SharedLib);
        types.set_build_args(ROOT_COMPONENT, &["-fPIC"]);
        types.write().unwrap();

        let reread = types_in(dir.path());
        assert_eq!(reread.kind(ROOT_COMPONENT), ComponentKind::SharedLib);
        assert_eq!(reread.build_args(ROOT_COMPONENT), vec!["-fPIC"]);
    }

    #[test]
    fn file_classification_by_extension() {
        assert!(is_header(Path::new("/p/a.hpp")));
        assert!(is_source(Path::new("/p/a.cxx")));
        assert!(is_source(Path::new("/p/A.java")));
        assert!(is_library(Path::new("/p/libx.a")));
        assert!(!is_source(Path::new("/p/a.h")));
        assert!(!is_header(Path::new("/p/noext")));
    }
}
