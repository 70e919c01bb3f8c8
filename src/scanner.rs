//! Source tree and package scanning.
//!
//! The project scan walks the source root, classifies files by extension,
//! and groups them into components by directory. The external scan walks a
//! package root to discover candidate include roots and library files for
//! packages declared with wildcard markers.

use crate::components::{is_header, is_library, is_source, ComponentTypes, ROOT_COMPONENT};
use crate::error::Result;
use crate::packages::Package;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Render a directory as an include-dir string with a trailing separator,
/// the form stored in the include dependency map.
pub fn dir_string(path: &Path) -> String {
    let mut s = path.to_string_lossy().to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

/// Split a root search string of the form `/root/!/excl1/!/excl2/` into the
/// root directory and its exclude substrings.
pub fn parse_root_search(arg: &str) -> (PathBuf, Vec<String>) {
    let mut tokens = arg.split('!');
    let root = PathBuf::from(tokens.next().unwrap_or(""));
    let excludes = tokens
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    (root, excludes)
}

/// What a project scan found, beyond what it persisted into the component
/// stores.
#[derive(Debug, Default)]
pub struct ScannedProject {
    /// Directories containing project headers, in discovery order.
    pub project_include_dirs: Vec<String>,
    /// Component name -> source files.
    pub sources: BTreeMap<String, BTreeSet<String>>,
    /// Component name -> include files.
    pub includes: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug)]
pub struct ComponentScanner {
    source_root: PathBuf,
    exclude_substrings: Vec<String>,
}

impl ComponentScanner {
    pub fn new<P: AsRef<Path>>(source_root: P, exclude_substrings: Vec<String>) -> ComponentScanner {
        ComponentScanner {
            source_root: source_root.as_ref().to_path_buf(),
            exclude_substrings,
        }
    }

    /// Substring-based exclusion; matching directories are pruned entirely.
    fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude_substrings.iter().any(|ex| path.contains(ex.as_str()))
    }

    /// The component owning a file: the file's directory relative to the
    /// source root, or `<Root>` at the root itself.
    fn component_name(&self, file: &Path) -> String {
        let dir = file.parent().unwrap_or(Path::new(""));
        match dir.strip_prefix(&self.source_root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => ROOT_COMPONENT.to_string(),
        }
    }

    /// Walk the source root, grouping files into components and recording
    /// project include directories in discovery order. Persists the updated
    /// component names and file lists into `types`.
    pub fn scan_project(&self, types: &mut ComponentTypes) -> Result<ScannedProject> {
        let mut scanned = ScannedProject::default();
        for entry in WalkDir::new(&self.source_root)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path()))
        {
            let entry = entry.map_err(|e| {
                crate::error::MasonError::Io(format!("Scan failed under {:?}: {e}", self.source_root))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let file = path.to_string_lossy().to_string();
            if is_source(path) {
                let name = self.component_name(path);
                scanned.sources.entry(name).or_default().insert(file);
            } else if is_header(path) {
                let dir = dir_string(path.parent().unwrap_or(Path::new("")));
                if !scanned.project_include_dirs.contains(&dir) {
                    scanned.project_include_dirs.push(dir);
                }
                let name = self.component_name(path);
                scanned.includes.entry(name).or_default().insert(file);
            }
        }

        // Every file-bearing directory and all its ancestors are components,
        // merged with any the user already configured.
        let mut names: BTreeSet<String> = types.component_names().into_iter().collect();
        for name in scanned.sources.keys().chain(scanned.includes.keys()) {
            names.insert(name.clone());
            let mut ancestor = name.as_str();
            while let Some(pos) = ancestor.rfind('/') {
                ancestor = &ancestor[..pos];
                names.insert(ancestor.to_string());
            }
        }
        let names: Vec<String> = names.into_iter().collect();
        types.set_component_names(&names);
        for name in &names {
            types.set_sources(name, scanned.sources.get(name).unwrap_or(&BTreeSet::new()));
            types.set_includes(name, scanned.includes.get(name).unwrap_or(&BTreeSet::new()));
        }
        tracing::info!(
            "Scanned {:?}: {} components, {} include dirs",
            self.source_root,
            names.len(),
            scanned.project_include_dirs.len()
        );
        Ok(scanned)
    }

    /// Walk a package root, resolving its wildcard markers. Headers add
    /// candidate include roots (the header's directory, its parent, and its
    /// grandparent, covering `gtk/gtk.h` and `llvm/ADT/APInt.h` style
    /// spellings); archives add scanned library paths pending link ordering.
    pub fn scan_external_package(&self, pkg: &mut Package) -> Result<()> {
        let add_incs = pkg.needs_incs();
        let add_libs = pkg.needs_libs();
        if !add_incs && !add_libs {
            return Ok(());
        }
        let root = pkg.root_dir().to_path_buf();
        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if add_incs && is_header(path) {
                let mut candidate = path.parent();
                for _ in 0..3 {
                    match candidate {
                        Some(dir) if dir.starts_with(&root) => {
                            pkg.append_absolute_inc_dir(dir);
                            candidate = dir.parent();
                        }
                        _ => break,
                    }
                }
            } else if add_libs && is_library(path) {
                pkg.append_absolute_lib_path(path);
            }
        }
        pkg.clear_dir_scan();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentKind;
    use std::fs;
    use tempfile::TempDir;
    use test_log::test;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn root_search_strings_carry_excludes() {
        let (root, excludes) = parse_root_search("/usr/lib/llvm!/build/!/test/");
        assert_eq!(root, PathBuf::from("/usr/lib/llvm"));
        assert_eq!(excludes, vec!["/build/", "/test/"]);

        let (root, excludes) = parse_root_search("/usr/include");
        assert_eq!(root, PathBuf::from("/usr/include"));
        assert!(excludes.is_empty());
    }

    #[test]
    fn project_scan_groups_files_into_components() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("main.cpp"));
        touch(&root.join("util/strings.cpp"));
        touch(&root.join("util/deep/extra.cpp"));
        touch(&root.join("inc/api.h"));
        touch(&root.join("skipme/ignored.cpp"));
        touch(&root.join("notes.txt"));

        let mut types = ComponentTypes::read(
            root.join("comptypes.txt"),
            root.join("compsources.txt"),
        )
        .unwrap();
        let scanner = ComponentScanner::new(root, vec!["skipme".to_string()]);
        let scanned = scanner.scan_project(&mut types).unwrap();

        let names = types.component_names();
        assert!(names.contains(&ROOT_COMPONENT.to_string()));
        assert!(names.contains(&"util".to_string()));
        assert!(names.contains(&"util/deep".to_string()));
        assert!(names.contains(&"inc".to_string()));
        assert!(!names.iter().any(|n| n.contains("skipme")));

        // Aggregation pulls descendant sources up to the parent component.
        let util_sources = types.component_sources("util");
        assert_eq!(util_sources.len(), 2);
        assert_eq!(scanned.project_include_dirs, vec![dir_string(&root.join("inc"))]);
    }

    #[test]
    fn rescans_preserve_user_component_kinds() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("util/strings.cpp"));

        let mut types = ComponentTypes::read(
            root.join("comptypes.txt"),
            root.join("compsources.txt"),
        )
        .unwrap();
        types.set_component_names(&["util"]);
        types.set_kind("util", ComponentKind::StaticLib);

        let scanner = ComponentScanner::new(root, Vec::new());
        scanner.scan_project(&mut types).unwrap();
        assert_eq!(types.kind("util"), ComponentKind::StaticLib);
    }

    #[test]
    fn external_scan_discovers_nested_include_roots() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("gtk");
        touch(&root.join("include/gtk-3.0/gtk/gtk.h"));
        touch(&root.join("lib/libgtk-3.a"));

        let mut pkg = Package::new_undefined("gtk", &root);
        let scanner = ComponentScanner::new(dir.path(), Vec::new());
        scanner.scan_external_package(&mut pkg).unwrap();

        let incs = pkg.include_dirs();
        // Header dir, parent, and grandparent are all candidates.
        assert!(incs.contains(&root.join("include/gtk-3.0/gtk")));
        assert!(incs.contains(&root.join("include/gtk-3.0")));
        assert!(incs.contains(&root.join("include")));
        assert_eq!(
            pkg.scanned_library_file_paths(),
            vec![root.join("lib/libgtk-3.a")]
        );
        assert!(!pkg.needs_dir_scan());
    }

    #[test]
    fn fully_declared_packages_are_not_rescanned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("zlib");
        touch(&root.join("include/zlib.h"));

        let mut pkg = Package::new("zlib", &root);
        pkg.set_compile_info("include;", "");
        let before = pkg.clone();
        let scanner = ComponentScanner::new(dir.path(), Vec::new());
        scanner.scan_external_package(&mut pkg).unwrap();
        assert_eq!(pkg, before);
    }
}
