//! External package model.
//!
//! A package is an external dependency rooted at a directory, carrying
//! include dirs and library dirs relative to that root, library names, and
//! compile/link args. Packages start life in one of two states: fully
//! declared (pkg-config style, library names already in link order) or
//! wildcard-marked (`*` for include dirs or library names), meaning the
//! scanner must walk the root to discover them. Scanned libraries arrive as
//! absolute paths with no usable order; the builder orders them once via
//! symbol resolution and writes the result back, clearing the scanned list.

use crate::error::Result;
use crate::storage::{join_compound, split_compound, KeyValueFile};
use std::path::{Path, PathBuf};

const WILDCARD: &str = "*";
const PACKAGE_NAMES_KEY: &str = "Packages";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    name: String,
    root_dir: PathBuf,
    // Compound strings relative to the root; a bare `*` marks "scan me".
    include_dirs: String,
    lib_dirs: String,
    lib_names: String,
    scanned_lib_paths: String,
    compile_args: String,
    link_args: String,
}

impl Package {
    pub fn new<P: AsRef<Path>>(name: &str, root_dir: P) -> Package {
        Package {
            name: name.to_string(),
            root_dir: root_dir.as_ref().to_path_buf(),
            ..Package::default()
        }
    }

    /// A package whose contents must be discovered by scanning its root.
    pub fn new_undefined<P: AsRef<Path>>(name: &str, root_dir: P) -> Package {
        let mut pkg = Package::new(name, root_dir);
        pkg.include_dirs = WILDCARD.to_string();
        pkg.lib_names = WILDCARD.to_string();
        pkg
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn needs_incs(&self) -> bool {
        self.include_dirs == WILDCARD
    }

    pub fn needs_libs(&self) -> bool {
        self.lib_names == WILDCARD
    }

    pub fn needs_dir_scan(&self) -> bool {
        self.needs_incs() || self.needs_libs()
    }

    /// Drop any remaining wildcard markers once a scan has completed.
    pub fn clear_dir_scan(&mut self) {
        if self.needs_incs() {
            self.include_dirs.clear();
        }
        if self.needs_libs() {
            self.lib_names.clear();
        }
    }

    /// Library names are authoritative for link order either when declared
    /// by the user or once the builder has ordered the scanned paths.
    pub fn are_library_names_ordered(&self) -> bool {
        self.scanned_lib_paths.is_empty()
    }

    pub fn set_compile_info(&mut self, include_dirs: &str, compile_args: &str) {
        self.include_dirs = include_dirs.to_string();
        self.compile_args = compile_args.to_string();
    }

    pub fn set_link_info(&mut self, lib_dirs: &str, lib_names: &str, link_args: &str) {
        self.lib_dirs = lib_dirs.to_string();
        self.lib_names = lib_names.to_string();
        self.link_args = link_args.to_string();
    }

    /// Record a discovered include directory, stored relative to the root.
    pub fn append_absolute_inc_dir(&mut self, abs_dir: &Path) {
        let rel = self.relative_to_root(abs_dir);
        if self.needs_incs() {
            self.include_dirs.clear();
        }
        let mut dirs = split_compound(&self.include_dirs);
        if !dirs.iter().any(|d| *d == rel) {
            dirs.push(rel);
            self.include_dirs = join_compound(&dirs);
        }
    }

    /// Record a discovered library file by absolute path, pending ordering.
    pub fn append_absolute_lib_path(&mut self, abs_path: &Path) {
        let mut paths = split_compound(&self.scanned_lib_paths);
        let path = abs_path.to_string_lossy().to_string();
        if !paths.contains(&path) {
            paths.push(path);
            self.scanned_lib_paths = join_compound(&paths);
        }
    }

    /// Install the link order the symbol resolver produced, replacing the
    /// unordered scanned paths.
    pub fn set_ordered_libs<S: AsRef<str>>(&mut self, lib_dirs: &[S], lib_names: &[S]) {
        let rel_dirs: Vec<String> = lib_dirs
            .iter()
            .map(|d| self.relative_to_root(Path::new(d.as_ref())))
            .collect();
        self.lib_dirs = join_compound(&rel_dirs);
        self.lib_names = join_compound(lib_names);
        self.scanned_lib_paths.clear();
    }

    fn relative_to_root(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root_dir) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().to_string(),
        }
    }

    fn root_joined(&self, compound: &str) -> Vec<PathBuf> {
        split_compound(compound)
            .iter()
            .filter(|dir| *dir != WILDCARD)
            .map(|dir| {
                if dir == "." {
                    self.root_dir.clone()
                } else {
                    self.root_dir.join(dir)
                }
            })
            .collect()
    }

    /// Absolute include directories (root-joined).
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        self.root_joined(&self.include_dirs)
    }

    /// Absolute library directories (root-joined).
    pub fn library_dirs(&self) -> Vec<PathBuf> {
        self.root_joined(&self.lib_dirs)
    }

    pub fn library_names(&self) -> Vec<String> {
        split_compound(&self.lib_names)
            .into_iter()
            .filter(|name| name != WILDCARD)
            .collect()
    }

    pub fn scanned_library_file_paths(&self) -> Vec<PathBuf> {
        split_compound(&self.scanned_lib_paths)
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    pub fn compile_args(&self) -> Vec<String> {
        split_compound(&self.compile_args)
    }

    pub fn link_args(&self) -> Vec<String> {
        split_compound(&self.link_args)
    }
}

fn pkg_tag(field: &str, name: &str) -> String {
    format!("Pkg-{field}-{name}")
}

/// The persisted set of packages a build references, in declared order.
/// Declared order doubles as link-order priority when merging `-l` args.
#[derive(Debug, Default)]
pub struct BuildPackages {
    store: KeyValueFile,
}

impl BuildPackages {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<BuildPackages> {
        let mut store = KeyValueFile::new(path);
        store.read_or_default()?;
        Ok(BuildPackages { store })
    }

    pub fn save(&self) -> Result<()> {
        self.store.write()
    }

    pub fn package_names(&self) -> Vec<String> {
        split_compound(&self.store.get(PACKAGE_NAMES_KEY))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.package_names().iter().any(|n| n == name)
    }

    /// Position in the declared package list, used to merge link arguments
    /// by priority.
    pub fn link_order_index(&self, name: &str) -> Option<usize> {
        self.package_names().iter().position(|n| n == name)
    }

    pub fn insert(&mut self, pkg: &Package) {
        let mut names = self.package_names();
        if !names.iter().any(|n| n == pkg.name()) {
            names.push(pkg.name().to_string());
            self.store.set(PACKAGE_NAMES_KEY, &join_compound(&names));
        }
        self.store
            .set(&pkg_tag("root", &pkg.name), &pkg.root_dir.to_string_lossy());
        self.store.set(&pkg_tag("incs", &pkg.name), &pkg.include_dirs);
        self.store.set(&pkg_tag("libdirs", &pkg.name), &pkg.lib_dirs);
        self.store.set(&pkg_tag("libnames", &pkg.name), &pkg.lib_names);
        self.store
            .set(&pkg_tag("scannedlibs", &pkg.name), &pkg.scanned_lib_paths);
        self.store
            .set(&pkg_tag("compileargs", &pkg.name), &pkg.compile_args);
        self.store.set(&pkg_tag("linkargs", &pkg.name), &pkg.link_args);
    }

    pub fn package(&self, name: &str) -> Option<Package> {
        if !self.contains(name) {
            return None;
        }
        Some(Package {
            name: name.to_string(),
            root_dir: PathBuf::from(self.store.get(&pkg_tag("root", name))),
            include_dirs: self.store.get(&pkg_tag("incs", name)),
            lib_dirs: self.store.get(&pkg_tag("libdirs", name)),
            lib_names: self.store.get(&pkg_tag("libnames", name)),
            scanned_lib_paths: self.store.get(&pkg_tag("scannedlibs", name)),
            compile_args: self.store.get(&pkg_tag("compileargs", name)),
            link_args: self.store.get(&pkg_tag("linkargs", name)),
        })
    }

    pub fn packages(&self) -> Vec<Package> {
        self.package_names()
            .iter()
            .filter_map(|name| self.package(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn undefined_packages_request_a_scan() {
        let pkg = Package::new_undefined("gtk", "/pkgs/gtk");
        assert!(pkg.needs_incs());
        assert!(pkg.needs_libs());
        assert!(pkg.needs_dir_scan());
        assert!(pkg.include_dirs().is_empty());
    }

    #[test]
    fn scan_results_replace_wildcards() {
        let mut pkg = Package::new_undefined("gtk", "/pkgs/gtk");
        pkg.append_absolute_inc_dir(Path::new("/pkgs/gtk/include"));
        pkg.append_absolute_inc_dir(Path::new("/pkgs/gtk/include"));
        pkg.append_absolute_lib_path(Path::new("/pkgs/gtk/lib/libgtk-3.a"));
        pkg.clear_dir_scan();

        assert!(!pkg.needs_dir_scan());
        assert_eq!(pkg.include_dirs(), vec![PathBuf::from("/pkgs/gtk/include")]);
        assert_eq!(
            pkg.scanned_library_file_paths(),
            vec![PathBuf::from("/pkgs/gtk/lib/libgtk-3.a")]
        );
        // Scanned paths exist, so names are not yet in link order.
        assert!(!pkg.are_library_names_ordered());
    }

    #[test]
    fn ordering_libs_consumes_the_scanned_paths() {
        let mut pkg = Package::new_undefined("gtk", "/pkgs/gtk");
        pkg.append_absolute_lib_path(Path::new("/pkgs/gtk/lib/libgdk.a"));
        pkg.append_absolute_lib_path(Path::new("/pkgs/gtk/lib/libgtk-3.a"));

        pkg.set_ordered_libs(&["/pkgs/gtk/lib"], &["gtk-3.a", "gdk.a"]);
        assert!(pkg.are_library_names_ordered());
        assert_eq!(pkg.library_names(), vec!["gtk-3.a", "gdk.a"]);
        assert_eq!(pkg.library_dirs(), vec![PathBuf::from("/pkgs/gtk/lib")]);
        assert!(pkg.scanned_library_file_paths().is_empty());
    }

    #[test]
    fn declared_packages_keep_their_order_as_link_priority() {
        let dir = TempDir::new().unwrap();
        let mut pkgs = BuildPackages::read(dir.path().join("buildpkgs.txt")).unwrap();
        pkgs.insert(&Package::new("zlib", "/pkgs/zlib"));
        pkgs.insert(&Package::new("gtk", "/pkgs/gtk"));
        pkgs.insert(&Package::new("zlib", "/pkgs/zlib"));

        assert_eq!(pkgs.package_names(), vec!["zlib", "gtk"]);
        assert_eq!(pkgs.link_order_index("gtk"), Some(1));
        assert_eq!(pkgs.link_order_index("absent"), None);
    }

    #[test]
    fn packages_roundtrip_through_the_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buildpkgs.txt");
        let mut pkg = Package::new("gtk", "/pkgs/gtk");
        pkg.set_compile_info("include;include/gtk-3.0;", "-pthread;");
        pkg.set_link_info("lib;", "gtk-3;gdk;", "-Wl,--export-dynamic;");

        let mut pkgs = BuildPackages::read(&path).unwrap();
        pkgs.insert(&pkg);
        pkgs.save().unwrap();

        let reread = BuildPackages::read(&path).unwrap();
        let loaded = reread.package("gtk").unwrap();
        assert_eq!(loaded, pkg);
        assert_eq!(
            loaded.include_dirs(),
            vec![
                PathBuf::from("/pkgs/gtk/include"),
                PathBuf::from("/pkgs/gtk/include/gtk-3.0")
            ]
        );
        assert_eq!(loaded.link_args(), vec!["-Wl,--export-dynamic"]);
    }
}
