//! Persisted include dependency map.
//!
//! The analyzer subprocesses record, for every file they parse, the set of
//! files it directly includes. Rows are
//! `includer|changedTime;checkedTime;(incDir;spelling)*`. The builder reads
//! the map lazily to derive transitive include closures, staleness inputs,
//! and ordered `-I` lists. Writers merge over the on-disk state under an
//! exclusive lock so concurrent analyzer processes never lose each other's
//! rows.

use crate::error::Result;
use crate::storage::{join_compound, split_compound, KeyValueFile};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

/// A resolved include: the full path to the included file plus the length of
/// the include-directory portion. The remainder of the full path is the
/// spelling as written in the source, which can span directories
/// (`#include <gtk/gtk.h>` resolved under `/usr/include/gtk-3.0/` keeps
/// `gtk/gtk.h` as its spelling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedPath {
    full_path: String,
    dir_len: usize,
}

impl IncludedPath {
    pub fn new(inc_dir: &str, spelling: &str) -> IncludedPath {
        let mut full_path = inc_dir.to_string();
        let dir_len = full_path.len();
        full_path.push_str(spelling);
        IncludedPath { full_path, dir_len }
    }

    /// The search directory the compiler needed to resolve the spelling.
    pub fn inc_dir(&self) -> &str {
        &self.full_path[..self.dir_len]
    }

    /// The include path as written in the source.
    pub fn spelling(&self) -> &str {
        &self.full_path[self.dir_len..]
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }
}

// Deduplication is by full path only; the same file reached through two
// different search dirs is one include.
impl Ord for IncludedPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.full_path.cmp(&other.full_path)
    }
}

impl PartialOrd for IncludedPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Split a row value into its two time fields and include pairs. A value
/// with the wrong stride is reported and treated as absent; one corrupt row
/// never aborts a scan.
fn parse_row(includer: &str, value: &str) -> Option<(u64, u64, Vec<IncludedPath>)> {
    let parts = split_compound(value);
    if parts.len() < 2 || parts.len() % 2 != 0 {
        tracing::error!("Bad include map entry for {}: {}", includer, value);
        return None;
    }
    let changed = parts[0].parse().unwrap_or(0);
    let checked = parts[1].parse().unwrap_or(0);
    let includes = parts[2..]
        .chunks(2)
        .map(|pair| IncludedPath::new(&pair[0], &pair[1]))
        .collect();
    Some((changed, checked, includes))
}

#[derive(Debug, Default)]
pub struct IncludeDependencyMap {
    store: KeyValueFile,
}

impl IncludeDependencyMap {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<IncludeDependencyMap> {
        let mut store = KeyValueFile::new(path);
        store.read_or_default()?;
        Ok(IncludeDependencyMap { store })
    }

    /// One level of include resolution. Missing entries yield an empty set.
    pub fn immediate_includes(&self, src_file: &str) -> BTreeSet<IncludedPath> {
        let mut includes = BTreeSet::new();
        self.collect_immediate(src_file, &mut includes);
        includes
    }

    fn collect_immediate(&self, src_file: &str, includes: &mut BTreeSet<IncludedPath>) {
        if let Some(value) = self.store.value(src_file) {
            if let Some((_, _, row_includes)) = parse_row(src_file, value) {
                includes.extend(row_includes);
            }
        }
    }

    /// The full transitive include closure. The result set doubles as the
    /// visited set: recursion happens only when an insertion was novel, so
    /// cyclic maps terminate and shared subgraphs are walked once.
    pub fn nested_includes(&self, src_file: &str) -> BTreeSet<IncludedPath> {
        let mut includes = BTreeSet::new();
        self.collect_nested(src_file, &mut includes);
        includes
    }

    fn collect_nested(&self, src_file: &str, includes: &mut BTreeSet<IncludedPath>) {
        for inc in self.immediate_includes(src_file) {
            let full_path = inc.full_path().to_string();
            if includes.insert(inc) {
                self.collect_nested(&full_path, includes);
            }
        }
    }

    /// The closure projected onto include directories, sorted.
    pub fn nested_include_dirs(&self, src_file: &str) -> Vec<String> {
        let dirs: BTreeSet<String> = self
            .nested_includes(src_file)
            .iter()
            .map(|inc| inc.inc_dir().to_string())
            .collect();
        dirs.into_iter().collect()
    }

    /// All includer files whose row key sits directly in `dir`.
    pub fn files_defined_in_directory(&self, dir: &str) -> Vec<String> {
        let match_dir = Path::new(dir);
        self.store
            .keys()
            .filter(|key| Path::new(key).parent() == Some(match_dir))
            .cloned()
            .collect()
    }

    /// True iff any file transitively included from any source in `dir`
    /// resolves through a directory that is a substring of one of `roots`.
    /// The visited memo is shared across all the directory's sources so
    /// overlapping closures are walked once.
    pub fn any_root_dirs_match(&self, roots: &[String], dir: &str) -> bool {
        let mut visited = BTreeSet::new();
        self.files_defined_in_directory(dir)
            .iter()
            .any(|src| self.any_root_dirs_match_source(roots, &mut visited, src))
    }

    fn any_root_dirs_match_source(
        &self,
        roots: &[String],
        visited: &mut BTreeSet<String>,
        src_file: &str,
    ) -> bool {
        for inc in self.immediate_includes(src_file) {
            if visited.insert(inc.full_path().to_string()) {
                if roots.iter().any(|root| root.contains(inc.inc_dir())) {
                    return true;
                }
                if self.any_root_dirs_match_source(roots, visited, inc.full_path()) {
                    return true;
                }
            }
        }
        false
    }

    /// Order the source file's transitive include directories by the
    /// priority of the root they fall under. Each directory is assigned to
    /// the longest matching root; directories are emitted grouped in
    /// root-list order, ties within a root in closure order. Directories
    /// matching no root are dropped (they are outside every known package
    /// and project tree, so the compiler's default search path covers them).
    pub fn ordered_include_dirs_for_source(
        &self,
        src_file: &str,
        ordered_roots: &[String],
    ) -> Vec<String> {
        let unordered = self.nested_include_dirs(src_file);
        let mut match_index = vec![None; unordered.len()];
        for (dir_i, dir) in unordered.iter().enumerate() {
            let mut match_len = 0;
            for (root_i, root) in ordered_roots.iter().enumerate() {
                if dir.contains(root.as_str()) && root.len() > match_len {
                    match_len = root.len();
                    match_index[dir_i] = Some(root_i);
                }
            }
        }
        let mut ordered = Vec::new();
        for root_i in 0..ordered_roots.len() {
            for (dir_i, dir) in unordered.iter().enumerate() {
                if match_index[dir_i] == Some(root_i) {
                    ordered.push(dir.clone());
                }
            }
        }
        ordered
    }
}

/// Accumulates include events from one analyzer run, then merges them into
/// the shared map file. Every parsed includer gets a fresh `checked` time;
/// `changed` is preserved whenever the included set is identical to the
/// previous parse, so downstream staleness checks see real edits only.
#[derive(Debug)]
pub struct IncludeMapWriter {
    path: PathBuf,
    parsed: BTreeMap<String, BTreeSet<IncludedPath>>,
}

impl IncludeMapWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> IncludeMapWriter {
        IncludeMapWriter {
            path: path.as_ref().to_path_buf(),
            parsed: BTreeMap::new(),
        }
    }

    /// Record one resolved include event for an includer. Recording an
    /// includer with no events (a file with no includes) is expressed by
    /// `record_parsed`.
    pub fn record(&mut self, includer: &str, inc_dir: &str, spelling: &str) {
        self.parsed
            .entry(includer.to_string())
            .or_default()
            .insert(IncludedPath::new(inc_dir, spelling));
    }

    /// Mark an includer as fully parsed even if it included nothing, so a
    /// file whose includes were all removed still gets its row replaced.
    pub fn record_parsed(&mut self, includer: &str) {
        self.parsed.entry(includer.to_string()).or_default();
    }

    pub fn flush(&mut self) -> Result<()> {
        self.flush_at(now_secs())
    }

    /// Merge the accumulated rows into the on-disk map at time `now`,
    /// under the exclusive lock.
    pub fn flush_at(&mut self, now: u64) -> Result<()> {
        let mut store = KeyValueFile::new(&self.path);
        let parsed = std::mem::take(&mut self.parsed);
        store.update_exclusive(|values| {
            for (includer, includes) in &parsed {
                let changed = match values.get(includer).and_then(|v| parse_row(includer, v)) {
                    Some((changed, _, prev)) if prev.iter().cloned().collect::<BTreeSet<_>>() == *includes => changed,
                    _ => now,
                };
                let mut parts = vec![changed.to_string(), now.to_string()];
                for inc in includes {
                    parts.push(inc.inc_dir().to_string());
                    parts.push(inc.spelling().to_string());
                }
                values.insert(includer.clone(), join_compound(&parts));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_row(writer: &mut IncludeMapWriter, includer: &str, includes: &[(&str, &str)]) {
        writer.record_parsed(includer);
        for (dir, spelling) in includes {
            writer.record(includer, dir, spelling);
        }
    }

    #[test]
    fn included_path_splits_dir_and_spelling() {
        let inc = IncludedPath::new("/usr/include/gtk-3.0/", "gtk/gtk.h");
        assert_eq!(inc.inc_dir(), "/usr/include/gtk-3.0/");
        assert_eq!(inc.spelling(), "gtk/gtk.h");
        assert_eq!(inc.full_path(), "/usr/include/gtk-3.0/gtk/gtk.h");
    }

    #[test]
    fn nested_includes_terminate_on_cycles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/a.h", &[("/proj/", "b.h")]);
        write_row(&mut writer, "/proj/b.h", &[("/proj/", "a.h")]);
        writer.flush_at(100).unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        let closure = map.nested_includes("/proj/a.h");
        let full_paths: Vec<&str> = closure.iter().map(|i| i.full_path()).collect();
        assert_eq!(full_paths, vec!["/proj/a.h", "/proj/b.h"]);
    }

    #[test]
    fn nested_includes_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/main.cpp", &[("/proj/", "a.h"), ("/proj/", "b.h")]);
        write_row(&mut writer, "/proj/a.h", &[("/proj/", "c.h")]);
        writer.flush_at(100).unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        let first = map.nested_includes("/proj/main.cpp");
        let second = map.nested_includes("/proj/main.cpp");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn changed_time_is_stable_across_identical_rewrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");

        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/main.cpp", &[("/proj/inc/", "a.h")]);
        writer.flush_at(100).unwrap();

        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/main.cpp", &[("/proj/inc/", "a.h")]);
        writer.flush_at(200).unwrap();

        let mut store = KeyValueFile::new(&path);
        store.read().unwrap();
        let parts = split_compound(&store.get("/proj/main.cpp"));
        assert_eq!(parts[0], "100", "changed time must survive an identical rewrite");
        assert_eq!(parts[1], "200", "checked time must advance");

        // A real change bumps the changed time.
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/main.cpp", &[("/proj/inc/", "b.h")]);
        writer.flush_at(300).unwrap();
        store.read().unwrap();
        let parts = split_compound(&store.get("/proj/main.cpp"));
        assert_eq!(parts[0], "300");
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        // Odd stride after the two time fields.
        std::fs::write(&path, "/proj/bad.cpp|100;100;/proj/;\n/proj/good.cpp|100;100;/proj/;a.h;\n")
            .unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        assert!(map.immediate_includes("/proj/bad.cpp").is_empty());
        assert_eq!(map.immediate_includes("/proj/good.cpp").len(), 1);
    }

    #[test]
    fn ordered_dirs_follow_root_priority_not_discovery_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        // foo.cpp includes bar.h (root R1), bar.h includes baz.h (root R2).
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/foo.cpp", &[("/roots/r1/", "bar.h")]);
        write_row(&mut writer, "/roots/r1/bar.h", &[("/roots/r2/", "baz.h")]);
        writer.flush_at(100).unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        let roots = vec!["/roots/r2/".to_string(), "/roots/r1/".to_string()];
        let ordered = map.ordered_include_dirs_for_source("/proj/foo.cpp", &roots);
        assert_eq!(ordered, vec!["/roots/r2/", "/roots/r1/"]);
    }

    #[test]
    fn longest_matching_root_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/foo.cpp", &[("/proj/inc/sub/", "deep.h")]);
        writer.flush_at(100).unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        // The shorter root comes first; the dir must still land in the
        // longer root's bucket.
        let roots = vec!["/proj/inc/".to_string(), "/proj/inc/sub/".to_string()];
        let ordered = map.ordered_include_dirs_for_source("/proj/foo.cpp", &roots);
        assert_eq!(ordered, vec!["/proj/inc/sub/"]);
    }

    #[test]
    fn dirs_outside_all_roots_are_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/foo.cpp", &[("/usr/include/", "stdio.h")]);
        writer.flush_at(100).unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        let roots = vec!["/proj/inc/".to_string()];
        assert!(map.ordered_include_dirs_for_source("/proj/foo.cpp", &roots).is_empty());
    }

    #[test]
    fn root_match_searches_transitively_from_directory_sources() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incdeps.txt");
        let mut writer = IncludeMapWriter::new(&path);
        write_row(&mut writer, "/proj/comp/foo.cpp", &[("/proj/inc/", "a.h")]);
        write_row(&mut writer, "/proj/inc/a.h", &[("/pkgs/gtk/include/", "gtk/gtk.h")]);
        writer.flush_at(100).unwrap();

        let map = IncludeDependencyMap::read(&path).unwrap();
        let gtk_roots = vec!["/pkgs/gtk/include/".to_string()];
        let qt_roots = vec!["/pkgs/qt/include/".to_string()];
        assert!(map.any_root_dirs_match(&gtk_roots, "/proj/comp"));
        assert!(!map.any_root_dirs_match(&qt_roots, "/proj/comp"));
    }
}
