//! Link-order resolution from object symbol tables.
//!
//! Each library's symbol dump (`nm` style, `<address> <type-char> <name>`
//! lines) contributes defined (`D`/`T`) and undefined (`U`) symbol sets.
//! Resolving matches undefined references against definitions to build a
//! file dependency graph, which is then ordered so every supplier precedes
//! its clients. Three files persist each clump's resolution; consumers only
//! ever reread the `-Dep.txt` file.

use crate::error::{MasonError, Result};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write as _,
    path::{Path, PathBuf},
};

/// Clump name for the aggregate of all project static libraries.
pub const PROJECT_LIBS_CLUMP: &str = "ProjLibs";

/// One parsed symbol table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRecord {
    Defined(String),
    Undefined(String),
    Other,
}

impl SymbolRecord {
    /// Parse one dump line. Defined records carry an address field before
    /// the type char; undefined ones usually do not. Anything that is not a
    /// `D`/`T`/`U` record is Other and ignored by the resolver.
    pub fn parse(line: &str) -> SymbolRecord {
        let mut tokens = line.split_whitespace();
        let (type_char, name) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(t), Some(name), None) if t.len() == 1 => (t, name),
            (Some(_addr), Some(t), Some(name)) if t.len() == 1 => (t, name),
            _ => return SymbolRecord::Other,
        };
        match type_char {
            "D" | "T" => SymbolRecord::Defined(name.to_string()),
            "U" => SymbolRecord::Undefined(name.to_string()),
            _ => SymbolRecord::Other,
        }
    }
}

#[derive(Debug, Default)]
struct ClumpData {
    /// Library file paths; position is the file index.
    files: Vec<String>,
    /// Symbol name -> defining file index. First definition wins.
    defined: BTreeMap<String, usize>,
    /// Symbol name -> first referencing file index.
    undefined: BTreeMap<String, usize>,
    /// Client file index -> supplier file indices. Never holds an empty
    /// supplier set.
    dependencies: BTreeMap<usize, BTreeSet<usize>>,
}

impl ClumpData {
    /// Match defined symbols against undefined references. A reference is
    /// consumed by the first definition found, the way a linker satisfies a
    /// reference with the first definition among its ordered libraries.
    /// Same-file matches consume the reference but make no edge.
    fn resolve(&mut self) {
        for (name, def_file) in &self.defined {
            if let Some(ref_file) = self.undefined.remove(name) {
                if ref_file != *def_file {
                    self.dependencies.entry(ref_file).or_default().insert(*def_file);
                }
            }
        }
    }

    /// Produce a total order where every supplier precedes its clients:
    /// repeatedly take the first remaining file with no outstanding
    /// suppliers, append it, and erase it from every edge set. When a pass
    /// places nothing the remainder is a pure cycle; it is emitted at the
    /// front in discovery order, trading topological fidelity for a
    /// deterministic, duplicate-free result.
    fn order(&self) -> Vec<usize> {
        let mut deps = self.dependencies.clone();
        let mut remaining: Vec<usize> = (0..self.files.len()).collect();
        let mut placed = Vec::with_capacity(remaining.len());
        loop {
            let free = remaining
                .iter()
                .position(|file| !deps.contains_key(file));
            let Some(pos) = free else { break };
            let file = remaining.remove(pos);
            placed.push(file);
            deps.retain(|_, suppliers| {
                suppliers.remove(&file);
                !suppliers.is_empty()
            });
        }
        if !remaining.is_empty() {
            tracing::warn!(
                "Circular link dependencies among {:?}",
                remaining.iter().map(|i| &self.files[*i]).collect::<Vec<_>>()
            );
        }
        remaining.extend(placed);
        remaining
    }
}

/// Symbols for one named resolution unit. Shared across worker threads via
/// a mutex; each worker feeds it one library's dump at a time.
#[derive(Debug, Default)]
pub struct ClumpSymbols {
    data: Mutex<ClumpData>,
}

impl ClumpSymbols {
    pub fn new() -> ClumpSymbols {
        ClumpSymbols::default()
    }

    /// Merge one library's symbol dump. Thread safe; index assignment and
    /// the set merges happen under one lock so indices stay consistent.
    pub fn add_symbols(&self, lib_file_path: &str, dump_text: &str) {
        let mut data = self.data.lock();
        data.files.push(lib_file_path.to_string());
        let file_index = data.files.len() - 1;
        for line in dump_text.lines() {
            match SymbolRecord::parse(line) {
                SymbolRecord::Defined(name) => {
                    data.defined.entry(name).or_insert(file_index);
                }
                SymbolRecord::Undefined(name) => {
                    data.undefined.entry(name).or_insert(file_index);
                }
                SymbolRecord::Other => {}
            }
        }
    }

    /// Resolve, order, and persist the three clump files.
    pub fn write_clump_files(&self, clump_name: &str, out_dir: &Path) -> Result<()> {
        let mut data = self.data.lock();
        data.resolve();
        let order = data.order();

        let mut def = String::new();
        for (name, file) in &data.defined {
            let _ = writeln!(def, "{name} {file}");
        }
        std::fs::write(def_file_path(clump_name, out_dir), def)?;

        let mut undef = String::new();
        for (name, file) in &data.undefined {
            let _ = writeln!(undef, "{name} {file}");
        }
        std::fs::write(undef_file_path(clump_name, out_dir), undef)?;

        let mut dep = String::new();
        for file in &data.files {
            let _ = writeln!(dep, "f:{file}");
        }
        for (client, suppliers) in &data.dependencies {
            let _ = write!(dep, "d:{client}");
            for supplier in suppliers {
                let _ = write!(dep, " {supplier}");
            }
            dep.push('\n');
        }
        dep.push_str("o:");
        for file in &order {
            let _ = write!(dep, "{file} ");
        }
        dep.push('\n');
        std::fs::write(dep_file_path(clump_name, out_dir), dep)?;
        Ok(())
    }
}

fn clump_file_path(clump_name: &str, out_dir: &Path, suffix: &str) -> PathBuf {
    out_dir.join(format!("LibSym-{clump_name}-{suffix}.txt"))
}

pub fn def_file_path(clump_name: &str, out_dir: &Path) -> PathBuf {
    clump_file_path(clump_name, out_dir, "Def")
}

pub fn undef_file_path(clump_name: &str, out_dir: &Path) -> PathBuf {
    clump_file_path(clump_name, out_dir, "Undef")
}

pub fn dep_file_path(clump_name: &str, out_dir: &Path) -> PathBuf {
    clump_file_path(clump_name, out_dir, "Dep")
}

/// Library file paths in link order, from a clump's Dep file.
pub fn ordered_lib_file_names(clump_name: &str, out_dir: &Path) -> Result<Vec<String>> {
    let path = dep_file_path(clump_name, out_dir);
    let content = std::fs::read_to_string(&path)?;
    let mut files = Vec::new();
    let mut order = Vec::new();
    for line in content.lines() {
        if let Some(file) = line.strip_prefix("f:") {
            files.push(file.to_string());
        } else if let Some(indices) = line.strip_prefix("o:") {
            for tok in indices.split_whitespace() {
                let index: usize = tok.parse().map_err(|_| {
                    MasonError::Corrupt(format!("Bad order index {tok:?} in {path:?}"))
                })?;
                let file = files.get(index).ok_or_else(|| {
                    MasonError::Corrupt(format!("Order index {index} out of range in {path:?}"))
                })?;
                order.push(file.clone());
            }
        }
    }
    Ok(order)
}

/// Library names in link order plus their directories, deduplicated in
/// first-appearance order, ready for `-l`/`-L` assembly.
pub fn ordered_libs(clump_name: &str, out_dir: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let mut lib_dirs: Vec<String> = Vec::new();
    let mut lib_names = Vec::new();
    for file in ordered_lib_file_names(clump_name, out_dir)? {
        let path = Path::new(&file);
        if let Some(name) = path.file_name() {
            lib_names.push(name.to_string_lossy().to_string());
        }
        let dir = path
            .parent()
            .map(|d| d.to_string_lossy().to_string())
            .unwrap_or_default();
        if !dir.is_empty() && !lib_dirs.contains(&dir) {
            lib_dirs.push(dir);
        }
    }
    Ok((lib_dirs, lib_names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn symbol_lines_parse_into_tagged_records() {
        assert_eq!(
            SymbolRecord::parse("0000000000001040 T main"),
            SymbolRecord::Defined("main".to_string())
        );
        assert_eq!(
            SymbolRecord::parse("0000000000004010 D table"),
            SymbolRecord::Defined("table".to_string())
        );
        assert_eq!(
            SymbolRecord::parse("                 U printf"),
            SymbolRecord::Undefined("printf".to_string())
        );
        assert_eq!(SymbolRecord::parse("U printf"), SymbolRecord::Undefined("printf".to_string()));
        // Local and weak symbols are not significant.
        assert_eq!(SymbolRecord::parse("0000000000004000 d local"), SymbolRecord::Other);
        assert_eq!(SymbolRecord::parse("0000000000001000 W weak"), SymbolRecord::Other);
        assert_eq!(SymbolRecord::parse("not a symbol line at all"), SymbolRecord::Other);
        assert_eq!(SymbolRecord::parse(""), SymbolRecord::Other);
    }

    #[test]
    fn suppliers_precede_clients_in_link_order() {
        let dir = TempDir::new().unwrap();
        let clump = ClumpSymbols::new();
        // A defines x and uses y; B defines y.
        clump.add_symbols("/libs/libA.a", "0 T x\nU y\n");
        clump.add_symbols("/libs/libB.a", "0 T y\n");
        clump.write_clump_files("test", dir.path()).unwrap();

        let order = ordered_lib_file_names("test", dir.path()).unwrap();
        assert_eq!(order, vec!["/libs/libB.a", "/libs/libA.a"]);
    }

    #[test]
    fn cyclic_dependencies_still_produce_a_total_order() {
        let dir = TempDir::new().unwrap();
        let clump = ClumpSymbols::new();
        clump.add_symbols("/libs/libA.a", "0 T x\nU y\n");
        clump.add_symbols("/libs/libB.a", "0 T y\nU x\n");
        clump.write_clump_files("cycle", dir.path()).unwrap();

        let mut order = ordered_lib_file_names("cycle", dir.path()).unwrap();
        assert_eq!(order.len(), 2);
        order.sort();
        assert_eq!(order, vec!["/libs/libA.a", "/libs/libB.a"]);
    }

    #[test]
    fn same_file_references_consume_without_an_edge() {
        let dir = TempDir::new().unwrap();
        let clump = ClumpSymbols::new();
        // One library both defines and references x across its members.
        clump.add_symbols("/libs/libA.a", "0 T x\nU x\n");
        clump.add_symbols("/libs/libB.a", "0 T z\n");
        clump.write_clump_files("self", dir.path()).unwrap();

        let content = std::fs::read_to_string(dep_file_path("self", dir.path())).unwrap();
        assert!(!content.contains("d:"), "no dependency edge expected: {content}");
        // The consumed reference does not linger as undefined.
        let undef = std::fs::read_to_string(undef_file_path("self", dir.path())).unwrap();
        assert!(undef.is_empty());
    }

    #[test]
    fn first_definition_wins_for_duplicate_symbols() {
        let dir = TempDir::new().unwrap();
        let clump = ClumpSymbols::new();
        clump.add_symbols("/libs/libA.a", "0 T x\n");
        clump.add_symbols("/libs/libB.a", "0 T x\n");
        clump.add_symbols("/libs/libC.a", "U x\n");
        clump.write_clump_files("dup", dir.path()).unwrap();

        let content = std::fs::read_to_string(dep_file_path("dup", dir.path())).unwrap();
        // C depends on A (index 0), not B.
        assert!(content.contains("d:2 0"), "unexpected dep file: {content}");
    }

    #[test]
    fn ordered_libs_split_names_and_dedupe_dirs() {
        let dir = TempDir::new().unwrap();
        let clump = ClumpSymbols::new();
        clump.add_symbols("/libs/libA.a", "0 T x\nU y\n");
        clump.add_symbols("/libs/libB.a", "0 T y\nU z\n");
        clump.add_symbols("/other/libC.a", "0 T z\n");
        clump.write_clump_files("multi", dir.path()).unwrap();

        let (dirs, names) = ordered_libs("multi", dir.path()).unwrap();
        assert_eq!(names, vec!["libC.a", "libB.a", "libA.a"]);
        assert_eq!(dirs, vec!["/other", "/libs"]);
    }

    #[test]
    fn dep_file_lists_every_clients_suppliers() {
        let dir = TempDir::new().unwrap();
        let clump = ClumpSymbols::new();
        clump.add_symbols("/libs/libA.a", "U y\nU z\n");
        clump.add_symbols("/libs/libB.a", "0 T y\n");
        clump.add_symbols("/libs/libC.a", "0 T z\n");
        clump.write_clump_files("fan", dir.path()).unwrap();

        let content = std::fs::read_to_string(dep_file_path("fan", dir.path())).unwrap();
        assert!(content.contains("f:/libs/libA.a"));
        assert!(content.contains("d:0 1 2"), "unexpected dep file: {content}");
    }
}
