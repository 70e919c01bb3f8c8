//! Build configuration change detection.
//!
//! Each build type (analysis, debug, release, custom) stores one row of five
//! semicolon-joined argument checksums, in [`CrcKind`] order:
//!
//! ```text
//! dbg|<analysis>;<extpath>;<projpath>;<link>;<other>
//! <crc>|<args>
//! ```
//!
//! The `<crc>|<args>` rows content-address every argument set ever seen, so
//! two build types sharing an argument set share one row, and a superseded
//! set can be found and its analysis directory reclaimed. Comparing one
//! checksum per group tells the builder the smallest thing that must be
//! discarded when arguments change.

use crate::error::Result;
use crate::storage::{join_compound, split_compound, KeyValueFile};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const BUILD_CONFIG_FILENAME: &str = "mason-buildconfig.txt";
pub const INC_DEPS_FILENAME: &str = "mason-incdeps.txt";
const ANALYSIS_DIR_PREFIX: &str = "analysis-";

// Refuse to propose deletion of suspiciously short paths.
const MIN_DELETE_PATH_LEN: usize = 6;

/// Checksum over a canonicalized argument string, rendered as a decimal
/// string for use both as a row value and as a content-address key.
pub fn argument_crc(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(low).to_string()
}

/// The argument groups tracked per build type. Order matches the on-disk
/// row layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcKind {
    /// Derived from ExtPath + ProjPath, never independently authoritative.
    /// Names the analysis directory.
    Analysis,
    /// External package paths (-I, -ER, -D). A change invalidates analysis.
    ExtPath,
    /// Project include directories discovered by the scanner.
    ProjPath,
    /// Link arguments. A change invalidates only the output directory.
    Link,
    /// Everything else (optimization flags etc.). A change invalidates the
    /// whole intermediate directory.
    Other,
}

impl CrcKind {
    pub const ALL: [CrcKind; 5] = [
        CrcKind::Analysis,
        CrcKind::ExtPath,
        CrcKind::ProjPath,
        CrcKind::Link,
        CrcKind::Other,
    ];

    fn index(self) -> usize {
        match self {
            CrcKind::Analysis => 0,
            CrcKind::ExtPath => 1,
            CrcKind::ProjPath => 2,
            CrcKind::Link => 3,
            CrcKind::Other => 4,
        }
    }
}

/// What a detected argument change forces the builder to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildScope {
    /// No tracked argument group changed.
    Nothing,
    /// Only link arguments changed; objects remain valid.
    OutputOnly,
    /// Path or compile arguments changed; the intermediate directory for
    /// this build type must be discarded.
    Intermediate,
}

/// Read-only view of the persisted build configuration file.
#[derive(Debug)]
pub struct BuildConfig {
    project_dir: PathBuf,
    store: KeyValueFile,
}

impl BuildConfig {
    pub fn read<P: AsRef<Path>>(project_dir: P) -> Result<BuildConfig> {
        let project_dir = project_dir.as_ref().to_path_buf();
        let mut store = KeyValueFile::new(project_dir.join(BUILD_CONFIG_FILENAME));
        store.read_or_default()?;
        Ok(BuildConfig { project_dir, store })
    }

    pub fn config_file_path(&self) -> &Path {
        self.store.path()
    }

    /// The stored checksum for one argument group, or empty when the build
    /// type has no row (or a row of the wrong width, treated as absent).
    pub fn crc_str(&self, build_type: &str, kind: CrcKind) -> String {
        let parts = split_compound(&self.store.get(build_type));
        if parts.len() == CrcKind::ALL.len() {
            parts[kind.index()].clone()
        } else {
            String::new()
        }
    }

    /// The argument text interned under a checksum.
    pub fn args_for_crc(&self, crc: &str) -> String {
        self.store.get(crc)
    }

    pub fn analysis_path_for_crc(&self, crc: &str) -> PathBuf {
        self.project_dir.join(format!("{ANALYSIS_DIR_PREFIX}{crc}"))
    }

    /// The analysis directory named by the stored Analysis checksum.
    pub fn analysis_path(&self, build_type: &str) -> PathBuf {
        self.analysis_path_for_crc(&self.crc_str(build_type, CrcKind::Analysis))
    }

    pub fn inc_deps_file_path(&self, build_type: &str) -> PathBuf {
        self.analysis_path(build_type).join(INC_DEPS_FILENAME)
    }

    /// Checksums interned as argument rows but referenced by no build-type
    /// row. Their analysis directories are reclaimable.
    pub fn unused_crcs(&self) -> Vec<String> {
        let mut referenced = Vec::new();
        let mut interned = Vec::new();
        for (key, value) in self.store.entries() {
            if key.chars().all(|c| c.is_ascii_digit()) {
                interned.push(key.clone());
            } else {
                referenced.extend(split_compound(value));
            }
        }
        interned.retain(|crc| !referenced.contains(crc));
        interned
    }
}

/// Computes live checksums from the current argument lists and compares
/// them with the persisted rows to decide rebuild scope.
#[derive(Debug)]
pub struct BuildConfigWriter {
    config: BuildConfig,
    ext_args: String,
    proj_args: String,
    link_args: String,
    other_args: String,
}

impl BuildConfigWriter {
    pub fn new(config: BuildConfig) -> BuildConfigWriter {
        BuildConfigWriter {
            config,
            ext_args: String::new(),
            proj_args: String::new(),
            link_args: String::new(),
            other_args: String::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Capture the live external, compile, and link argument lists. The
    /// project path group is supplied separately once the source scan has
    /// discovered the project include dirs.
    pub fn set_initial_config<S: AsRef<str>>(
        &mut self,
        ext_args: &[S],
        compile_args: &[S],
        link_args: &[S],
    ) {
        self.ext_args = join_compound(ext_args);
        self.other_args = join_compound(compile_args);
        self.link_args = join_compound(link_args);
    }

    pub fn set_project_config<S: AsRef<str>>(&mut self, project_inc_dirs: &[S]) {
        self.proj_args = join_compound(project_inc_dirs);
    }

    fn live_args(&self, kind: CrcKind) -> String {
        match kind {
            // Always a function of the two path groups, never stored
            // independently.
            CrcKind::Analysis => format!("{}{}", self.ext_args, self.proj_args),
            CrcKind::ExtPath => self.ext_args.clone(),
            CrcKind::ProjPath => self.proj_args.clone(),
            CrcKind::Link => self.link_args.clone(),
            CrcKind::Other => self.other_args.clone(),
        }
    }

    pub fn live_crc(&self, kind: CrcKind) -> String {
        argument_crc(&self.live_args(kind))
    }

    pub fn is_config_different(&self, build_type: &str, kind: CrcKind) -> bool {
        self.config.crc_str(build_type, kind) != self.live_crc(kind)
    }

    pub fn is_any_config_different(&self, build_type: &str) -> bool {
        CrcKind::ALL
            .iter()
            .any(|kind| self.is_config_different(build_type, *kind))
    }

    /// The smallest artifact set that must be discarded for this build type.
    pub fn rebuild_scope(&self, build_type: &str) -> RebuildScope {
        if !self.is_any_config_different(build_type) {
            RebuildScope::Nothing
        } else if self.is_config_different(build_type, CrcKind::ExtPath)
            || self.is_config_different(build_type, CrcKind::ProjPath)
            || self.is_config_different(build_type, CrcKind::Other)
        {
            RebuildScope::Intermediate
        } else {
            RebuildScope::OutputOnly
        }
    }

    /// The analysis directory named by the *live* Analysis checksum.
    pub fn live_analysis_path(&self) -> PathBuf {
        self.config.analysis_path_for_crc(&self.live_crc(CrcKind::Analysis))
    }

    /// Persist the live checksums for `build_type` and intern any argument
    /// text not yet stored. Existing argument rows are never overwritten;
    /// an equal checksum implies equal text by construction.
    pub fn save_config(&mut self, build_type: &str) -> Result<()> {
        let crcs: Vec<String> = CrcKind::ALL.iter().map(|kind| self.live_crc(*kind)).collect();
        self.config.store.set(build_type, &join_compound(&crcs));
        for kind in CrcKind::ALL {
            let crc = self.live_crc(kind);
            if self.config.store.value(&crc).is_none() {
                self.config.store.set(&crc, &self.live_args(kind));
            }
        }
        self.config.store.write()
    }

    /// Directories whose backing argument sets are no longer referenced,
    /// filtered through the minimum-path-length deletion gate.
    pub fn reclaimable_dirs(&self) -> Vec<PathBuf> {
        self.config
            .unused_crcs()
            .iter()
            .map(|crc| self.config.analysis_path_for_crc(crc))
            .filter(|dir| {
                let keep = dir.as_os_str().len() >= MIN_DELETE_PATH_LEN;
                if !keep {
                    tracing::warn!("Refusing to reclaim suspiciously short path {:?}", dir);
                }
                keep
            })
            .collect()
    }
}
