//! Build orchestration.
//!
//! The pipeline is fixed: dependency discovery, compile, archive, symbol
//! ordering, link. Each stage joins before the next starts. External tools
//! are reached only through the [`Toolchain`] trait so tests can stub tool
//! behavior; the real implementation spawns subprocesses and captures their
//! output.

use crate::buildconfig::BuildConfig;
use crate::components::{ComponentKind, ComponentTypes, ROOT_COMPONENT};
use crate::config::ProjectConfig;
use crate::error::{MasonError, Result};
use crate::incmap::IncludeDependencyMap;
use crate::packages::{BuildPackages, Package};
use crate::scanner::{dir_string, ScannedProject};
use crate::storage::quote_arg;
use crate::symbols::{self, ClumpSymbols, PROJECT_LIBS_CLUMP};
use crate::workqueue::{num_hardware_threads, BackgroundQueue, WorkQueue};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
    time::SystemTime,
};

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// The subprocess seam. Spawn-and-capture is the entire contract; argument
/// assembly and staleness decisions stay on the caller's side.
pub trait Toolchain: Send + Sync {
    fn run(&self, tool: &str, args: &[String]) -> Result<ToolOutput>;

    /// Dump a library's symbol table, `nm` style.
    fn symbol_dump(&self, tool: &str, lib_file: &Path) -> Result<String> {
        let output = self.run(tool, &[lib_file.to_string_lossy().to_string()])?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(MasonError::Tool(format!(
                "{tool} failed for {lib_file:?}: {}",
                output.stderr
            )))
        }
    }
}

/// Runs tools as real subprocesses.
#[derive(Debug, Default)]
pub struct ProcessToolchain;

impl Toolchain for ProcessToolchain {
    fn run(&self, tool: &str, args: &[String]) -> Result<ToolOutput> {
        let output = Command::new(tool)
            .args(args)
            .output()
            .map_err(|e| MasonError::Tool(format!("Unable to run {tool}: {e}")))?;
        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run a tool and report failure with the full command line, so a failed
/// step can be reproduced by hand.
fn run_logged(toolchain: &dyn Toolchain, tool: &str, args: &[String]) -> bool {
    match toolchain.run(tool, args) {
        Ok(output) => {
            if !output.success {
                tracing::error!("Command failed: {} {}", tool, quoted_argv(args));
                if !output.stderr.is_empty() {
                    tracing::error!("{}", output.stderr);
                }
            }
            output.success
        }
        Err(e) => {
            tracing::error!("Command failed: {} {}: {}", tool, quoted_argv(args), e);
            false
        }
    }
}

fn quoted_argv(args: &[String]) -> String {
    args.iter().map(|a| quote_arg(a)).collect::<Vec<_>>().join(" ")
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// True when `target` is missing or older than `source`.
fn older_than(target: &Path, source: &Path) -> bool {
    match (mtime(target), mtime(source)) {
        (Some(t), Some(s)) => t < s,
        (None, _) => true,
        (_, None) => false,
    }
}

/// File-name-safe rendering of a component name.
fn artifact_name(comp_name: &str) -> String {
    if comp_name == ROOT_COMPONENT {
        "Root".to_string()
    } else {
        comp_name.replace('/', "-")
    }
}

/// Convert a library file name to its `-l` form: `.a`/`.lib` extensions are
/// stripped, and the `lib` prefix is stripped for `.a` archives. Names in
/// GNU linker format pass through unchanged.
fn lib_link_name(lib_name: &str) -> String {
    if let Some(stem) = lib_name.strip_suffix(".a") {
        stem.strip_prefix("lib").unwrap_or(stem).to_string()
    } else if let Some(stem) = lib_name.strip_suffix(".lib") {
        stem.to_string()
    } else {
        lib_name.to_string()
    }
}

/// Pipeline progression for one build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    DependencyDiscovery,
    Compiling,
    LibArchiving,
    SymbolOrdering,
    Linking,
    Done,
    Failed,
}

struct CompileTask {
    source: String,
    object: PathBuf,
    args: Vec<String>,
}

pub struct ComponentBuilder {
    config: ProjectConfig,
    build_type: String,
    toolchain: Arc<dyn Toolchain>,
    types: ComponentTypes,
    packages: BuildPackages,
    inc_map: IncludeDependencyMap,
    project_include_dirs: Vec<String>,
    phase: BuildPhase,
    /// Component name -> names of packages whose headers it includes.
    component_packages: BTreeMap<String, Vec<String>>,
    /// Components whose branch failed; later stages skip them.
    failed_components: BTreeSet<String>,
}

impl ComponentBuilder {
    pub fn new(
        config: ProjectConfig,
        build_type: &str,
        toolchain: Arc<dyn Toolchain>,
        types: ComponentTypes,
        packages: BuildPackages,
        inc_map: IncludeDependencyMap,
        project_include_dirs: Vec<String>,
    ) -> ComponentBuilder {
        ComponentBuilder {
            config,
            build_type: build_type.to_string(),
            toolchain,
            types,
            packages,
            inc_map,
            project_include_dirs,
            phase: BuildPhase::Idle,
            component_packages: BTreeMap::new(),
            failed_components: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Run the whole pipeline. Tool failures abort only the affected
    /// component's branch and surface as `Ok(false)`; filesystem and
    /// configuration errors escalate as `Err`.
    pub fn build(&mut self) -> Result<bool> {
        self.phase = BuildPhase::DependencyDiscovery;
        self.discover_package_dependencies();

        self.phase = BuildPhase::Compiling;
        self.compile_components()?;

        self.phase = BuildPhase::LibArchiving;
        let any_lib_rebuilt = self.archive_libraries()?;

        self.phase = BuildPhase::SymbolOrdering;
        self.order_symbols(any_lib_rebuilt)?;

        self.phase = BuildPhase::Linking;
        self.link_components()?;

        let success = self.failed_components.is_empty();
        self.phase = if success { BuildPhase::Done } else { BuildPhase::Failed };
        Ok(success)
    }

    fn buildable_components(&self) -> Vec<String> {
        self.types
            .component_names()
            .into_iter()
            .filter(|name| self.types.kind(name) != ComponentKind::Unknown)
            .collect()
    }

    /// A component inherits arguments only from packages whose headers it
    /// actually includes, decided by walking its include closure against
    /// each package's include roots.
    fn discover_package_dependencies(&mut self) {
        self.component_packages.clear();
        for comp in self.buildable_components() {
            let Some(comp_dir) = self.types.component_dir(&comp) else {
                continue;
            };
            let comp_dir = comp_dir.to_string_lossy().to_string();
            let mut dep_pkgs = Vec::new();
            for pkg in self.packages.packages() {
                let roots: Vec<String> =
                    pkg.include_dirs().iter().map(|d| dir_string(d)).collect();
                if !roots.is_empty() && self.inc_map.any_root_dirs_match(&roots, &comp_dir) {
                    dep_pkgs.push(pkg.name().to_string());
                }
            }
            tracing::debug!("Component {} uses packages {:?}", comp, dep_pkgs);
            self.component_packages.insert(comp, dep_pkgs);
        }
    }

    fn dep_packages(&self, comp_name: &str) -> Vec<Package> {
        self.component_packages
            .get(comp_name)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.packages.package(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Include roots in priority order: project include dirs first, then
    /// the component's packages' dirs in declared package order.
    fn ordered_include_roots(&self, comp_name: &str) -> Vec<String> {
        let mut roots = self.project_include_dirs.clone();
        for pkg in self.dep_packages(comp_name) {
            for dir in pkg.include_dirs() {
                let dir = dir_string(&dir);
                if !roots.contains(&dir) {
                    roots.push(dir);
                }
            }
        }
        roots
    }

    fn object_path(&self, source: &str) -> PathBuf {
        let src = Path::new(source);
        let rel = src
            .strip_prefix(self.config.source_root_dir())
            .unwrap_or_else(|_| Path::new(src.file_name().unwrap_or_default()));
        self.config
            .intermediate_dir(&self.build_type)
            .join(rel)
            .with_extension("o")
    }

    /// A source needs compiling when its object is missing or older than
    /// the source itself or any file in its transitive include closure.
    fn compile_reason(&self, source: &str, object: &Path) -> Option<String> {
        if older_than(object, Path::new(source)) {
            return Some(source.to_string());
        }
        for inc in self.inc_map.nested_includes(source) {
            if older_than(object, Path::new(inc.full_path())) {
                return Some(inc.full_path().to_string());
            }
        }
        None
    }

    fn component_compile_args(&self, comp_name: &str) -> Vec<String> {
        let mut args = self.config.compile_args.clone();
        args.extend(self.types.build_args(comp_name));
        for pkg in self.dep_packages(comp_name) {
            args.extend(pkg.compile_args());
        }
        args
    }

    fn compile_components(&mut self) -> Result<()> {
        let mut tasks = Vec::new();
        for comp in self.buildable_components() {
            let roots = self.ordered_include_roots(&comp);
            let base_args = self.component_compile_args(&comp);
            for source in self.types.component_sources(&comp) {
                let object = self.object_path(&source);
                let Some(trigger) = self.compile_reason(&source, &object) else {
                    continue;
                };
                if trigger != source {
                    tracing::info!("Compiling {} (changed include {})", source, trigger);
                } else {
                    tracing::info!("Compiling {}", source);
                }
                let mut args = base_args.clone();
                for dir in self.inc_map.ordered_include_dirs_for_source(&source, &roots) {
                    args.push(format!("-I{dir}"));
                }
                args.push("-c".to_string());
                args.push(source.clone());
                args.push("-o".to_string());
                args.push(object.to_string_lossy().to_string());
                tasks.push((comp.clone(), CompileTask { source, object, args }));
            }
        }
        if tasks.is_empty() {
            return Ok(());
        }

        let tool = self.config.tool_paths(&self.build_type).compiler;
        let toolchain = self.toolchain.clone();
        let failed: Arc<Mutex<BTreeSet<String>>> = Arc::new(Mutex::new(BTreeSet::new()));
        let worker_failed = failed.clone();
        let mut queue = WorkQueue::new();
        queue.setup(num_hardware_threads(), move |(comp, task): (String, CompileTask)| {
            let ok = match std::fs::create_dir_all(task.object.parent().unwrap_or(Path::new(""))) {
                Ok(()) => run_logged(toolchain.as_ref(), &tool, &task.args),
                Err(e) => {
                    tracing::error!("Unable to create object dir for {}: {}", task.source, e);
                    false
                }
            };
            if !ok {
                worker_failed.lock().insert(comp);
            }
        });
        for task in tasks {
            queue.add_task(task);
        }
        queue.wait_for_completion();
        self.failed_components.extend(failed.lock().iter().cloned());
        Ok(())
    }

    fn static_lib_components(&self) -> Vec<String> {
        self.buildable_components()
            .into_iter()
            .filter(|c| self.types.kind(c) == ComponentKind::StaticLib)
            .collect()
    }

    pub fn static_lib_path(&self, comp_name: &str) -> PathBuf {
        self.config
            .intermediate_dir(&self.build_type)
            .join(format!("lib{}.a", artifact_name(comp_name)))
    }

    fn component_objects(&self, comp_name: &str) -> Vec<PathBuf> {
        self.types
            .component_sources(comp_name)
            .iter()
            .map(|src| self.object_path(src))
            .collect()
    }

    /// Rebuild every static library whose member objects are newer than the
    /// archive. Returns whether anything was rebuilt, which gates the
    /// ProjLibs symbol regeneration.
    fn archive_libraries(&mut self) -> Result<bool> {
        let tool = self.config.tool_paths(&self.build_type).archiver;
        let mut any_rebuilt = false;
        for comp in self.static_lib_components() {
            if self.failed_components.contains(&comp) {
                continue;
            }
            let lib = self.static_lib_path(&comp);
            let objects = self.component_objects(&comp);
            if objects.is_empty() {
                continue;
            }
            if !objects.iter().any(|obj| older_than(&lib, obj)) {
                continue;
            }
            std::fs::create_dir_all(lib.parent().unwrap_or(Path::new("")))?;
            let mut args = vec!["r".to_string(), lib.to_string_lossy().to_string()];
            args.extend(objects.iter().map(|o| o.to_string_lossy().to_string()));
            tracing::info!("Archiving {:?}", lib);
            if run_logged(self.toolchain.as_ref(), &tool, &args) {
                any_rebuilt = true;
            } else {
                self.failed_components.insert(comp);
            }
        }
        Ok(any_rebuilt)
    }

    /// Dump and merge symbols for a set of libraries, in parallel, and
    /// write the clump files into `out_dir`.
    fn resolve_clump(&self, clump_name: &str, libs: &[PathBuf], out_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(out_dir)?;
        let clump = Arc::new(ClumpSymbols::new());
        let tool = self.config.tool_paths(&self.build_type).symbol_dump;
        let toolchain = self.toolchain.clone();
        let worker_clump = clump.clone();
        let mut queue = WorkQueue::new();
        queue.setup(num_hardware_threads(), move |lib: PathBuf| {
            match toolchain.symbol_dump(&tool, &lib) {
                Ok(dump) => worker_clump.add_symbols(&lib.to_string_lossy(), &dump),
                Err(e) => tracing::error!("Symbol dump failed for {:?}: {}", lib, e),
            }
        });
        for lib in libs {
            queue.add_task(lib.clone());
        }
        queue.wait_for_completion();
        clump.write_clump_files(clump_name, out_dir)
    }

    /// Order project libraries (when stale) and each referenced package's
    /// scanned libraries (once; the result is cached in the package).
    fn order_symbols(&mut self, any_lib_rebuilt: bool) -> Result<()> {
        let out_dir = self.config.intermediate_dir(&self.build_type);
        let proj_libs: Vec<PathBuf> = self
            .static_lib_components()
            .iter()
            .map(|c| self.static_lib_path(c))
            .filter(|lib| lib.exists())
            .collect();
        if !proj_libs.is_empty()
            && (any_lib_rebuilt || !symbols::dep_file_path(PROJECT_LIBS_CLUMP, &out_dir).exists())
        {
            self.resolve_clump(PROJECT_LIBS_CLUMP, &proj_libs, &out_dir)?;
        }

        let mut referenced: Vec<String> = Vec::new();
        for pkgs in self.component_packages.values() {
            for name in pkgs {
                if !referenced.contains(name) {
                    referenced.push(name.clone());
                }
            }
        }
        for name in referenced {
            let Some(mut pkg) = self.packages.package(&name) else {
                continue;
            };
            if pkg.are_library_names_ordered() {
                continue;
            }
            let libs = pkg.scanned_library_file_paths();
            self.resolve_clump(&name, &libs, &out_dir)?;
            let (lib_dirs, lib_names) = symbols::ordered_libs(&name, &out_dir)?;
            pkg.set_ordered_libs(&lib_dirs, &lib_names);
            self.packages.insert(&pkg);
        }
        self.packages.save()
    }

    fn link_components(&mut self) -> Result<()> {
        let out_dir = self.config.output_dir(&self.build_type);
        let intermediate = self.config.intermediate_dir(&self.build_type);
        let has_proj_libs = symbols::dep_file_path(PROJECT_LIBS_CLUMP, &intermediate).exists();
        let (proj_lib_dirs, proj_lib_names) = if has_proj_libs {
            symbols::ordered_libs(PROJECT_LIBS_CLUMP, &intermediate)?
        } else {
            (Vec::new(), Vec::new())
        };
        let proj_lib_paths: Vec<PathBuf> = if has_proj_libs {
            symbols::ordered_lib_file_names(PROJECT_LIBS_CLUMP, &intermediate)?
                .iter()
                .map(PathBuf::from)
                .collect()
        } else {
            Vec::new()
        };

        let tool = self.config.tool_paths(&self.build_type).compiler;
        for comp in self.buildable_components() {
            let kind = self.types.kind(&comp);
            if kind != ComponentKind::Program && kind != ComponentKind::SharedLib {
                continue;
            }
            if self.failed_components.contains(&comp) {
                continue;
            }
            let output = match kind {
                ComponentKind::SharedLib => {
                    out_dir.join(format!("lib{}.so", artifact_name(&comp)))
                }
                _ => out_dir.join(artifact_name(&comp)),
            };
            let objects = self.component_objects(&comp);
            let stale = objects.iter().any(|obj| older_than(&output, obj))
                || proj_lib_paths.iter().any(|lib| older_than(&output, lib));
            if !stale {
                continue;
            }
            std::fs::create_dir_all(&out_dir)?;

            let mut args: Vec<String> = Vec::new();
            if kind == ComponentKind::SharedLib {
                args.push("-shared".to_string());
            }
            args.extend(objects.iter().map(|o| o.to_string_lossy().to_string()));

            let mut seen_link_dirs: Vec<String> = Vec::new();
            let mut seen_lib_args: BTreeSet<String> = BTreeSet::new();
            let mut push_lib = |args: &mut Vec<String>, name: &str| {
                let link_name = lib_link_name(name);
                if seen_lib_args.insert(link_name.clone()) {
                    args.push(format!("-l{link_name}"));
                }
            };
            let mut push_dir = |args: &mut Vec<String>, dir: &str| {
                if !dir.is_empty() && !seen_link_dirs.contains(&dir.to_string()) {
                    seen_link_dirs.push(dir.to_string());
                    args.push(format!("-L{dir}"));
                }
            };

            // Project libraries first, already globally ordered.
            for dir in &proj_lib_dirs {
                push_dir(&mut args, dir);
            }
            for name in &proj_lib_names {
                push_lib(&mut args, name);
            }
            // Then each package's ordered libraries, in declared order.
            for pkg in self.dep_packages(&comp) {
                for dir in pkg.library_dirs() {
                    push_dir(&mut args, &dir.to_string_lossy());
                }
                for name in pkg.library_names() {
                    push_lib(&mut args, &name);
                }
                for arg in pkg.link_args() {
                    // `-l` args already absorbed into the ordered list are
                    // skipped to avoid duplicate link inputs.
                    if let Some(name) = arg.strip_prefix("-l") {
                        push_lib(&mut args, name);
                    } else if let Some(dir) = arg.strip_prefix("-L") {
                        push_dir(&mut args, dir);
                    } else if !args.contains(&arg) {
                        args.push(arg);
                    }
                }
            }
            for arg in self.config.link_args.iter().chain(self.types.build_args(&comp).iter()) {
                if let Some(name) = arg.strip_prefix("-l") {
                    push_lib(&mut args, name);
                } else if !args.contains(arg) {
                    args.push(arg.clone());
                }
            }

            args.push("-o".to_string());
            args.push(output.to_string_lossy().to_string());
            tracing::info!("Linking {:?}", output);
            if !run_logged(self.toolchain.as_ref(), &tool, &args) {
                self.failed_components.insert(comp);
            }
        }
        Ok(())
    }
}

/// Drives the external analyzer over every out-of-date source and header,
/// producing the include dependency map the builder consumes.
pub struct AnalysisRunner {
    config: ProjectConfig,
    build_type: String,
    toolchain: Arc<dyn Toolchain>,
}

/// One analyzer invocation: the file to parse, where its output goes, and
/// the include arguments it resolves includes against.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub source_file: String,
    pub out_file: PathBuf,
    pub args: Vec<String>,
}

impl AnalysisRunner {
    pub fn new(config: ProjectConfig, build_type: &str, toolchain: Arc<dyn Toolchain>) -> Self {
        AnalysisRunner {
            config,
            build_type: build_type.to_string(),
            toolchain,
        }
    }

    /// Analyzer output path for a source file: the relative path flattened
    /// into a single file name under the analysis directory.
    fn analysis_out_file(&self, analysis_dir: &Path, source: &str) -> PathBuf {
        let rel = Path::new(source)
            .strip_prefix(self.config.source_root_dir())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| source.trim_start_matches('/').to_string());
        analysis_dir.join(format!("{}.txt", rel.replace('/', "_")))
    }

    /// Every include directory the analyzer may resolve through: project
    /// dirs first, then package dirs in declared order.
    fn all_include_args(scanned: &ScannedProject, packages: &BuildPackages) -> Vec<String> {
        let mut args: Vec<String> = scanned
            .project_include_dirs
            .iter()
            .map(|d| format!("-I{d}"))
            .collect();
        for pkg in packages.packages() {
            for dir in pkg.include_dirs() {
                let arg = format!("-I{}", dir_string(&dir));
                if !args.contains(&arg) {
                    args.push(arg);
                }
            }
        }
        args
    }

    fn stale_tasks(&self, scanned: &ScannedProject, packages: &BuildPackages) -> Vec<AnalysisTask> {
        let analysis_dir = BuildConfig::read(self.config.project_dir())
            .map(|cfg| cfg.analysis_path(&self.build_type))
            .unwrap_or_else(|_| self.config.project_dir().join("analysis"));
        let include_args = Self::all_include_args(scanned, packages);
        let mut tasks = Vec::new();
        let files = scanned
            .sources
            .values()
            .chain(scanned.includes.values())
            .flatten();
        for file in files {
            let out_file = self.analysis_out_file(&analysis_dir, file);
            if !older_than(&out_file, Path::new(file)) {
                continue;
            }
            let mut args = vec![file.clone(), out_file.to_string_lossy().to_string()];
            args.extend(include_args.iter().cloned());
            tasks.push(AnalysisTask {
                source_file: file.clone(),
                out_file,
                args,
            });
        }
        tasks
    }

    /// Analyze all stale files on the bounded queue, blocking until done.
    /// Returns false if any analyzer invocation failed.
    pub fn analyze(&self, scanned: &ScannedProject, packages: &BuildPackages) -> Result<bool> {
        let tasks = self.stale_tasks(scanned, packages);
        if tasks.is_empty() {
            return Ok(true);
        }
        if let Some(dir) = tasks[0].out_file.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tool = self.config.tool_paths(&self.build_type).analyzer;
        let toolchain = self.toolchain.clone();
        let failed = Arc::new(Mutex::new(false));
        let worker_failed = failed.clone();
        let mut queue = WorkQueue::new();
        queue.setup(num_hardware_threads(), move |task: AnalysisTask| {
            if !run_logged(toolchain.as_ref(), &tool, &task.args) {
                *worker_failed.lock() = true;
            }
        });
        for task in tasks {
            queue.add_task(task);
        }
        queue.wait_for_completion();
        let failed = *failed.lock();
        Ok(!failed)
    }

    /// Cancelable variant for embedding IDEs: stale files are enqueued one
    /// per task on a background queue, so a newer request can cancel the
    /// remainder with one file's latency.
    pub fn analyze_in_background(
        self,
        scanned: &ScannedProject,
        packages: &BuildPackages,
    ) -> Result<BackgroundQueue<AnalysisTask>> {
        let tasks = self.stale_tasks(scanned, packages);
        if let Some(task) = tasks.first() {
            if let Some(dir) = task.out_file.parent() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let tool = self.config.tool_paths(&self.build_type).analyzer;
        let toolchain = self.toolchain.clone();
        let mut queue = BackgroundQueue::new(move |task: AnalysisTask| {
            run_logged(toolchain.as_ref(), &tool, &task.args);
        });
        for task in tasks {
            queue.add_task(task);
        }
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_names_reduce_to_link_args() {
        assert_eq!(lib_link_name("libfoo.a"), "foo");
        assert_eq!(lib_link_name("foo.a"), "foo");
        assert_eq!(lib_link_name("foo.lib"), "foo");
        // GNU linker format names pass through.
        assert_eq!(lib_link_name("gtk-3"), "gtk-3");
    }

    #[test]
    fn artifact_names_are_path_free() {
        assert_eq!(artifact_name(ROOT_COMPONENT), "Root");
        assert_eq!(artifact_name("util/deep"), "util-deep");
        assert_eq!(artifact_name("util"), "util");
    }

    #[test]
    fn missing_targets_are_older_than_existing_sources() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("a.cpp");
        std::fs::write(&source, b"").unwrap();
        assert!(older_than(&dir.path().join("a.o"), &source));
        // A missing source never forces a rebuild by itself.
        assert!(!older_than(&source, &dir.path().join("ghost.h")));
    }
}
