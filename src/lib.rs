//! # mason-core
//!
//! A Rust library for incremental, dependency-aware building of
//! multi-directory C++ and Java projects.
//!
//! ## Overview
//!
//! mason-core models a project as a tree of **components**: every
//! source-bearing directory under the source root is a component, and each
//! component builds into a static library, shared library, or program. An
//! external analyzer records which files include which; mason-core turns
//! that map into transitive include closures, staleness decisions, ordered
//! `-I` lists, and component-to-package dependencies, then drives the
//! compile/archive/link pipeline over a bounded worker pool.
//!
//! ### Key Features
//!
//! - **Incremental rebuilds**: object files recompile only when the source
//!   or something in its transitive include closure changed
//! - **Argument change tracking**: per-group checksums (external paths,
//!   project paths, link, other) decide the smallest artifact set to
//!   discard when build arguments change
//! - **Automatic package discovery**: wildcard-marked external packages are
//!   scanned for include roots and libraries
//! - **Symbol-driven link order**: library link order is derived from
//!   defined/undefined symbol tables so every supplier precedes its clients
//! - **Bounded parallelism**: compilation and symbol extraction fan out to
//!   a fixed worker pool with producer backpressure
//!
//! ## Architecture
//!
//! - **[`config`]**: the project file (`mason-project.toml`) and per-build-type
//!   tool paths and directories
//! - **[`scanner`]**: source tree and external package scanning
//! - **[`components`]**: the directory-scoped component model
//! - **[`packages`]**: external package records and their persisted store
//! - **[`incmap`]**: the persisted include dependency map
//! - **[`buildconfig`]**: argument checksum tracking and rebuild scoping
//! - **[`symbols`]**: symbol table resolution and link ordering
//! - **[`builder`]**: the phase pipeline and the [`builder::Toolchain`] seam
//! - **[`workqueue`]**: the bounded and cancelable work queues
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mason_core::builder::{AnalysisRunner, ComponentBuilder, ProcessToolchain};
//! use mason_core::components::ComponentTypes;
//! use mason_core::config::ProjectConfig;
//! use mason_core::incmap::IncludeDependencyMap;
//! use mason_core::packages::BuildPackages;
//! use mason_core::scanner::ComponentScanner;
//! use std::sync::Arc;
//!
//! fn main() -> mason_core::Result<()> {
//!     let config = ProjectConfig::load("./myproject")?;
//!     let mut types = ComponentTypes::read(
//!         config.component_types_path(),
//!         config.component_sources_path(),
//!     )?;
//!     let scanner = ComponentScanner::new(config.source_root_dir(), config.exclude_dirs.clone());
//!     let scanned = scanner.scan_project(&mut types)?;
//!     types.write()?;
//!
//!     let packages = BuildPackages::read(config.build_packages_path())?;
//!     let toolchain = Arc::new(ProcessToolchain);
//!
//!     let runner = AnalysisRunner::new(config.clone(), "dbg", toolchain.clone());
//!     runner.analyze(&scanned, &packages)?;
//!
//!     let inc_map = IncludeDependencyMap::read(
//!         mason_core::buildconfig::BuildConfig::read(config.project_dir())?
//!             .inc_deps_file_path("dbg"),
//!     )?;
//!     let mut builder = ComponentBuilder::new(
//!         config,
//!         "dbg",
//!         toolchain,
//!         types,
//!         packages,
//!         inc_map,
//!         scanned.project_include_dirs,
//!     );
//!     let ok = builder.build()?;
//!     std::process::exit(if ok { 0 } else { 1 });
//! }
//! ```
//!
//! ## Module Guide
//!
//! Start with [`builder::ComponentBuilder`] for driving a build, then
//! explore [`incmap::IncludeDependencyMap`] for the dependency model and
//! [`symbols`] for how link order is derived.

pub mod buildconfig;
pub mod builder;
pub mod components;
pub mod config;
pub mod error;
pub mod incmap;
pub mod packages;
pub mod scanner;
pub mod storage;
pub mod symbols;
pub mod workqueue;

pub use error::*;
