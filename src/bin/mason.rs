//! mason CLI tool
//!
//! Command-line interface for scanning, analyzing, and building mason
//! projects.
//!
//! ## Commands
//!
//! - `scan <project>`: discover components and external packages
//! - `analyze <project>`: bring the include dependency map up to date
//! - `build <project>`: run the full incremental build pipeline

use clap::{Parser, Subcommand};
use mason_core::{
    buildconfig::{BuildConfig, BuildConfigWriter, RebuildScope},
    builder::{AnalysisRunner, ComponentBuilder, ProcessToolchain},
    components::ComponentTypes,
    config::ProjectConfig,
    incmap::IncludeDependencyMap,
    packages::BuildPackages,
    scanner::{ComponentScanner, ScannedProject},
};
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "mason")]
#[command(author, version, about = "An incremental, dependency-aware project builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the source tree and external package roots, updating the
    /// component and package stores
    Scan {
        /// Path to the project directory
        project: PathBuf,
    },

    /// Run the analyzer over every out-of-date source and header
    Analyze {
        /// Path to the project directory
        project: PathBuf,

        /// Build type to analyze for
        #[arg(short = 't', long)]
        build_type: Option<String>,
    },

    /// Build the project incrementally
    Build {
        /// Path to the project directory
        project: PathBuf,

        /// Build type to build
        #[arg(short = 't', long)]
        build_type: Option<String>,
    },
}

fn build_type_of(config: &ProjectConfig, requested: Option<String>) -> String {
    requested.unwrap_or_else(|| {
        if config.default_build_config.is_empty() {
            "dbg".to_string()
        } else {
            config.default_build_config.clone()
        }
    })
}

/// Scan the source tree, then resolve any wildcard-marked packages.
fn scan(config: &ProjectConfig) -> Result<(ScannedProject, ComponentTypes, BuildPackages), Box<dyn std::error::Error>> {
    let mut types = ComponentTypes::read(
        config.component_types_path(),
        config.component_sources_path(),
    )?;
    let scanner = ComponentScanner::new(config.source_root_dir(), config.exclude_dirs.clone());
    let scanned = scanner.scan_project(&mut types)?;
    types.write()?;

    let mut packages = BuildPackages::read(config.build_packages_path())?;
    let mut any_scanned = false;
    for name in packages.package_names() {
        if let Some(mut pkg) = packages.package(&name) {
            if pkg.needs_dir_scan() {
                scanner.scan_external_package(&mut pkg)?;
                packages.insert(&pkg);
                any_scanned = true;
            }
        }
    }
    if any_scanned {
        packages.save()?;
    }
    Ok((scanned, types, packages))
}

/// Compare live arguments against the stored checksums, discard whatever
/// the change invalidates, and persist the new checksums.
fn track_config_changes(
    config: &ProjectConfig,
    build_type: &str,
    scanned: &ScannedProject,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BuildConfigWriter::new(BuildConfig::read(config.project_dir())?);
    writer.set_initial_config(&config.external_args, &config.compile_args, &config.link_args);
    writer.set_project_config(&scanned.project_include_dirs);
    match writer.rebuild_scope(build_type) {
        RebuildScope::Nothing => {}
        RebuildScope::OutputOnly => {
            remove_dir(&config.output_dir(build_type));
        }
        RebuildScope::Intermediate => {
            remove_dir(&config.output_dir(build_type));
            remove_dir(&config.intermediate_dir(build_type));
        }
    }
    writer.save_config(build_type)?;
    for dir in writer.reclaimable_dirs() {
        remove_dir(&dir);
    }
    Ok(())
}

fn remove_dir(dir: &std::path::Path) {
    if dir.exists() {
        tracing::info!("Removing stale {:?}", dir);
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!("Unable to remove {:?}: {}", dir, e);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let toolchain = Arc::new(ProcessToolchain);

    match cli.command {
        Commands::Scan { project } => {
            let config = ProjectConfig::load(&project)?;
            let (scanned, types, packages) = scan(&config)?;
            println!(
                "{} components, {} include dirs, {} packages",
                types.component_names().len(),
                scanned.project_include_dirs.len(),
                packages.package_names().len()
            );
        }

        Commands::Analyze { project, build_type } => {
            let config = ProjectConfig::load(&project)?;
            let build_type = build_type_of(&config, build_type);
            let (scanned, _types, packages) = scan(&config)?;
            track_config_changes(&config, &build_type, &scanned)?;
            let runner = AnalysisRunner::new(config, &build_type, toolchain);
            if !runner.analyze(&scanned, &packages)? {
                std::process::exit(1);
            }
        }

        Commands::Build { project, build_type } => {
            let config = ProjectConfig::load(&project)?;
            let build_type = build_type_of(&config, build_type);
            let (scanned, types, packages) = scan(&config)?;
            if !types.any_components_defined() {
                tracing::warn!(
                    "No component types are set; assign StaticLib/SharedLib/Program kinds in {:?}",
                    config.component_types_path()
                );
            }
            track_config_changes(&config, &build_type, &scanned)?;

            let runner =
                AnalysisRunner::new(config.clone(), &build_type, toolchain.clone());
            if !runner.analyze(&scanned, &packages)? {
                std::process::exit(1);
            }

            let inc_map = IncludeDependencyMap::read(
                BuildConfig::read(config.project_dir())?.inc_deps_file_path(&build_type),
            )?;
            let mut builder = ComponentBuilder::new(
                config,
                &build_type,
                toolchain,
                types,
                packages,
                inc_map,
                scanned.project_include_dirs,
            );
            if !builder.build()? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
