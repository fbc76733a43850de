//! RIO kernel builder CLI
//!
//! Builds `qcom_rio` kernels for Samsung Snapdragon devices and packages each
//! build as an AnyKernel3 flashable zip in the source directory.
//!
//! # Usage
//!
//! ```bash
//! # Plain build for the Galaxy A73
//! rio-build a73xq
//!
//! # Plain build followed by a KernelSU build
//! RIO_KSU_SHA256=<digest> rio-build a52sxq --ksu
//!
//! # Repackage the current output without rebuilding
//! rio-build package m52xq
//!
//! # Check the host before a long build
//! rio-build preflight
//! ```
//!
//! Run from the root of the kernel source tree.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use rio_build::artifact::Packager;
use rio_build::build::StageSpec;
use rio_build::config::{parse_jobs, BuildConfig};
use rio_build::error::BuildError;
use rio_build::pipeline::Pipeline;
use rio_build::preflight::{self, CacheStatus, PreflightChecker};
use rio_build::process::System;
use rio_build::toolchain::ToolchainProvisioner;
use rio_build::variant::{known_ids, BuildVariant, VARIANTS};

#[derive(Parser)]
#[command(name = "rio-build")]
#[command(author, version, about = "RIO kernel builder", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Device variant to build (see `rio-build variants`)
    variant: Option<String>,

    /// Also build a KernelSU variant after the plain build
    #[arg(long)]
    ksu: bool,

    /// Build only the KernelSU variant
    #[arg(long, conflicts_with = "ksu")]
    only_ksu: bool,

    /// Branch or ref to build (default: qcom_rio)
    #[arg(long)]
    branch: Option<String>,

    /// Kernel name used in LOCALVERSION and archive names
    #[arg(long)]
    label: Option<String>,

    /// Parallel make jobs (default: logical core count)
    #[arg(short, long, value_parser = parse_jobs)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the current build output without rebuilding
    Package {
        variant: String,

        /// Archive label (default: kernel name)
        #[arg(long)]
        label: Option<String>,
    },

    /// Download and cache the clang toolchain
    Toolchain,

    /// Check host tools, network and disk space
    Preflight,

    /// Show configuration and build status
    Status,

    /// List supported device variants
    Variants,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = BuildConfig::from_env(&std::env::current_dir()?)?;
    if let Some(branch) = &cli.branch {
        config.branch = branch.clone();
    }
    if let Some(label) = &cli.label {
        config.kernel_name = label.clone();
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }

    match cli.command {
        Some(Commands::Package { variant, label }) => cmd_package(&config, &variant, label),
        Some(Commands::Toolchain) => cmd_toolchain(&config),
        Some(Commands::Preflight) => cmd_preflight(&config),
        Some(Commands::Status) => cmd_status(&config),
        Some(Commands::Variants) => cmd_variants(),
        None => {
            let variant = requested_variant(cli.variant)?;
            cmd_build(&config, &variant, cli.ksu, cli.only_ksu)
        }
    }
}

/// The positional variant, required when no subcommand is given.
fn requested_variant(variant: Option<String>) -> Result<String, BuildError> {
    variant.ok_or_else(|| {
        BuildError::Usage(format!(
            "missing variant (expected one of: {})",
            known_ids().join(", ")
        ))
    })
}

fn selected_stages(config: &BuildConfig, ksu: bool, only_ksu: bool) -> Vec<StageSpec> {
    let mut stages = Vec::new();
    if !only_ksu {
        stages.push(StageSpec::vanilla(config));
    }
    if ksu || only_ksu {
        stages.push(StageSpec::kernelsu(config));
    }
    stages
}

fn cmd_build(config: &BuildConfig, variant: &str, ksu: bool, only_ksu: bool) -> Result<()> {
    // Reject bad ids before probing the host.
    BuildVariant::lookup(variant)?;
    preflight::require_host_tools()?;

    let stages = selected_stages(config, ksu, only_ksu);

    println!("=== RIO Kernel Build ({}) ===\n", variant);
    let report = Pipeline::new(config, &System).run(variant, &stages)?;
    report.print_summary();
    Ok(())
}

fn cmd_package(config: &BuildConfig, variant: &str, label: Option<String>) -> Result<()> {
    let variant = BuildVariant::lookup(variant)?;
    let label = label.unwrap_or_else(|| config.kernel_name.clone());
    let today = chrono::Local::now().date_naive();

    let archive = Packager::new(config).package(&label, variant, today)?;
    println!("\n=== Package complete ===");
    println!("  {}", archive.display());
    Ok(())
}

fn cmd_toolchain(config: &BuildConfig) -> Result<()> {
    let handle = ToolchainProvisioner::new(config, &System).ensure()?;
    println!("  Path:    {}", handle.dir.display());
    println!("  Version: {}", handle.clang_version(&System));
    Ok(())
}

fn cmd_preflight(config: &BuildConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(PreflightChecker::new(config).run_all());
    report.print_summary();

    if !report.is_ok() {
        anyhow::bail!("{} preflight check(s) failed", report.errors().len());
    }
    Ok(())
}

fn cmd_variants() -> Result<()> {
    println!("Supported variants:");
    for variant in VARIANTS {
        println!("  {:<8} {}", variant.id, variant.device);
    }
    Ok(())
}

fn cmd_status(config: &BuildConfig) -> Result<()> {
    println!("RIO Builder Status");
    println!("==================");
    println!();
    println!("Configuration:");
    println!("  Source:      {}", config.src_dir.display());
    println!("  Kernel name: {}", config.kernel_name);
    println!("  Branch:      {}", config.branch);
    println!("  Jobs:        {}", config.jobs);
    println!("  Toolchain:   {}", config.clang_version);
    match &config.clang_override {
        Some(path) => println!("  CLANG_PATH:  {}", path.display()),
        None => println!("  Cache root:  {}", config.toolchain_root.display()),
    }
    println!();

    println!("Cache:");
    CacheStatus::from_config(config).print();
    println!();

    let image = config.kernel_image();
    println!("Build Artifacts:");
    if image.is_file() {
        println!("  Kernel image:    BUILT ({})", size_mb(&image));
    } else {
        println!("  Kernel image:    NOT BUILT");
    }

    let mut archives: Vec<_> = std::fs::read_dir(&config.src_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x == "zip"))
        .collect();
    archives.sort();
    if archives.is_empty() {
        println!("  Archives:        NONE");
    }
    for archive in &archives {
        if let Some(name) = archive.file_name() {
            println!("  Archive:         {} ({})", name.to_string_lossy(), size_mb(archive));
        }
    }

    println!();
    println!("Next steps:");
    if !config.src_dir.join("Makefile").is_file() {
        println!("  1. Run rio-build from the root of the kernel source tree");
    } else if !image.is_file() {
        println!("  1. Run 'rio-build <variant>' to build a kernel");
    } else if archives.is_empty() {
        println!("  1. Run 'rio-build package <variant>' to create a flashable zip");
    } else {
        println!("  Flashable zip ready.");
    }

    Ok(())
}

fn size_mb(path: &Path) -> String {
    let bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
}
