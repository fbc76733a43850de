//! Build configuration.
//!
//! Everything the pipeline needs to know about paths, pinned versions and
//! remote locations lives in [`BuildConfig`]. Values come from the constants
//! below, then environment overrides, then CLI flags (applied by `main`).
//!
//! # Environment Variables
//!
//! - `KERNEL_NAME`: label used in LOCALVERSION and archive names (default `RIO`)
//! - `RIO_TOOLCHAIN_DIR`: toolchain cache root (default `~/toolchains`)
//! - `CLANG_PATH`: use an existing toolchain directory instead of the cache
//! - `RIO_ANYKERNEL_URL`: packaging template repository
//! - `RIO_BRANCH`: branch checked out before each stage (default `qcom_rio`)
//! - `RIO_JOBS`: make parallelism (default: logical core count)
//! - `RIO_KSU_URL` / `RIO_KSU_SHA256`: pinned KernelSU source archive

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Prebuilt clang release used for every build.
pub const CLANG_VERSION: &str = "clang-r530567";

/// Base URL of the prebuilt clang archives, keyed by version.
pub const CLANG_URL_BASE: &str =
    "https://android.googlesource.com/platform/prebuilts/clang/host/linux-x86/+archive/refs/heads/main";

/// Base defconfig; the variant fragment is merged on top.
pub const DEFCONFIG: &str = "rio_defconfig";

pub const DEFAULT_KERNEL_NAME: &str = "RIO";
pub const DEFAULT_BRANCH: &str = "qcom_rio";

pub const ANYKERNEL_URL: &str = "https://github.com/osm0sis/AnyKernel3.git";
pub const ANYKERNEL_DIR: &str = "AnyKernel3";

/// KernelSU release archive. The digest is deliberately not baked in: it must
/// be pinned by whoever runs the build (`RIO_KSU_SHA256`).
pub const KSU_ARCHIVE_URL: &str =
    "https://github.com/tiann/KernelSU/archive/refs/tags/v0.9.5.tar.gz";

pub const KERNEL_NAME_ENV: &str = "KERNEL_NAME";
pub const TOOLCHAIN_DIR_ENV: &str = "RIO_TOOLCHAIN_DIR";
pub const CLANG_PATH_ENV: &str = "CLANG_PATH";
pub const ANYKERNEL_URL_ENV: &str = "RIO_ANYKERNEL_URL";
pub const BRANCH_ENV: &str = "RIO_BRANCH";
pub const JOBS_ENV: &str = "RIO_JOBS";
pub const KSU_URL_ENV: &str = "RIO_KSU_URL";
pub const KSU_SHA256_ENV: &str = "RIO_KSU_SHA256";

/// A remote source archive and the digest it must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedArchive {
    pub url: String,
    pub sha256: Option<String>,
}

/// Resolved build configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Kernel source tree (the working directory).
    pub src_dir: PathBuf,
    /// `O=` directory for make.
    pub out_dir: PathBuf,
    /// Where toolchains are cached.
    pub toolchain_root: PathBuf,
    pub clang_version: String,
    /// Pre-existing toolchain that bypasses the cache entirely.
    pub clang_override: Option<PathBuf>,
    pub kernel_name: String,
    pub branch: String,
    pub template_url: String,
    pub template_dir: PathBuf,
    pub jobs: usize,
    pub kernelsu: PinnedArchive,
}

impl BuildConfig {
    /// Defaults for a source tree, without reading the environment.
    pub fn new(src_dir: impl Into<PathBuf>, toolchain_root: impl Into<PathBuf>) -> Self {
        let src_dir = src_dir.into();
        Self {
            out_dir: src_dir.join("out"),
            template_dir: src_dir.join(ANYKERNEL_DIR),
            toolchain_root: toolchain_root.into(),
            clang_version: CLANG_VERSION.to_string(),
            clang_override: None,
            kernel_name: DEFAULT_KERNEL_NAME.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            template_url: ANYKERNEL_URL.to_string(),
            jobs: default_jobs(),
            kernelsu: PinnedArchive {
                url: KSU_ARCHIVE_URL.to_string(),
                sha256: None,
            },
            src_dir,
        }
    }

    /// Defaults plus overrides from the process environment.
    pub fn from_env(src_dir: &Path) -> Result<Self> {
        Self::from_lookup(src_dir, |key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Defaults plus overrides from `lookup`.
    pub fn from_lookup(src_dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let toolchain_root = match lookup(TOOLCHAIN_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("Cannot determine home directory; set RIO_TOOLCHAIN_DIR")?
                .join("toolchains"),
        };

        let mut config = Self::new(src_dir, toolchain_root);

        if let Some(name) = lookup(KERNEL_NAME_ENV) {
            config.kernel_name = name;
        }
        if let Some(path) = lookup(CLANG_PATH_ENV) {
            config.clang_override = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup(ANYKERNEL_URL_ENV) {
            config.template_url = url;
        }
        if let Some(branch) = lookup(BRANCH_ENV) {
            config.branch = branch;
        }
        if let Some(jobs) = lookup(JOBS_ENV) {
            config.jobs = parse_jobs(&jobs).with_context(|| format!("Invalid {}", JOBS_ENV))?;
        }
        if let Some(url) = lookup(KSU_URL_ENV) {
            config.kernelsu.url = url;
        }
        if let Some(sha) = lookup(KSU_SHA256_ENV) {
            config.kernelsu.sha256 = Some(sha.to_ascii_lowercase());
        }

        Ok(config)
    }

    /// Fixed URL of the toolchain archive for the configured version.
    pub fn clang_url(&self) -> String {
        format!("{}/{}.tar.gz", CLANG_URL_BASE, self.clang_version)
    }

    /// Primary kernel image produced by the compile step.
    pub fn kernel_image(&self) -> PathBuf {
        self.out_dir.join("arch/arm64/boot/Image")
    }
}

/// Parse a positive job count.
pub fn parse_jobs(value: &str) -> Result<usize> {
    let jobs: usize = value
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a number", value))?;
    if jobs == 0 {
        anyhow::bail!("job count must be at least 1");
    }
    Ok(jobs)
}

/// Host logical core count, or 1 if unknown.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BuildConfig::new("/src", "/tc");
        assert_eq!(config.out_dir, Path::new("/src/out"));
        assert_eq!(config.template_dir, Path::new("/src/AnyKernel3"));
        assert_eq!(config.kernel_name, "RIO");
        assert_eq!(config.branch, "qcom_rio");
        assert!(config.jobs >= 1);
        assert!(config.kernelsu.sha256.is_none());
    }

    #[test]
    fn test_clang_url_keyed_by_version() {
        let config = BuildConfig::new("/src", "/tc");
        assert!(config.clang_url().ends_with("/clang-r530567.tar.gz"));
        assert!(config.clang_url().starts_with("https://android.googlesource.com/"));
    }

    #[test]
    fn test_env_overrides() {
        let config = BuildConfig::from_lookup(
            Path::new("/src"),
            lookup(&[
                (TOOLCHAIN_DIR_ENV, "/cache"),
                (KERNEL_NAME_ENV, "Nova"),
                (JOBS_ENV, "3"),
                (KSU_SHA256_ENV, "ABCDEF"),
            ]),
        )
        .unwrap();
        assert_eq!(config.toolchain_root, Path::new("/cache"));
        assert_eq!(config.kernel_name, "Nova");
        assert_eq!(config.jobs, 3);
        assert_eq!(config.kernelsu.sha256.as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_invalid_jobs_rejected() {
        let result = BuildConfig::from_lookup(
            Path::new("/src"),
            lookup(&[(TOOLCHAIN_DIR_ENV, "/cache"), (JOBS_ENV, "0")]),
        );
        assert!(result.is_err());
        assert!(parse_jobs("many").is_err());
    }
}
