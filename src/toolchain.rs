//! Clang toolchain provisioning.
//!
//! Resolution order:
//!
//! 1. **Environment variable**: `CLANG_PATH` names an existing toolchain
//! 2. **Cache**: `<toolchain_root>/<version>/bin` already exists
//! 3. **Download**: fetch the prebuilt archive and extract it into the cache
//!
//! Tiers 1 and 2 never touch the network. A failed download or extraction is
//! not retried, and a half-written tarball or toolchain directory is left on
//! disk for the user to remove.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::{Cmd, CommandRunner};

/// A toolchain present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainHandle {
    pub version: String,
    pub dir: PathBuf,
}

impl ToolchainHandle {
    /// Directory prepended to PATH for builds.
    pub fn bin_dir(&self) -> PathBuf {
        self.dir.join("bin")
    }

    /// First line of `clang --version`, or "unknown".
    pub fn clang_version(&self, runner: &dyn CommandRunner) -> String {
        let clang = self.bin_dir().join("clang");
        runner
            .run(&Cmd::new(clang.to_string_lossy()).arg("--version").allow_fail())
            .ok()
            .filter(|r| r.success())
            .and_then(|r| r.stdout.lines().next().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Makes sure the configured clang is available locally.
pub struct ToolchainProvisioner<'a> {
    runner: &'a dyn CommandRunner,
    root: PathBuf,
    version: String,
    url: String,
    override_dir: Option<PathBuf>,
}

impl<'a> ToolchainProvisioner<'a> {
    pub fn new(config: &BuildConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            root: config.toolchain_root.clone(),
            version: config.clang_version.clone(),
            url: config.clang_url(),
            override_dir: config.clang_override.clone(),
        }
    }

    /// Cache directory for the configured version.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.version)
    }

    /// Find an already available toolchain (no download).
    pub fn find(&self) -> Option<ToolchainHandle> {
        if let Some(dir) = &self.override_dir {
            if dir.join("bin").is_dir() {
                return Some(self.handle(dir));
            }
            tracing::warn!(
                "CLANG_PATH={} has no bin/ directory, falling back to cache",
                dir.display()
            );
        }

        let cached = self.cache_dir();
        if cached.join("bin").is_dir() {
            return Some(self.handle(&cached));
        }
        None
    }

    /// Resolve the toolchain, downloading it if necessary.
    pub fn ensure(&self) -> Result<ToolchainHandle> {
        if let Some(handle) = self.find() {
            tracing::debug!(dir = %handle.dir.display(), "toolchain cached");
            println!("Toolchain: {} (cached)", handle.dir.display());
            return Ok(handle);
        }

        let dir = self.cache_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let tarball = self.root.join(format!("{}.tar.gz", self.version));
        println!("Downloading Clang {}...", self.version);
        println!("  URL: {}", self.url);

        self.runner
            .run_interactive(
                &Cmd::new("wget")
                    .args(["-q", self.url.as_str(), "-O"])
                    .arg_path(&tarball),
            )
            .map_err(|e| {
                let network = BuildError::Network(format!("download of {} failed", self.url));
                e.context(network)
            })?;

        self.runner
            .run_interactive(
                &Cmd::new("tar")
                    .arg("xf")
                    .arg_path(&tarball)
                    .arg("-C")
                    .arg_path(&dir)
                    .error_msg(format!("Failed to extract {}", tarball.display())),
            )?;

        if tarball.exists() {
            fs::remove_file(&tarball)
                .with_context(|| format!("Failed to remove {}", tarball.display()))?;
        }

        let handle = self.handle(&dir);
        if !handle.bin_dir().is_dir() {
            bail!(BuildError::MissingArtifact(handle.bin_dir()));
        }

        println!("Toolchain: {} (downloaded)", dir.display());
        Ok(handle)
    }

    fn handle(&self, dir: &Path) -> ToolchainHandle {
        ToolchainHandle {
            version: self.version.clone(),
            dir: dir.to_path_buf(),
        }
    }
}
