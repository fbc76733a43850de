//! Kernel source tree and packaging template management.
//!
//! The pipeline assumes it owns the working tree. [`SourceStager::switch`]
//! throws away local modifications without asking.

pub mod patch;

pub use patch::{PatchSet, KERNELSU};

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::config::{BuildConfig, PinnedArchive};
use crate::error::BuildError;
use crate::filesystem::remove_path;
use crate::process::{Cmd, CommandRunner};

/// Stages the kernel source tree and the AnyKernel3 template.
pub struct SourceStager<'a> {
    runner: &'a dyn CommandRunner,
    src_dir: PathBuf,
    template_dir: PathBuf,
    template_url: String,
}

impl<'a> SourceStager<'a> {
    pub fn new(config: &BuildConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            src_dir: config.src_dir.clone(),
            template_dir: config.template_dir.clone(),
            template_url: config.template_url.clone(),
        }
    }

    /// Shallow-clone the packaging template unless it is already present.
    pub fn ensure_template(&self) -> Result<PathBuf> {
        if self.template_dir.is_dir() {
            tracing::debug!(dir = %self.template_dir.display(), "template present");
            return Ok(self.template_dir.clone());
        }

        println!("Cloning packaging template from {}...", self.template_url);
        self.runner
            .run_interactive(
                &Cmd::new("git")
                    .args(["clone", "--depth=1", self.template_url.as_str()])
                    .arg_path(&self.template_dir),
            )
            .map_err(|e| {
                e.context(BuildError::Network(format!(
                    "clone of {} failed",
                    self.template_url
                )))
            })?;

        Ok(self.template_dir.clone())
    }

    /// Hard-reset the tree and force-checkout `reference`.
    pub fn switch(&self, reference: &str) -> Result<()> {
        tracing::info!(reference, "switching source tree");
        self.git(&["reset", "--hard"])
            .with_context(|| format!("Failed to reset {}", self.src_dir.display()))?;
        self.git(&["checkout", "-f", reference])
            .with_context(|| format!("Failed to check out '{}'", reference))?;
        Ok(())
    }

    /// Short hash of HEAD.
    pub fn head_revision(&self) -> Result<String> {
        let rev = self.runner.output(
            &Cmd::new("git")
                .args(["rev-parse", "--short", "HEAD"])
                .dir(&self.src_dir)
                .error_msg("Failed to read HEAD revision"),
        )?;
        if rev.is_empty() {
            anyhow::bail!("git rev-parse returned an empty revision");
        }
        Ok(rev)
    }

    /// Inject a third-party module into the tree from a pinned archive.
    ///
    /// Replaces any previous copy. The archive is verified against its pinned
    /// SHA-256 before anything is extracted; an unpinned archive is refused.
    pub fn apply_patch_set(&self, set: &PatchSet, source: &PinnedArchive) -> Result<()> {
        println!("Applying patch set '{}'...", set.name);

        let expected = source
            .sha256
            .as_deref()
            .ok_or_else(|| BuildError::UntrustedPatch(set.name.to_string()))?;

        for dir in set.remove {
            let path = self.src_dir.join(dir);
            remove_path(&path)?;
        }

        let downloads = self.src_dir.join(".rio-downloads");
        fs::create_dir_all(&downloads)
            .with_context(|| format!("Failed to create {}", downloads.display()))?;
        let archive = downloads.join(format!("{}.tar.gz", set.name));

        self.runner
            .run_interactive(
                &Cmd::new("curl")
                    .args(["-fsSL", "-o"])
                    .arg_path(&archive)
                    .arg(&source.url),
            )
            .map_err(|e| {
                e.context(BuildError::Network(format!(
                    "download of {} failed",
                    source.url
                )))
            })?;

        if let Err(e) = patch::verify_sha256(&archive, expected) {
            let _ = fs::remove_file(&archive);
            return Err(e);
        }

        let module_dir = self.src_dir.join(set.module_dir);
        fs::create_dir_all(&module_dir)
            .with_context(|| format!("Failed to create {}", module_dir.display()))?;
        self.runner.run_interactive(
            &Cmd::new("tar")
                .arg("xzf")
                .arg_path(&archive)
                .arg("-C")
                .arg_path(&module_dir)
                .arg("--strip-components=1")
                .error_msg(format!("Failed to extract {}", archive.display())),
        )?;

        set.integrate(&self.src_dir)?;
        println!("  Patch set '{}' applied", set.name);
        Ok(())
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        self.runner
            .run(&Cmd::new("git").args(args).dir(&self.src_dir))
            .map(|_| ())
    }
}
