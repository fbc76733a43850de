//! One complete clean → configure → compile → package cycle.
//!
//! ```text
//! Init ─▶ Cleaned ─▶ Configured ─▶ Compiled ─▶ Packaged ─▶ Done
//!   └─────────┴───────────┴────────────┴───────────┴──▶ Failed
//! ```
//!
//! A missing kernel image after compiling goes straight to `Failed`; the
//! packager is never invoked.

use anyhow::Result;
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;

use super::env::BuildEnvironment;
use super::kernel;
use crate::artifact::Packager;
use crate::config::{BuildConfig, PinnedArchive};
use crate::error::BuildError;
use crate::filesystem::reset_dir;
use crate::process::CommandRunner;
use crate::source::{PatchSet, SourceStager, KERNELSU};
use crate::toolchain::ToolchainHandle;
use crate::variant::BuildVariant;

/// Patch set applied during the clean step, with its pinned source.
#[derive(Debug, Clone)]
pub struct StagePatch {
    pub set: PatchSet,
    pub source: PinnedArchive,
}

/// What one stage builds.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Short name for logs ("vanilla", "ksu").
    pub name: String,
    /// Branch or ref checked out before building.
    pub reference: String,
    /// Used in LOCALVERSION and the archive name.
    pub label: String,
    pub patch: Option<StagePatch>,
}

impl StageSpec {
    /// Unmodified build of the configured branch.
    pub fn vanilla(config: &BuildConfig) -> Self {
        Self {
            name: "vanilla".to_string(),
            reference: config.branch.clone(),
            label: config.kernel_name.clone(),
            patch: None,
        }
    }

    /// Build of the configured branch with KernelSU injected.
    pub fn kernelsu(config: &BuildConfig) -> Self {
        Self {
            name: "ksu".to_string(),
            reference: config.branch.clone(),
            label: format!("{}-KSU", config.kernel_name),
            patch: Some(StagePatch {
                set: KERNELSU,
                source: config.kernelsu.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Init,
    Cleaned,
    Configured,
    Compiled,
    Packaged,
    Done,
    Failed,
}

impl StageState {
    /// `Done` or `Failed`; a stage in either state never runs again.
    pub fn is_terminal(self) -> bool {
        matches!(self, StageState::Done | StageState::Failed)
    }

    /// What the stage is doing when leaving this state.
    fn next_step(self) -> &'static str {
        match self {
            StageState::Init => "cleaning",
            StageState::Cleaned => "configuring",
            StageState::Configured => "compiling",
            StageState::Compiled => "packaging",
            StageState::Packaged => "finishing",
            StageState::Done | StageState::Failed => "finished",
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Drives one [`StageSpec`] through the state machine.
pub struct BuildStage<'a> {
    spec: &'a StageSpec,
    variant: &'a BuildVariant,
    config: &'a BuildConfig,
    toolchain: &'a ToolchainHandle,
    runner: &'a dyn CommandRunner,
    date: NaiveDate,
    state: StageState,
}

impl<'a> BuildStage<'a> {
    pub fn new(
        spec: &'a StageSpec,
        variant: &'a BuildVariant,
        config: &'a BuildConfig,
        toolchain: &'a ToolchainHandle,
        runner: &'a dyn CommandRunner,
        date: NaiveDate,
    ) -> Self {
        Self {
            spec,
            variant,
            config,
            toolchain,
            runner,
            date,
            state: StageState::Init,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// Run to `Done`, returning the archive path.
    pub fn run(&mut self) -> Result<PathBuf> {
        if self.state.is_terminal() {
            anyhow::bail!("stage '{}' already ran ({})", self.spec.name, self.state);
        }
        match self.advance() {
            Ok(archive) => Ok(archive),
            Err(e) => {
                let step = self.state.next_step();
                tracing::debug!(stage = %self.spec.name, from = %self.state, "stage failed");
                self.state = StageState::Failed;
                Err(e.context(format!("stage '{}' failed while {}", self.spec.name, step)))
            }
        }
    }

    fn advance(&mut self) -> Result<PathBuf> {
        let stager = SourceStager::new(self.config, self.runner);

        // Init -> Cleaned
        stager.switch(&self.spec.reference)?;
        reset_dir(&self.config.out_dir)?;
        if let Some(patch) = &self.spec.patch {
            stager.apply_patch_set(&patch.set, &patch.source)?;
        }
        self.transition(StageState::Cleaned);

        let revision = stager.head_revision()?;
        let localversion = kernel::local_version(&self.spec.label, &revision, self.variant);
        let env = BuildEnvironment::new(&self.toolchain.bin_dir(), &localversion);
        self.print_banner(&localversion);

        // Cleaned -> Configured
        kernel::configure(self.runner, self.config, self.variant, &env)?;
        self.transition(StageState::Configured);

        // Configured -> Compiled
        kernel::compile(self.runner, self.config, &env)?;
        self.transition(StageState::Compiled);

        let image = self.config.kernel_image();
        if !image.is_file() {
            return Err(BuildError::MissingArtifact(image).into());
        }

        // Compiled -> Packaged
        let archive =
            Packager::new(self.config).package(&self.spec.label, self.variant, self.date)?;
        self.transition(StageState::Packaged);

        self.transition(StageState::Done);
        Ok(archive)
    }

    fn transition(&mut self, next: StageState) {
        tracing::debug!(stage = %self.spec.name, from = %self.state, to = %next, "transition");
        self.state = next;
    }

    fn print_banner(&self, localversion: &str) {
        println!("================================");
        println!(" Stage       : {}", self.spec.name);
        println!(" Kernel Name : {}", self.spec.label);
        println!(" Device      : {}", self.variant.device);
        println!(" Variant     : {}", self.variant.id);
        println!(" Toolchain   : {}", self.toolchain.clang_version(self.runner));
        println!(" LOCALVERSION: {}", localversion);
        println!("================================");
    }
}
