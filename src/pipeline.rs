//! Pipeline driver.
//!
//! Validates the variant, provisions the toolchain and packaging template once,
//! then runs each [`StageSpec`] in order. The first failing stage aborts the
//! run; later stages are never attempted.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

use crate::build::{BuildStage, StageSpec};
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::process::CommandRunner;
use crate::source::SourceStager;
use crate::toolchain::ToolchainProvisioner;
use crate::variant::BuildVariant;
use crate::Timer;

/// Outcome of one completed stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub archive: PathBuf,
    pub elapsed: Duration,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn archives(&self) -> Vec<&PathBuf> {
        self.stages.iter().map(|s| &s.archive).collect()
    }

    pub fn print_summary(&self) {
        println!("\n=== Build Complete ===");
        for stage in &self.stages {
            println!(
                "  [{}] {} ({:.1}s)",
                stage.name,
                stage.archive.display(),
                stage.elapsed.as_secs_f64()
            );
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a BuildConfig,
    runner: &'a dyn CommandRunner,
    date: NaiveDate,
}

impl<'a> Pipeline<'a> {
    /// Pipeline stamping archives with today's local date.
    pub fn new(config: &'a BuildConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            date: chrono::Local::now().date_naive(),
        }
    }

    /// Override the archive date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn run(&self, variant_id: &str, specs: &[StageSpec]) -> Result<PipelineReport> {
        let variant = BuildVariant::lookup(variant_id)?;
        if specs.is_empty() {
            bail!(BuildError::Usage("no stages selected".to_string()));
        }

        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        tracing::info!(variant = variant.id, stages = ?names, "starting pipeline");

        let toolchain = ToolchainProvisioner::new(self.config, self.runner).ensure()?;
        SourceStager::new(self.config, self.runner).ensure_template()?;

        let mut report = PipelineReport::default();
        for spec in specs {
            let timer = Timer::start(&format!("Stage '{}'", spec.name));
            let archive = BuildStage::new(
                spec,
                variant,
                self.config,
                &toolchain,
                self.runner,
                self.date,
            )
            .run()?;

            report.stages.push(StageReport {
                name: spec.name.clone(),
                archive,
                elapsed: timer.finish(),
            });
        }

        Ok(report)
    }
}
