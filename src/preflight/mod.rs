//! Preflight checks for kernel build prerequisites.
//!
//! Validates that prerequisites are met BEFORE starting expensive operations
//! like downloading the toolchain or compiling.
//!
//! # Checks Performed
//!
//! - **Host tools**: git, curl, wget, tar, make are installed
//! - **Network**: toolchain host and template repository are reachable
//! - **Disk space**: enough room for the toolchain and build output
//! - **Cache status**: reports what's already on disk
//!
//! # Usage
//!
//! ```rust,ignore
//! use rio_build::preflight::PreflightChecker;
//!
//! let checker = PreflightChecker::new(&config);
//! let report = checker.run_all().await;
//! report.print_summary();
//! ```

mod disk_space;
mod host_tools;
mod network;

pub use disk_space::{available_space, check_disk_space};
pub use host_tools::{check_host_tools, require_host_tools};
pub use network::check_endpoint;

use crate::config::BuildConfig;
use crate::process::System;
use crate::toolchain::ToolchainProvisioner;

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
    /// Optional suggestion for fixing the issue
    pub suggestion: Option<String>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Comprehensive preflight report.
#[derive(Debug, Default)]
pub struct PreflightReport {
    /// All check results
    pub checks: Vec<CheckResult>,
    pub cache_status: CacheStatus,
}

impl PreflightReport {
    /// Check if all preflight checks passed.
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Get all failing checks.
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Print a summary of the preflight checks.
    pub fn print_summary(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let status = if check.passed { "[OK]" } else { "[FAIL]" };
            println!("{} {}: {}", status, check.name, check.message);
            if let Some(suggestion) = &check.suggestion {
                println!("     Suggestion: {}", suggestion);
            }
        }

        println!();
        println!("=== Cache Status ===\n");
        self.cache_status.print();

        println!();
        if self.is_ok() {
            println!(
                "All preflight checks passed ({}/{})",
                self.passed_count(),
                self.total_count()
            );
        } else {
            println!(
                "Preflight checks failed: {} of {} passed",
                self.passed_count(),
                self.total_count()
            );
        }
    }
}

/// What is already on disk.
#[derive(Debug, Default)]
pub struct CacheStatus {
    pub has_toolchain: bool,
    pub has_template: bool,
    /// A kernel image from an earlier build is present
    pub has_kernel_image: bool,
    /// The KernelSU archive digest is pinned
    pub kernelsu_pinned: bool,
}

impl CacheStatus {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            has_toolchain: ToolchainProvisioner::new(config, &System).find().is_some(),
            has_template: config.template_dir.is_dir(),
            has_kernel_image: config.kernel_image().is_file(),
            kernelsu_pinned: config.kernelsu.sha256.is_some(),
        }
    }

    pub fn print(&self) {
        let status = |b: bool| if b { "[cached]" } else { "[missing]" };

        println!("{}  Clang toolchain", status(self.has_toolchain));
        println!("{}  AnyKernel3 template", status(self.has_template));
        println!("{}  Kernel image", status(self.has_kernel_image));
        println!(
            "{}  KernelSU digest",
            if self.kernelsu_pinned { "[pinned]" } else { "[unset]" }
        );
    }
}

/// Preflight checker for a build configuration.
pub struct PreflightChecker<'a> {
    config: &'a BuildConfig,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self { config }
    }

    /// Run all preflight checks and return a comprehensive report.
    pub async fn run_all(&self) -> PreflightReport {
        let mut report = PreflightReport::default();

        report.checks.extend(check_host_tools());
        report.checks.push(check_disk_space(&self.config.src_dir));

        let cache_status = CacheStatus::from_config(self.config);
        if !cache_status.has_toolchain {
            report
                .checks
                .push(check_endpoint("toolchain", &self.config.clang_url()).await);
        }
        if !cache_status.has_template {
            report
                .checks
                .push(check_endpoint("template", &self.config.template_url).await);
        }
        report.cache_status = cache_status;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_pass() {
        let result = CheckResult::pass("test", "passed");
        assert!(result.passed);
        assert!(result.suggestion.is_none());
    }

    #[test]
    fn test_check_result_fail() {
        let result = CheckResult::fail("test", "failed", "fix it");
        assert!(!result.passed);
        assert!(result.suggestion.is_some());
    }

    #[test]
    fn test_preflight_report_is_ok() {
        let mut report = PreflightReport::default();
        assert!(report.is_ok());

        report.checks.push(CheckResult::pass("test1", "ok"));
        assert!(report.is_ok());

        report.checks.push(CheckResult::fail("test2", "bad", "fix"));
        assert!(!report.is_ok());
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn test_cache_status() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path().join("src"), temp.path().join("tc"));
        let status = CacheStatus::from_config(&config);
        assert!(!status.has_toolchain);
        assert!(!status.has_template);

        fs::create_dir_all(&config.template_dir).unwrap();
        fs::create_dir_all(config.toolchain_root.join(&config.clang_version).join("bin")).unwrap();
        let status = CacheStatus::from_config(&config);
        assert!(status.has_toolchain);
        assert!(status.has_template);
        assert!(!status.has_kernel_image);
    }

    #[tokio::test]
    async fn test_cached_setup_skips_network_checks() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path().join("src"), temp.path().join("tc"));
        fs::create_dir_all(&config.template_dir).unwrap();
        fs::create_dir_all(config.toolchain_root.join(&config.clang_version).join("bin")).unwrap();

        let report = PreflightChecker::new(&config).run_all().await;
        assert!(!report.checks.iter().any(|c| c.name.starts_with("Network")));
    }
}
