//! Disk space check.
//!
//! A full arm64 kernel build with an out-of-tree `O=` directory plus the
//! clang toolchain needs a fair amount of room.

use super::CheckResult;
use crate::process::Cmd;
use std::path::Path;

/// Minimum free space in bytes (20 GB).
///
/// - clang toolchain: ~3 GB
/// - kernel objects and modules: ~10 GB
/// - template and archives: well under 1 GB
const MIN_DISK_SPACE_BYTES: u64 = 20 * 1024 * 1024 * 1024;

/// Check that sufficient disk space is available at `dir`.
pub fn check_disk_space(dir: &Path) -> CheckResult {
    let required_gb = gb(MIN_DISK_SPACE_BYTES);
    match available_space(dir) {
        Some(available) if available >= MIN_DISK_SPACE_BYTES => CheckResult::pass(
            "Disk space",
            format!("{:.1} GB available (need {:.1} GB)", gb(available), required_gb),
        ),
        Some(available) => CheckResult::fail(
            "Disk space",
            format!("Only {:.1} GB available, need {:.1} GB", gb(available), required_gb),
            "Free up disk space or build from a different directory",
        ),
        None => CheckResult::fail(
            "Disk space",
            "Failed to check available disk space",
            "Ensure df command is available",
        ),
    }
}

/// Available bytes on the filesystem holding `path`.
pub fn available_space(path: &Path) -> Option<u64> {
    Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(path)
        .allow_fail()
        .run()
        .ok()
        .filter(|r| r.success())
        .and_then(|r| {
            r.stdout
                .lines()
                .nth(1)
                .and_then(|line| line.trim().parse::<u64>().ok())
        })
}

fn gb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
