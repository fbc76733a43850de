//! Host tool validation.
//!
//! Checks that the external tools the pipeline shells out to are installed.

use super::CheckResult;
use crate::error::BuildError;
use crate::process::which;

/// Required host tools with their install suggestions.
const REQUIRED_TOOLS: &[(&str, &str, &str)] = &[
    ("git", "Check out branches, clone the template", "sudo apt install git"),
    ("curl", "Fetch patch set archives", "sudo apt install curl"),
    ("wget", "Download the clang toolchain", "sudo apt install wget"),
    ("tar", "Extract toolchain and patch archives", "sudo apt install tar"),
    ("make", "Drive the kernel build", "sudo apt install make"),
];

/// Check that all required host tools are installed.
pub fn check_host_tools() -> Vec<CheckResult> {
    REQUIRED_TOOLS
        .iter()
        .map(|(tool, purpose, install)| check_tool(tool, purpose, install))
        .collect()
}

/// Fail with [`BuildError::MissingDependency`] if any required tool is absent.
pub fn require_host_tools() -> Result<(), BuildError> {
    let missing: Vec<String> = REQUIRED_TOOLS
        .iter()
        .filter(|(tool, _, _)| which(tool).is_none())
        .map(|(tool, _, _)| tool.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BuildError::MissingDependency(missing))
    }
}

fn check_tool(tool: &str, purpose: &str, install_cmd: &str) -> CheckResult {
    match which(tool) {
        Some(path) => CheckResult::pass(
            format!("{} tool", tool),
            format!("Found at {} ({})", path.display(), purpose),
        ),
        None => CheckResult::fail(
            format!("{} tool", tool),
            format!("Not found (needed for: {})", purpose),
            install_cmd,
        ),
    }
}
