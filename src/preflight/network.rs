//! Network reachability checks.
//!
//! Verifies the toolchain host and template repository answer before a build
//! commits to downloading from them.

use super::CheckResult;

/// HEAD-request `url` and report whether it answered.
pub async fn check_endpoint(name: &str, url: &str) -> CheckResult {
    let result = tokio::process::Command::new("curl")
        .args([
            "--head",
            "--silent",
            "--location",
            "--fail",
            "--max-time", "10",
            "--output", "/dev/null",
            url,
        ])
        .output()
        .await;

    let check = format!("Network ({})", name);
    match result {
        Ok(output) if output.status.success() => {
            CheckResult::pass(check, format!("{} reachable", host(url)))
        }
        Ok(_) => CheckResult::fail(
            check,
            format!("{} unreachable", host(url)),
            "Check your internet connection or try again later",
        ),
        Err(e) => CheckResult::fail(
            check,
            format!("Failed to check network: {}", e),
            "Ensure curl is installed and you have network access",
        ),
    }
}

/// Host part of a URL, for display.
fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host() {
        assert_eq!(host("https://github.com/osm0sis/AnyKernel3.git"), "github.com");
        assert_eq!(host("android.googlesource.com/platform"), "android.googlesource.com");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let result = check_endpoint("bogus", "http://127.0.0.1:9/nothing").await;
        assert!(!result.passed);
        assert!(result.name.contains("bogus"));
    }
}
