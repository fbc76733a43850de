//! Error taxonomy for the kernel build pipeline.
//!
//! Every failure is fatal for the current invocation. These variants exist so
//! callers (and tests) can tell failure classes apart; the CLI reports them all
//! the same way and exits with status 1.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad or missing command-line input.
    #[error("usage: {0}")]
    Usage(String),

    #[error("unknown variant '{id}' (known: {known})")]
    UnknownVariant { id: String, known: String },

    /// Required host tool is not on PATH.
    #[error("missing host tools: {}", .0.join(", "))]
    MissingDependency(Vec<String>),

    #[error("network operation failed: {0}")]
    Network(String),

    #[error("'{command}' exited with {status}")]
    ExternalCommand { command: String, status: String },

    /// Expected build output is absent.
    #[error("expected artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("patch set '{0}' has no pinned SHA-256; refusing to apply unverified code")]
    UntrustedPatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_lists_tools() {
        let err = BuildError::MissingDependency(vec!["git".into(), "wget".into()]);
        assert_eq!(err.to_string(), "missing host tools: git, wget");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = BuildError::MissingArtifact(PathBuf::from("out/Image")).into();
        let err = err.context("packaging failed");
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingArtifact(_))
        ));
    }
}
