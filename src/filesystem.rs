//! Small filesystem helpers shared by staging and packaging.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Remove a file, symlink or directory tree if present.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.with_context(|| format!("Failed to remove {}", path.display()))
}

/// Move `src` to `dst`, replacing `dst`.
///
/// Falls back to copy + delete when a rename is not possible (e.g. across
/// filesystems).
pub fn atomic_move(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))?;
    Ok(())
}

/// Recreate `dir` empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    remove_path(dir)?;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}
