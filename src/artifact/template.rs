//! AnyKernel3 template staging.
//!
//! Clears whatever a previous packaging run left in the template, copies the
//! fresh kernel outputs in, and turns off the template's device check so the
//! zip flashes on every supported variant.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::error::BuildError;
use crate::filesystem::remove_path;

/// Template entries produced by earlier packaging runs.
const STALE_ENTRIES: &[&str] = &["Image", "Image.gz", "Image.gz-dtb", "dtbo.img", "dtb", "dtbs"];

/// Installer script shipped by the template.
pub const INSTALLER_SCRIPT: &str = "anykernel.sh";

const DEVICE_CHECK_ON: &str = "do.devicecheck=1";
const DEVICE_CHECK_OFF: &str = "do.devicecheck=0";

/// Remove kernel outputs and archives left over from a previous run.
pub fn clear_stale(template: &Path) -> Result<()> {
    for entry in STALE_ENTRIES {
        remove_path(&template.join(entry))?;
    }

    for entry in fs::read_dir(template)
        .with_context(|| format!("Failed to read {}", template.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "zip") {
            remove_path(&path)?;
        }
    }
    Ok(())
}

/// Copy `src` into `template` under its own file name.
pub fn copy_into(src: &Path, template: &Path) -> Result<()> {
    let name = src
        .file_name()
        .with_context(|| format!("{} has no file name", src.display()))?;
    fs::copy(src, template.join(name))
        .with_context(|| format!("Failed to copy {} into template", src.display()))?;
    Ok(())
}

/// Copy every `*.dtb` in `dts_dir` into `<template>/dtbs/`.
///
/// Returns `None` when `dts_dir` does not exist; packaging carries on
/// without device-tree blobs in that case.
pub fn copy_dtbs(dts_dir: &Path, template: &Path) -> Result<Option<usize>> {
    if !dts_dir.is_dir() {
        tracing::warn!(dir = %dts_dir.display(), "no device-tree output, skipping DTBs");
        return Ok(None);
    }

    let mut blobs: Vec<_> = fs::read_dir(dts_dir)
        .with_context(|| format!("Failed to read {}", dts_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "dtb"))
        .collect();
    blobs.sort();

    let dest = template.join("dtbs");
    fs::create_dir_all(&dest)?;
    for blob in &blobs {
        copy_into(blob, &dest)?;
    }
    Ok(Some(blobs.len()))
}

/// Rewrite the installer's device check to disabled.
///
/// Runs on every packaging pass; a script that is already disabled is
/// rewritten unchanged.
pub fn disable_device_check(template: &Path) -> Result<()> {
    let script = template.join(INSTALLER_SCRIPT);
    if !script.is_file() {
        return Err(BuildError::MissingArtifact(script).into());
    }
    let content = fs::read_to_string(&script)
        .with_context(|| format!("Failed to read {}", script.display()))?;
    fs::write(&script, content.replace(DEVICE_CHECK_ON, DEVICE_CHECK_OFF))
        .with_context(|| format!("Failed to write {}", script.display()))?;
    Ok(())
}
