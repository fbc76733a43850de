//! Third-party module injection.
//!
//! A [`PatchSet`] describes how a module shipped as a source archive is wired
//! into the kernel tree: which paths to clear first, where the archive is
//! unpacked, and the driver symlink and build-system hooks to add. Hooks are
//! only added when missing, so integrating twice leaves the tree unchanged.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::BuildError;
use crate::filesystem::remove_path;

/// Wiring for one injectable module.
#[derive(Debug, Clone, Copy)]
pub struct PatchSet {
    pub name: &'static str,
    /// Paths (relative to the source tree) removed before injection.
    pub remove: &'static [&'static str],
    /// Where the archive is unpacked.
    pub module_dir: &'static str,
    /// Driver symlink and its (relative) target.
    pub link: (&'static str, &'static str),
    /// Line appended to `drivers/Makefile`.
    pub makefile_line: &'static str,
    /// Line inserted before the final `endmenu` of `drivers/Kconfig`.
    pub kconfig_line: &'static str,
}

pub const KERNELSU: PatchSet = PatchSet {
    name: "kernelsu",
    remove: &["drivers/kernelsu", "KernelSU"],
    module_dir: "KernelSU",
    link: ("drivers/kernelsu", "../KernelSU/kernel"),
    makefile_line: "obj-$(CONFIG_KSU) += kernelsu/",
    kconfig_line: "source \"drivers/kernelsu/Kconfig\"",
};

impl PatchSet {
    /// Hook the unpacked module into the kernel build.
    pub fn integrate(&self, src_dir: &Path) -> Result<()> {
        let (link, target) = self.link;
        let link_path = src_dir.join(link);
        remove_path(&link_path)?;
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &link_path).with_context(|| {
            format!("Failed to symlink {} -> {}", link_path.display(), target)
        })?;

        let makefile = src_dir.join("drivers/Makefile");
        let content = read(&makefile)?;
        if let Some(updated) = append_makefile_hook(&content, self.makefile_line) {
            fs::write(&makefile, updated)
                .with_context(|| format!("Failed to write {}", makefile.display()))?;
        }

        let kconfig = src_dir.join("drivers/Kconfig");
        let content = read(&kconfig)?;
        if let Some(updated) = insert_kconfig_source(&content, self.kconfig_line) {
            fs::write(&kconfig, updated)
                .with_context(|| format!("Failed to write {}", kconfig.display()))?;
        }

        Ok(())
    }
}

/// `content` with `line` appended, or `None` if it is already there.
pub fn append_makefile_hook(content: &str, line: &str) -> Option<String> {
    if content.lines().any(|l| l.trim() == line) {
        return None;
    }
    let mut updated = content.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push('\n');
    updated.push_str(line);
    updated.push('\n');
    Some(updated)
}

/// `content` with `line` inserted before the last `endmenu`, or `None` if it
/// is already there. Without an `endmenu` the line is appended.
pub fn insert_kconfig_source(content: &str, line: &str) -> Option<String> {
    if content.lines().any(|l| l.trim() == line) {
        return None;
    }

    let mut lines: Vec<&str> = content.lines().collect();
    match lines.iter().rposition(|l| l.trim() == "endmenu") {
        Some(idx) => lines.insert(idx, line),
        None => lines.push(line),
    }
    let mut updated = lines.join("\n");
    updated.push('\n');
    Some(updated)
}

/// Check a file's SHA-256 against `expected` (hex, case-insensitive).
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(BuildError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        }
        .into());
    }
    tracing::debug!(path = %path.display(), "checksum verified");
    Ok(())
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_makefile_hook_appended_once() {
        let once = append_makefile_hook("obj-y += base/", KERNELSU.makefile_line).unwrap();
        assert_eq!(once, "obj-y += base/\n\nobj-$(CONFIG_KSU) += kernelsu/\n");
        assert!(append_makefile_hook(&once, KERNELSU.makefile_line).is_none());
    }

    #[test]
    fn test_kconfig_source_before_last_endmenu() {
        let content = "menu \"A\"\nendmenu\n\
                       menu \"Device Drivers\"\nsource \"drivers/base/Kconfig\"\nendmenu\n";
        let updated = insert_kconfig_source(content, KERNELSU.kconfig_line).unwrap();
        let lines: Vec<&str> = updated.lines().collect();
        assert_eq!(lines[4], KERNELSU.kconfig_line);
        assert_eq!(lines[5], "endmenu");
        assert_eq!(lines[1], "endmenu");
        assert!(insert_kconfig_source(&updated, KERNELSU.kconfig_line).is_none());
    }

    #[test]
    fn test_kconfig_without_endmenu_appends() {
        let updated = insert_kconfig_source("config FOO\n", KERNELSU.kconfig_line).unwrap();
        assert!(updated.ends_with("source \"drivers/kernelsu/Kconfig\"\n"));
    }

    #[test]
    fn test_integrate_is_idempotent() -> Result<()> {
        let temp = TempDir::new()?;
        let src = temp.path();
        fs::create_dir_all(src.join("drivers"))?;
        fs::write(src.join("drivers/Makefile"), "obj-y += base/\n")?;
        fs::write(src.join("drivers/Kconfig"), "menu \"Device Drivers\"\nendmenu\n")?;

        KERNELSU.integrate(src)?;
        let makefile = fs::read_to_string(src.join("drivers/Makefile"))?;
        let kconfig = fs::read_to_string(src.join("drivers/Kconfig"))?;
        KERNELSU.integrate(src)?;

        assert_eq!(fs::read_to_string(src.join("drivers/Makefile"))?, makefile);
        assert_eq!(fs::read_to_string(src.join("drivers/Kconfig"))?, kconfig);
        assert_eq!(
            fs::read_link(src.join("drivers/kernelsu"))?,
            Path::new("../KernelSU/kernel")
        );
        Ok(())
    }

    #[test]
    fn test_verify_sha256() -> Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("blob");
        fs::write(&file, b"abc")?;
        // SHA-256("abc")
        let digest = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        verify_sha256(&file, digest)?;

        let err = verify_sha256(&file, &"0".repeat(64)).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        Ok(())
    }
}
