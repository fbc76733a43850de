//! Flashable zip creation.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Top-level template files that never ship in the zip.
const EXCLUDED_FILES: &[&str] = &["README.md", "LICENSE"];

/// Whether a path (relative to the template root) is left out of the zip.
pub fn is_excluded(relative: &Path) -> bool {
    let mut components = relative.components();
    let Some(first) = components.next() else {
        return false;
    };
    let first = first.as_os_str().to_string_lossy();
    if first.starts_with(".git") {
        return true;
    }
    components.next().is_none() && EXCLUDED_FILES.contains(&first.as_ref())
}

/// Zip the contents of `src` into `dest`. Returns the number of files written.
///
/// Entry names are relative to `src` and Unix modes are preserved so the
/// installer's helper binaries stay executable.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<usize> {
    let file = File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let keep = |entry: &DirEntry| {
        entry
            .path()
            .strip_prefix(src)
            .map(|rel| !is_excluded(rel))
            .unwrap_or(true)
    };

    let mut files = 0;
    for entry in WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep)
    {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let options = options.unix_permissions(unix_mode(&entry)?);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else {
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path())
                .with_context(|| format!("Failed to open {}", entry.path().display()))?;
            io::copy(&mut input, &mut zip)?;
            files += 1;
        }
    }

    zip.finish()?.flush()?;
    Ok(files)
}

#[cfg(unix)]
fn unix_mode(entry: &DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(entry.metadata()?.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(entry: &DirEntry) -> Result<u32> {
    Ok(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_exclusions() {
        assert!(is_excluded(Path::new(".git")));
        assert!(is_excluded(Path::new(".git/config")));
        assert!(is_excluded(Path::new(".github")));
        assert!(is_excluded(Path::new("README.md")));
        assert!(is_excluded(Path::new("LICENSE")));
        assert!(!is_excluded(Path::new("tools/README.md")));
        assert!(!is_excluded(Path::new("anykernel.sh")));
    }

    #[test]
    fn test_zip_dir_contents() -> Result<()> {
        let temp = TempDir::new()?;
        let src = temp.path().join("ak3");
        fs::create_dir_all(src.join(".git"))?;
        fs::create_dir_all(src.join("tools"))?;
        fs::write(src.join(".git/HEAD"), "ref")?;
        fs::write(src.join("README.md"), "readme")?;
        fs::write(src.join("anykernel.sh"), "#!/bin/sh")?;
        fs::write(src.join("Image"), "kernel")?;
        fs::write(src.join("tools/ak3-core.sh"), "core")?;

        let dest = temp.path().join("out.zip");
        assert_eq!(zip_dir(&src, &dest)?, 3);

        let mut archive = zip::ZipArchive::new(File::open(&dest)?)?;
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["Image", "anykernel.sh", "tools/", "tools/ak3-core.sh"]);

        let mut image = String::new();
        io::Read::read_to_string(&mut archive.by_name("Image")?, &mut image)?;
        assert_eq!(image, "kernel");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_preserves_exec_bit() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new()?;
        let src = temp.path().join("ak3");
        fs::create_dir_all(&src)?;
        let script = src.join("anykernel.sh");
        fs::write(&script, "#!/bin/sh")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        let dest = temp.path().join("out.zip");
        zip_dir(&src, &dest)?;

        let mut archive = zip::ZipArchive::new(File::open(&dest)?)?;
        let mode = archive.by_name("anykernel.sh")?.unix_mode().unwrap_or(0);
        assert_eq!(mode & 0o777, 0o755);
        Ok(())
    }
}
