//! Flashable zip packaging.
//!
//! - `template` - stages kernel outputs into the AnyKernel3 template
//! - `archive` - zips the staged template
//!
//! [`Packager`] runs both and drops `<label>_<variant>_<YYYYMMDD>.zip` into the
//! source directory. Packaging twice on the same day replaces the earlier zip.

pub mod archive;
pub mod template;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::filesystem::atomic_move;
use crate::variant::BuildVariant;

/// Archive file name for a label, variant and date.
pub fn archive_name(label: &str, variant: &BuildVariant, date: NaiveDate) -> String {
    format!("{}_{}_{}.zip", label, variant.id, date.format("%Y%m%d"))
}

/// Paths the packager reads from.
struct PackagePaths {
    image: PathBuf,
    dtbo: PathBuf,
    dts_dir: PathBuf,
    template: PathBuf,
    dest_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl PackagePaths {
    fn new(config: &BuildConfig) -> Self {
        let boot = config.out_dir.join("arch/arm64/boot");
        Self {
            image: config.kernel_image(),
            dtbo: boot.join("dtbo.img"),
            dts_dir: boot.join("dts/vendor/qcom"),
            template: config.template_dir.clone(),
            dest_dir: config.src_dir.clone(),
            scratch_dir: config.out_dir.clone(),
        }
    }
}

/// Turns compiled kernel outputs into a flashable zip.
pub struct Packager {
    paths: PackagePaths,
}

impl Packager {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            paths: PackagePaths::new(config),
        }
    }

    /// Package the current build output.
    ///
    /// Fails with [`BuildError::MissingArtifact`] before touching the template
    /// if the kernel image is absent.
    pub fn package(&self, label: &str, variant: &BuildVariant, date: NaiveDate) -> Result<PathBuf> {
        let paths = &self.paths;
        if !paths.image.is_file() {
            return Err(BuildError::MissingArtifact(paths.image.clone()).into());
        }
        if !paths.template.is_dir() {
            return Err(BuildError::MissingArtifact(paths.template.clone()).into());
        }

        println!("Packaging {} for {}...", label, variant.device);

        template::clear_stale(&paths.template)?;
        template::copy_into(&paths.image, &paths.template)?;
        if paths.dtbo.is_file() {
            template::copy_into(&paths.dtbo, &paths.template)?;
        }
        if let Some(count) = template::copy_dtbs(&paths.dts_dir, &paths.template)? {
            println!("  {} device-tree blobs", count);
        }
        template::disable_device_check(&paths.template)?;

        let name = archive_name(label, variant, date);
        std::fs::create_dir_all(&paths.scratch_dir)?;
        let temp = paths.scratch_dir.join(format!("{}.tmp", name));
        let files = archive::zip_dir(&paths.template, &temp)
            .with_context(|| format!("Failed to create {}", name))?;

        let dest = paths.dest_dir.join(&name);
        atomic_move(&temp, &dest)?;

        tracing::info!(archive = %dest.display(), files, "package created");
        println!("  Archive: {}", dest.display());
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn fixture(root: &Path) -> Result<BuildConfig> {
        let config = BuildConfig::new(root.join("src"), root.join("toolchains"));
        let boot = config.out_dir.join("arch/arm64/boot");
        fs::create_dir_all(boot.join("dts/vendor/qcom"))?;
        fs::write(boot.join("Image"), "kernel")?;
        fs::write(boot.join("dts/vendor/qcom/yupik.dtb"), "dtb")?;
        fs::create_dir_all(config.template_dir.join(".git"))?;
        fs::write(
            config.template_dir.join("anykernel.sh"),
            "do.devicecheck=1\n",
        )?;
        Ok(config)
    }

    #[test]
    fn test_archive_name() {
        let variant = BuildVariant::lookup("a73xq").unwrap();
        assert_eq!(archive_name("RIO", variant, date()), "RIO_a73xq_20240309.zip");
    }

    #[test]
    fn test_package_creates_named_archive() -> Result<()> {
        let temp = TempDir::new()?;
        let config = fixture(temp.path())?;
        let variant = BuildVariant::lookup("a52sxq")?;

        let archive = Packager::new(&config).package("RIO", variant, date())?;

        assert_eq!(archive, config.src_dir.join("RIO_a52sxq_20240309.zip"));
        let mut zip = zip::ZipArchive::new(fs::File::open(&archive)?)?;
        let names: Vec<String> = zip.file_names().map(str::to_string).collect();
        assert!(names.contains(&"Image".to_string()));
        assert!(names.contains(&"dtbs/yupik.dtb".to_string()));
        assert!(!names.iter().any(|n| n.starts_with(".git")));

        let mut script = String::new();
        std::io::Read::read_to_string(&mut zip.by_name("anykernel.sh")?, &mut script)?;
        assert_eq!(script, "do.devicecheck=0\n");
        Ok(())
    }

    #[test]
    fn test_repackage_same_day_overwrites() -> Result<()> {
        let temp = TempDir::new()?;
        let config = fixture(temp.path())?;
        let variant = BuildVariant::lookup("m52xq")?;
        let packager = Packager::new(&config);

        let first = packager.package("RIO", variant, date())?;
        fs::write(config.kernel_image(), "kernel v2")?;
        let second = packager.package("RIO", variant, date())?;

        assert_eq!(first, second);
        let mut zip = zip::ZipArchive::new(fs::File::open(&second)?)?;
        let mut image = String::new();
        std::io::Read::read_to_string(&mut zip.by_name("Image")?, &mut image)?;
        assert_eq!(image, "kernel v2");

        let zips = fs::read_dir(&config.src_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "zip"))
            .count();
        assert_eq!(zips, 1);
        Ok(())
    }

    #[test]
    fn test_missing_image_leaves_template_untouched() -> Result<()> {
        let temp = TempDir::new()?;
        let config = fixture(temp.path())?;
        fs::remove_file(config.kernel_image())?;
        let variant = BuildVariant::lookup("a73xq")?;

        let err = Packager::new(&config).package("RIO", variant, date()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingArtifact(_))
        ));
        assert_eq!(
            fs::read_to_string(config.template_dir.join("anykernel.sh"))?,
            "do.devicecheck=1\n"
        );
        Ok(())
    }
}
