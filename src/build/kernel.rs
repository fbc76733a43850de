//! Kernel configure and compile steps.
//!
//! Both steps are plain `make` invocations against the source tree with an
//! out-of-tree `O=` directory. Parallelism is handed to make; this crate only
//! waits for it to exit.

use anyhow::Result;

use super::env::BuildEnvironment;
use crate::config::{BuildConfig, DEFCONFIG};
use crate::process::{Cmd, CommandRunner};
use crate::variant::BuildVariant;

/// Android branch and KMI generation baked into LOCALVERSION.
const KMI_TAG: &str = "android11-2";

/// LOCALVERSION suffix, e.g. `-RIO-android11-2-a1b2c3d-a73xq`.
pub fn local_version(label: &str, revision: &str, variant: &BuildVariant) -> String {
    format!("-{}-{}-{}-{}", label, KMI_TAG, revision, variant.id)
}

/// `make <defconfig> <variant>.config`.
pub fn configure(
    runner: &dyn CommandRunner,
    config: &BuildConfig,
    variant: &BuildVariant,
    env: &BuildEnvironment,
) -> Result<()> {
    println!("Configuring {} + {}...", DEFCONFIG, variant.config_fragment());
    runner.run_interactive(
        &make(config, env)
            .arg(DEFCONFIG)
            .arg(variant.config_fragment())
            .error_msg(format!("Kernel configuration failed for {}", variant.id)),
    )
}

/// Full kernel build.
pub fn compile(
    runner: &dyn CommandRunner,
    config: &BuildConfig,
    env: &BuildEnvironment,
) -> Result<()> {
    println!("Compiling with {} jobs...", config.jobs);
    runner.run_interactive(&make(config, env).error_msg("Kernel compilation failed"))
}

fn make(config: &BuildConfig, env: &BuildEnvironment) -> Cmd {
    Cmd::new("make")
        .arg(format!("-j{}", config.jobs))
        .arg("-C")
        .arg_path(&config.src_dir)
        .arg(format!("O={}", config.out_dir.display()))
        .dir(&config.src_dir)
        .envs(env.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;
    use std::path::Path;

    fn setup() -> (BuildConfig, BuildEnvironment, &'static BuildVariant) {
        let mut config = BuildConfig::new("/src", "/tc");
        config.jobs = 8;
        let env = BuildEnvironment::with_inherited(Path::new("/tc/bin"), "-RIO", |_| None);
        (config, env, BuildVariant::lookup("a73xq").unwrap())
    }

    #[test]
    fn test_local_version() {
        let variant = BuildVariant::lookup("m52xq").unwrap();
        assert_eq!(
            local_version("RIO", "a1b2c3d", variant),
            "-RIO-android11-2-a1b2c3d-m52xq"
        );
    }

    #[test]
    fn test_configure_command() -> Result<()> {
        let (config, env, variant) = setup();
        let runner = RecordingRunner::new();
        configure(&runner, &config, variant, &env)?;

        assert_eq!(
            runner.lines(),
            vec!["make -j8 -C /src O=/src/out rio_defconfig a73xq.config"]
        );
        assert_eq!(runner.calls()[0].get_env("ARCH"), Some("arm64"));
        Ok(())
    }

    #[test]
    fn test_compile_command() -> Result<()> {
        let (config, env, _) = setup();
        let runner = RecordingRunner::new();
        compile(&runner, &config, &env)?;

        assert_eq!(runner.lines(), vec!["make -j8 -C /src O=/src/out"]);
        assert_eq!(runner.calls()[0].get_env("PATH"), Some("/tc/bin"));
        Ok(())
    }
}
