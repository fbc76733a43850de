//! Per-stage build environment.
//!
//! A [`BuildEnvironment`] is assembled once per stage and attached to every
//! make invocation of that stage. The toolchain `bin/` directory always
//! precedes the inherited PATH.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/// Fixed variables for an Android common kernel (android11, KMI generation 2).
const FIXED_VARS: &[(&str, &str)] = &[
    ("ARCH", "arm64"),
    ("LLVM", "1"),
    ("LLVM_IAS", "1"),
    ("BRANCH", "android11"),
    ("KMI_GENERATION", "2"),
    ("DEPMOD", "depmod"),
    ("STOP_SHIP_TRACEPRINTK", "1"),
    ("IN_KERNEL_MODULES", "1"),
    ("DO_NOT_STRIP_MODULES", "1"),
];

const ANDROID_KCFLAGS: &str = "-D__ANDROID_COMMON_KERNEL__";

/// Environment overrides for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Build from the current process environment.
    pub fn new(toolchain_bin: &Path, localversion: &str) -> Self {
        Self::with_inherited(toolchain_bin, localversion, |key| env::var(key).ok())
    }

    /// Build from an explicit view of the inherited environment.
    pub fn with_inherited(
        toolchain_bin: &Path,
        localversion: &str,
        inherited: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut vars: BTreeMap<String, String> = FIXED_VARS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let kcflags = match inherited("KCFLAGS").filter(|v| !v.trim().is_empty()) {
            Some(existing) => format!("{} {}", existing.trim(), ANDROID_KCFLAGS),
            None => ANDROID_KCFLAGS.to_string(),
        };
        vars.insert("KCFLAGS".to_string(), kcflags);
        vars.insert("LOCALVERSION".to_string(), localversion.to_string());

        let bin = toolchain_bin.to_string_lossy();
        let path = match inherited("PATH").filter(|p| !p.is_empty()) {
            Some(existing) => format!("{}:{}", bin, existing),
            None => bin.into_owned(),
        };
        vars.insert("PATH".to_string(), path);

        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
