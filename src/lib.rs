//! RIO kernel build library.
//!
//! Builds Samsung Snapdragon (`qcom_rio`) kernels with a pinned clang
//! toolchain and packages them as AnyKernel3 flashable zips.
//!
//! - [`toolchain`] - fetch and cache the clang toolchain
//! - [`source`] - branch switching, template checkout, patch sets
//! - [`build`] - environment, make invocations and the per-stage state machine
//! - [`artifact`] - flashable zip packaging
//! - [`pipeline`] - runs one or more stages for a device variant
//! - [`preflight`] - host checks before anything expensive happens

pub mod artifact;
pub mod build;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod source;
pub mod toolchain;
pub mod variant;

use std::time::{Duration, Instant};

/// Wall-clock timer for a named step.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Print the elapsed time and return it.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        let secs = elapsed.as_secs_f64();
        if secs >= 60.0 {
            println!("  [{}] {:.1}m", self.name, secs / 60.0);
        } else {
            println!("  [{}] {:.1}s", self.name, secs);
        }
        elapsed
    }
}
