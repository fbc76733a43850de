//! Kernel build stages.
//!
//! - `env` - per-stage environment overrides
//! - `kernel` - configure/compile make invocations
//! - `stage` - the clean → configure → compile → package state machine

pub mod env;
pub mod kernel;
pub mod stage;

pub use env::BuildEnvironment;
pub use stage::{BuildStage, StagePatch, StageSpec, StageState};
