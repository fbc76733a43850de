//! External command execution.
//!
//! [`Cmd`] describes a command (program, arguments, working directory, and
//! environment overrides). A [`CommandRunner`] executes it. Build code takes a
//! `&dyn CommandRunner` so the whole pipeline can be driven against a recording
//! fake in tests; [`System`] is the real implementation.
//!
//! Overrides are layered on top of the inherited process environment for that
//! one child only. Nothing here ever calls `std::env::set_var`.
//!
//! A non-zero exit is an error unless the command was marked
//! [`Cmd::allow_fail`]. There is no retry and no timeout.

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::BuildError;

/// A command to run.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            envs: Vec::new(),
            error_msg: None,
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Working directory for the child.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Environment overrides for the child.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Message attached to the error when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Return the result instead of failing on non-zero exit.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Command line as it would be typed, for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run with captured output on the host.
    pub fn run(&self) -> Result<CommandResult> {
        System.run(self)
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        command
    }

    fn failure(&self, status: String) -> anyhow::Error {
        let err = anyhow::Error::new(BuildError::ExternalCommand {
            command: self.display(),
            status,
        });
        match &self.error_msg {
            Some(msg) => err.context(msg.clone()),
            None => err,
        }
    }
}

/// Outcome of a captured command.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes [`Cmd`]s.
pub trait CommandRunner {
    /// Run to completion, capturing stdout/stderr.
    fn run(&self, cmd: &Cmd) -> Result<CommandResult>;

    /// Run to completion with inherited stdio. Used for long builds and
    /// downloads whose progress the user should see.
    fn run_interactive(&self, cmd: &Cmd) -> Result<()>;

    /// Run and return trimmed stdout.
    fn output(&self, cmd: &Cmd) -> Result<String> {
        Ok(self.run(cmd)?.stdout.trim().to_string())
    }
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl CommandRunner for System {
    fn run(&self, cmd: &Cmd) -> Result<CommandResult> {
        tracing::info!("[CMD] {}", cmd.display());
        let output = cmd
            .to_command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn '{}'", cmd.program))?;

        let result = CommandResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() && !cmd.allow_fail {
            let stderr = result.stderr.trim();
            let err = cmd.failure(output.status.to_string());
            return Err(if stderr.is_empty() {
                err
            } else {
                err.context(stderr.to_string())
            });
        }
        Ok(result)
    }

    fn run_interactive(&self, cmd: &Cmd) -> Result<()> {
        tracing::info!("[CMD] {}", cmd.display());
        let status = cmd
            .to_command()
            .status()
            .with_context(|| format!("Failed to spawn '{}'", cmd.program))?;

        if !status.success() && !cmd.allow_fail {
            return Err(cmd.failure(status.to_string()));
        }
        Ok(())
    }
}

/// Locate a tool on PATH.
pub fn which(tool: &str) -> Option<PathBuf> {
    which::which(tool).ok()
}
