//! External command execution and the install/build step.
//!
//! Every external tool (the install step and `yarn pack`) runs through the
//! [`CommandExecutor`] capability so that pipeline logic can be tested with
//! a stub instead of real tooling.

use crate::error::{PublisherError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fmt;
use std::process::{Command, Output, Stdio};

/// Default install/build command run in the snapshot root.
pub const DEFAULT_INSTALL_COMMAND: &str = "yarn";

/// An external command to run in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory of the process.
    pub cwd: Utf8PathBuf,
}

impl CommandSpec {
    /// Create a command spec.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I, cwd: impl Into<Utf8PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
        }
    }

    /// Split a shell-like command line on whitespace.
    ///
    /// Returns `None` for a blank command line.
    ///
    /// # Examples
    ///
    /// ```
    /// use nightly_publisher::builder::CommandSpec;
    ///
    /// let spec = CommandSpec::from_command_line("yarn install --frozen-lockfile", "/tmp/src")
    ///     .expect("non-empty command");
    /// assert_eq!(spec.program, "yarn");
    /// assert_eq!(spec.args, vec!["install", "--frozen-lockfile"]);
    /// ```
    #[must_use]
    pub fn from_command_line(line: &str, cwd: impl Into<Utf8PathBuf>) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program, words, cwd))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command to completion and returns its output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    fn run(&self, spec: &CommandSpec) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// With `forward_output` set, the child inherits this process's stdout and
/// stderr and the returned [`Output`] carries empty buffers; otherwise output
/// is captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    /// Stream child output to the terminal instead of capturing it.
    pub forward_output: bool,
}

impl SystemCommandExecutor {
    /// An executor that streams child output to the terminal.
    #[must_use]
    pub const fn forwarding() -> Self {
        Self {
            forward_output: true,
        }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        debug!("running `{spec}` in {}", spec.cwd);
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(spec.cwd.as_std_path())
            .stdin(Stdio::null());

        let spawn_error = |e| PublisherError::filesystem(spec.cwd.clone(), e);
        if self.forward_output {
            let status = cmd.status().map_err(spawn_error)?;
            Ok(Output {
                status,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        } else {
            cmd.output().map_err(spawn_error)
        }
    }
}

/// Describe why a finished command counts as failed.
#[must_use]
pub fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.to_owned()
    }
}

/// Runs the dependency install/build step against a snapshot.
pub struct Builder<'a> {
    executor: &'a dyn CommandExecutor,
    command_line: String,
}

impl<'a> Builder<'a> {
    /// Create a builder running `command_line` (for example `yarn`).
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, command_line: impl Into<String>) -> Self {
        Self {
            executor,
            command_line: command_line.into(),
        }
    }

    /// Run the install step with `source_dir` as the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Build`] if the command line is blank, cannot
    /// be started, or exits unsuccessfully.
    pub fn install(&self, source_dir: &Utf8Path) -> Result<()> {
        let spec = CommandSpec::from_command_line(&self.command_line, source_dir).ok_or_else(
            || PublisherError::Build {
                command: self.command_line.clone(),
                directory: source_dir.to_owned(),
                reason: "install command is empty".to_owned(),
            },
        )?;

        let output = self.executor.run(&spec).map_err(|e| PublisherError::Build {
            command: spec.to_string(),
            directory: source_dir.to_owned(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(PublisherError::Build {
                command: spec.to_string(),
                directory: source_dir.to_owned(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }
}
