//! The single point through which every external tool runs.
//!
//! [`CommandRunner`] is the narrow seam: it executes a [`ToolCommand`] and
//! hands back raw output. [`run_checked`] layers the shared policy on top:
//! echo the command line, compare the exit code against the accepted set, and
//! dump captured output on failure.

use crate::error::BuildError;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

/// A program invocation plus the exit codes that count as success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: Utf8PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<Utf8PathBuf>,
    pub ok_codes: Vec<i32>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<Utf8Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            ok_codes: vec![0],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Utf8Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn ok_codes(mut self, codes: &[i32]) -> Self {
        self.ok_codes = codes.to_vec();
        self
    }

    pub fn accepts(&self, code: i32) -> bool {
        self.ok_codes.contains(&code)
    }

    /// Value following `flag`, e.g. the `-o` target
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Executes external commands to completion.
///
/// Implementations only report what happened; acceptance of the exit code is
/// decided by [`run_checked`].
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn execute(&self, command: &ToolCommand) -> Result<CommandOutput>;
}

/// Runs commands as real subprocesses via tokio
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// `None` waits for the process however long it takes
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ProcessRunner {
    async fn execute(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(command.program.as_std_path());
        cmd.args(&command.args).kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        let output_future = cmd.output();
        let output = match self.timeout {
            Some(limit) => timeout(limit, output_future).await.map_err(|_| {
                tracing::warn!("{} timed out after {:?}", command.program, limit);
                BuildError::CommandTimeout {
                    program: command.program.to_string(),
                    after: limit,
                }
            })?,
            None => output_future.await,
        }
        .with_context(|| format!("Failed to spawn {}", command.program))?;

        let exit_code = output.status.code().unwrap_or(-1);

        tracing::debug!(
            "{} completed in {:.2}s with exit code {}",
            command.program,
            start.elapsed().as_secs_f32(),
            exit_code
        );

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `command`, failing with [`BuildError::CommandFailed`] unless its exit
/// code is in the accepted set.
pub async fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    command: &ToolCommand,
) -> Result<CommandOutput> {
    tracing::info!(">> {}", command);

    let output = runner.execute(command).await?;

    if !command.accepts(output.exit_code) {
        if !output.stdout.trim().is_empty() {
            tracing::error!("stdout:\n{}", output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            tracing::error!("stderr:\n{}", output.stderr.trim_end());
        }
        return Err(BuildError::CommandFailed {
            program: command.program.to_string(),
            code: output.exit_code,
        }
        .into());
    }

    if output.exit_code != 0 {
        tracing::warn!(
            "{} exited with tolerated code {}",
            command.program,
            output.exit_code
        );
    }

    Ok(output)
}
