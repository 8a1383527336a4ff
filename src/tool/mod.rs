//! External tool execution.
//!
//! Every provisioning, configuration and inspection call goes through a
//! [`ToolRunner`]. The production runner spawns child processes with a
//! timeout; tests substitute a scripted runner. Timeout expiry is reported as
//! [`ToolError::Timeout`] and is handled exactly like a non-zero exit.
//!
//! - `provision` - infrastructure provisioning tool (init/apply/destroy/outputs)
//! - `inspect` - cloud resource inspector (public address lookup)
//! - `configure` - configuration tool (procedure runs)

mod configure;
mod error;
mod inspect;
mod provision;

pub use configure::ConfigTool;
pub use error::ToolError;
pub use inspect::{parse_address, ResourceInspector};
pub use provision::{parse_outputs, ProvisionOutputs, Provisioner};

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A single external command to run.
///
/// `args` is what the process receives. Logs and error messages only ever
/// see the masked copy built alongside it, so secret arguments added through
/// [`ToolInvocation::secret_arg`] never leave the process boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    shown_args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
            shown_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        self.shown_args.push(arg.clone());
        self.args.push(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Pass `arg` to the process but show `shown` in logs and errors.
    pub fn secret_arg(mut self, arg: impl Into<String>, shown: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self.shown_args.push(shown.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Command line for logs and error messages, secrets masked.
    pub fn command_line(&self) -> String {
        if self.shown_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.shown_args.join(" "))
        }
    }
}

impl fmt::Debug for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolInvocation")
            .field("program", &self.program)
            .field("args", &self.shown_args)
            .field("cwd", &self.cwd)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into a [`ToolError::CommandFailed`].
    pub fn into_checked(self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::failed(
                invocation.command_line(),
                &self.stdout,
                &self.stderr,
                self.exit_code,
            ))
        }
    }
}

/// Executes external tool invocations.
///
/// `run` returns `Ok` for any process that ran to completion, whatever its
/// exit code. `Err` means the invocation itself failed (spawn error or
/// timeout).
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;

    /// Run and require a zero exit code.
    async fn run_checked(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.run(invocation).await?.into_checked(invocation)
    }
}

/// Runs tools as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        ProcessRunner
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let cmd_str = invocation.command_line();
        debug!("Running {}", cmd_str);

        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let started = Instant::now();
        let result = tokio::time::timeout(invocation.timeout, command.output()).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::exec_failed(cmd_str, e)),
            Err(_) => return Err(ToolError::timeout(cmd_str, invocation.timeout)),
        };

        let output = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        };

        debug!(
            "{} exited with {:?} after {:?}",
            cmd_str,
            output.exit_code,
            started.elapsed()
        );
        trace!("stdout: {}", output.stdout);
        trace!("stderr: {}", output.stderr);

        Ok(output)
    }
}
