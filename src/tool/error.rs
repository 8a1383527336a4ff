use std::fmt;
use std::time::Duration;

/// How many trailing stdout lines to keep when a tool fails without stderr.
const STDOUT_TAIL_LINES: usize = 10;

/// Structured error type for external tool invocations.
///
/// Every provisioning, configuration and inspection call funnels its failures
/// through this type so callers can tell a slow tool from a broken one from a
/// missing binary.
#[derive(Debug)]
pub enum ToolError {
    /// Tool did not finish within its timeout.
    Timeout { command: String, timeout: Duration },

    /// Tool ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Tool binary couldn't be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },
}

impl ToolError {
    /// Create a timeout error.
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        ToolError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Create a command-failed error from captured output.
    ///
    /// The cause is taken from stderr; tools that report on stdout only
    /// (ansible does this) get the tail of stdout instead.
    pub fn failed(cmd: impl Into<String>, stdout: &str, stderr: &str, exit_code: Option<i32>) -> Self {
        let stderr = stderr.trim();
        let cause = if stderr.is_empty() {
            let lines: Vec<&str> = stdout.trim().lines().collect();
            let start = lines.len().saturating_sub(STDOUT_TAIL_LINES);
            lines[start..].join("\n")
        } else {
            stderr.to_string()
        };
        ToolError::CommandFailed {
            command: cmd.into(),
            stderr: cause,
            exit_code,
        }
    }

    /// Create an exec-failed error (binary not found / permission denied).
    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        ToolError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }

    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            ToolError::Timeout { command, .. }
            | ToolError::CommandFailed { command, .. }
            | ToolError::ExecFailed { command, .. } => command,
        }
    }

    /// Human-readable cause, without the command line.
    pub fn cause(&self) -> String {
        match self {
            ToolError::Timeout { timeout, .. } => {
                format!("timed out after {} seconds", timeout.as_secs())
            }
            ToolError::CommandFailed { stderr, .. } => stderr.clone(),
            ToolError::ExecFailed { source, .. } => source.to_string(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Timeout { command, timeout } => {
                write!(
                    f,
                    "Timed out running '{}' (exceeded {} seconds)",
                    command,
                    timeout.as_secs()
                )
            }
            ToolError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            ToolError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
