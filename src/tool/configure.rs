use super::{ToolInvocation, ToolOutput, ToolRunner};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Wrapper around the configuration-management tool (ansible-playbook).
///
/// Variables are flat string pairs, passed as one JSON `--extra-vars` object
/// so values containing spaces or commas need no shell quoting.
/// Variables whose values never appear in logs or error messages.
const SECRET_VARS: &[&str] = &["db_pass"];

fn masked(vars: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    vars.iter()
        .map(|(key, value)| {
            if SECRET_VARS.contains(&key.as_str()) {
                (key.as_str(), "********")
            } else {
                (key.as_str(), value.as_str())
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct ConfigTool {
    runner: Arc<dyn ToolRunner>,
    program: String,
    timeout: Duration,
}

impl ConfigTool {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    pub fn invocation(
        &self,
        procedure: &Path,
        inventory: Option<&Path>,
        vars: &BTreeMap<String, String>,
    ) -> Result<ToolInvocation> {
        let mut invocation = ToolInvocation::new(&self.program, self.timeout);
        if let Some(dir) = procedure.parent() {
            invocation = invocation.current_dir(dir);
        }
        if let Some(inventory) = inventory {
            invocation = invocation
                .arg("-i")
                .arg(inventory.to_string_lossy().to_string());
        }
        invocation = invocation.arg(procedure.to_string_lossy().to_string());
        if !vars.is_empty() {
            let shown = masked(vars);
            invocation = invocation
                .arg("-e")
                .secret_arg(serde_json::to_string(vars)?, serde_json::to_string(&shown)?);
        }
        Ok(invocation)
    }

    /// Run a procedure and return its captured output whatever the exit code.
    ///
    /// Fails with `MissingArtifact` when the procedure (or the requested
    /// inventory) is absent from the workspace, and with
    /// `ExternalToolFailure` when the tool could not be run at all.
    pub async fn run(
        &self,
        procedure: &Path,
        inventory: Option<&Path>,
        vars: &BTreeMap<String, String>,
    ) -> Result<ToolOutput> {
        if !procedure.is_file() {
            return Err(Error::MissingArtifact(procedure.display().to_string()));
        }
        if let Some(inventory) = inventory {
            if !inventory.is_file() {
                return Err(Error::MissingArtifact(inventory.display().to_string()));
            }
        }
        let invocation = self.invocation(procedure, inventory, vars)?;
        Ok(self.runner.run(&invocation).await?)
    }

    /// Run a procedure and require a zero exit code.
    pub async fn run_checked(
        &self,
        procedure: &Path,
        inventory: Option<&Path>,
        vars: &BTreeMap<String, String>,
    ) -> Result<ToolOutput> {
        if !procedure.is_file() {
            return Err(Error::MissingArtifact(procedure.display().to_string()));
        }
        let invocation = self.invocation(procedure, inventory, vars)?;
        let output = self.runner.run(&invocation).await?;
        Ok(output.into_checked(&invocation)?)
    }
}
