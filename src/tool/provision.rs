use super::{ToolInvocation, ToolRunner};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Structured view of `output -json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionOutputs {
    /// Created compute resource ids, primary first.
    pub instance_ids: Vec<String>,
    pub public_ips: Vec<String>,
    pub private_ips: Vec<String>,
    /// Every output by name, unwrapped from its `{"value": ...}` envelope.
    pub values: BTreeMap<String, Value>,
}

impl ProvisionOutputs {
    pub fn primary_instance(&self) -> Option<&str> {
        self.instance_ids.first().map(String::as_str)
    }
}

/// Parse the provisioning tool's JSON output listing.
///
/// `instance_ids` is mandatory; the address lists are optional because not
/// every module exports them.
pub fn parse_outputs(text: &str) -> Result<ProvisionOutputs> {
    let root: Value = serde_json::from_str(text).map_err(|e| Error::ParseFailure {
        what: "provisioning outputs".to_string(),
        reason: e.to_string(),
    })?;
    let Value::Object(map) = root else {
        return Err(Error::ParseFailure {
            what: "provisioning outputs".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };

    let values: BTreeMap<String, Value> = map
        .into_iter()
        .map(|(name, entry)| {
            let value = match entry {
                Value::Object(mut inner) if inner.contains_key("value") => {
                    inner.remove("value").unwrap_or(Value::Null)
                }
                other => other,
            };
            (name, value)
        })
        .collect();

    let instance_ids = string_list(&values, "instance_ids");
    if instance_ids.is_empty() {
        return Err(Error::ParseFailure {
            what: "provisioning outputs".to_string(),
            reason: "no 'instance_ids' output with at least one id".to_string(),
        });
    }

    Ok(ProvisionOutputs {
        instance_ids,
        public_ips: string_list(&values, "public_ips"),
        private_ips: string_list(&values, "private_ips"),
        values,
    })
}

fn string_list(values: &BTreeMap<String, Value>, name: &str) -> Vec<String> {
    match values.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Wrapper around the infrastructure provisioning tool (terraform).
#[derive(Clone)]
pub struct Provisioner {
    runner: Arc<dyn ToolRunner>,
    program: String,
    timeout: Duration,
}

impl Provisioner {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    fn invocation(&self, dir: &Path, args: &[&str]) -> ToolInvocation {
        ToolInvocation::new(&self.program, self.timeout)
            .args(args.iter().copied())
            .current_dir(dir)
    }

    pub async fn init(&self, dir: &Path) -> Result<()> {
        info!("Initializing provisioning workspace {}", dir.display());
        self.runner
            .run_checked(&self.invocation(dir, &["init", "-input=false"]))
            .await?;
        Ok(())
    }

    pub async fn apply(&self, dir: &Path) -> Result<()> {
        info!("Applying provisioning plan in {}", dir.display());
        self.runner
            .run_checked(&self.invocation(dir, &["apply", "-auto-approve", "-input=false"]))
            .await?;
        Ok(())
    }

    /// Destroy everything the workspace created. Callers on rollback paths
    /// log the error instead of raising it.
    pub async fn destroy(&self, dir: &Path) -> Result<()> {
        info!("Destroying provisioned resources in {}", dir.display());
        self.runner
            .run_checked(&self.invocation(dir, &["destroy", "-auto-approve", "-input=false"]))
            .await?;
        Ok(())
    }

    pub async fn outputs(&self, dir: &Path) -> Result<ProvisionOutputs> {
        let output = self
            .runner
            .run_checked(&self.invocation(dir, &["output", "-json"]))
            .await?;
        parse_outputs(&output.stdout)
    }
}
