use super::{ToolInvocation, ToolRunner};
use crate::error::{Error, Result};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Extract the first address from inspector text output.
///
/// The cloud CLI prints `None` when an instance has no public address yet,
/// and tab-separates multiple matches.
pub fn parse_address(text: &str) -> Result<String> {
    let token = text.split_whitespace().next().unwrap_or("");
    if token.is_empty() || token.eq_ignore_ascii_case("none") || token == "null" {
        return Err(Error::ParseFailure {
            what: "inspector address output".to_string(),
            reason: "no public address assigned".to_string(),
        });
    }
    token
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| Error::ParseFailure {
            what: "inspector address output".to_string(),
            reason: format!("'{}' is not an IP address", token),
        })
}

/// Cloud resource inspector (`aws ec2 describe-instances`).
#[derive(Clone)]
pub struct ResourceInspector {
    runner: Arc<dyn ToolRunner>,
    program: String,
    timeout: Duration,
}

impl ResourceInspector {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    /// Public address of a compute resource by id.
    pub async fn public_address_of(&self, resource_id: &str) -> Result<String> {
        let invocation = ToolInvocation::new(&self.program, self.timeout).args([
            "ec2",
            "describe-instances",
            "--instance-ids",
            resource_id,
            "--query",
            "Reservations[0].Instances[0].PublicIpAddress",
            "--output",
            "text",
        ]);
        let output = self.runner.run_checked(&invocation).await?;
        parse_address(&output.stdout)
    }

    /// Public address of the compute resource tagged with `name`.
    pub async fn public_address_by_tag(&self, name: &str) -> Result<String> {
        let filter = format!("Name=tag:Name,Values={}", name);
        let invocation = ToolInvocation::new(&self.program, self.timeout).args([
            "ec2",
            "describe-instances",
            "--filters",
            filter.as_str(),
            "--query",
            "Reservations[*].Instances[*].PublicIpAddress",
            "--output",
            "text",
        ]);
        let output = self.runner.run_checked(&invocation).await?;
        parse_address(&output.stdout)
    }
}
