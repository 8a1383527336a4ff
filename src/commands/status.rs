use crate::output::UserOutput;
use db_provisioner::cluster::{ClusterFilter, ClusterStatus};
use db_provisioner::status::ObservedState;
use db_provisioner::Orchestrator;
use serde_json::json;

pub async fn run_status(
    orchestrator: &Orchestrator,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let report = orchestrator.get_status(name).await?;

    let icon = match report.observed.state {
        ObservedState::Running => "+",
        ObservedState::Stopped => "o",
        ObservedState::Unknown => "?",
        ObservedState::Error => "x",
    };
    out.status(&format!("Cluster '{}' ({})", report.record.name, report.record.platform));
    out.status(&format!("{:-<50}", ""));
    out.status(&format!("  Recorded status: {}", report.record.status));
    out.status(&format!("  {} Database:      {}", icon, report.observed.state));
    if let Some(error) = &report.observed.error {
        out.status(&format!("  Error: {}", error));
    }

    out.data(&serde_json::to_value(&report)?);
    Ok(())
}

pub async fn run_list(
    orchestrator: &Orchestrator,
    standalone: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let filter = ClusterFilter {
        standalone,
        ..ClusterFilter::default()
    };
    let clusters = orchestrator.list(&filter).await?;

    out.status("Clusters:");
    out.status(&format!("{:-<70}", ""));
    if clusters.is_empty() {
        out.status("  No clusters recorded");
    } else {
        for cluster in &clusters {
            let icon = match cluster.status {
                ClusterStatus::Running => "+",
                ClusterStatus::Stopped => "o",
                ClusterStatus::Degraded | ClusterStatus::Unknown => "!",
                ClusterStatus::Provisioning => ".",
                ClusterStatus::Decommissioned => "x",
            };
            out.status(&format!(
                "  {} {:<24} {:<13} {:<15} {} node(s)",
                icon, cluster.name, cluster.platform, cluster.status, cluster.node_count
            ));
        }
    }

    out.data(&serde_json::to_value(&clusters)?);
    Ok(())
}

pub async fn run_connection_info(
    orchestrator: &Orchestrator,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let info = orchestrator.connection_info(name).await?;
    let command = info.connection_string();

    out.status(&format!("Host:     {}", info.host.as_deref().unwrap_or("(unknown)")));
    out.status(&format!("Port:     {}", info.port));
    out.status(&format!("User:     {}", info.user));
    out.status(&format!("Password: {}", info.password));
    out.status(&format!("Database: {}", info.database));
    match &command {
        Some(command) => out.status(&format!("\n  {}", command)),
        None => out.warning("No public address is recorded for the primary node"),
    }

    let mut value = serde_json::to_value(&info)?;
    value["connection_string"] = json!(command);
    out.data(&value);
    Ok(())
}
