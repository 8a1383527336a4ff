use crate::output::UserOutput;
use db_provisioner::orchestrator::DeployRequest;
use db_provisioner::Orchestrator;

pub async fn run_deploy(
    orchestrator: &Orchestrator,
    request: DeployRequest,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status(&format!(
        "Deploying '{}' on {} ({} node(s), PostgreSQL {})...",
        request.name,
        request.platform,
        request.topology.node_count,
        request.topology.database_version
    ));

    let record = orchestrator.deploy(request).await?;

    out.status(&format!("Cluster '{}' deployed", record.name));
    out.status(&format!("{:-<50}", ""));
    for endpoint in &record.endpoints {
        out.status(&format!(
            "  {:<30} {}",
            endpoint.node,
            endpoint.public_address.as_deref().unwrap_or("-")
        ));
    }
    out.data(&serde_json::to_value(&record)?);
    Ok(())
}
