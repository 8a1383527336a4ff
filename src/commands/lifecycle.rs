use crate::output::UserOutput;
use db_provisioner::orchestrator::StopRequest;
use db_provisioner::Orchestrator;

pub async fn run_start(
    orchestrator: &Orchestrator,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status(&format!("Starting '{}'...", name));
    let outcome = orchestrator.start(name).await?;
    out.success(&outcome.message);
    Ok(())
}

pub async fn run_stop(
    orchestrator: &Orchestrator,
    name: &str,
    request: StopRequest,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    if request.stop_server && !request.stop_service {
        out.warning("--server has no effect without --service");
    }
    let outcome = orchestrator.stop(name, request).await?;
    out.success(&outcome.message);
    Ok(())
}

pub async fn run_decommission(
    orchestrator: &Orchestrator,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status(&format!("Decommissioning '{}'...", name));
    let outcome = orchestrator.decommission(name).await?;
    out.success(&outcome.message);
    Ok(())
}
