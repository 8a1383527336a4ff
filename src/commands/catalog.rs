use crate::output::UserOutput;
use db_provisioner::Orchestrator;
use serde_json::json;

pub fn run_images(orchestrator: &Orchestrator, out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status("Compute images:");
    for (image, user) in orchestrator.images() {
        out.status(&format!("  {:<28} login user: {}", image, user));
    }
    out.data(&json!(orchestrator.images()));
    Ok(())
}

pub fn run_versions(orchestrator: &Orchestrator, out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status("PostgreSQL versions:");
    for version in orchestrator.database_versions() {
        out.status(&format!("  {}", version));
    }
    out.data(&json!(orchestrator.database_versions()));
    Ok(())
}
