use super::types::Outcome;
use super::Orchestrator;
use crate::cluster::Operation;
use crate::error::{Error, Result};
use crate::platform::adapter_for;
use crate::workspace::Workspace;
use std::collections::BTreeMap;
use tracing::{info, Instrument};

impl Orchestrator {
    /// Destroy a standalone cluster's resources, then its workspace, then
    /// its record.
    ///
    /// If destruction fails nothing local is deleted, so the call can be
    /// retried.
    pub async fn decommission(&self, name: &str) -> Result<Outcome> {
        self.decommission_impl(name)
            .instrument(tracing::info_span!(
                "decommission",
                cluster = %name,
                operation = "decommission"
            ))
            .await
    }

    async fn decommission_impl(&self, name: &str) -> Result<Outcome> {
        let _guard = self.locks.acquire(name).await?;
        let record = self.load_for(name, Operation::Decommission).await?;

        if !record.topology.is_standalone() {
            return Err(Error::PolicyViolation(format!(
                "Decommission is only supported for standalone clusters; '{}' has {} nodes",
                name, record.topology.node_count
            )));
        }

        let adapter = adapter_for(record.platform);
        let workspace = Workspace::open(&record.workspace);
        let provision_dir = workspace.provision_dir();
        if !provision_dir.is_dir() {
            return Err(Error::MissingArtifact(format!(
                "provisioning directory {}",
                provision_dir.display()
            )));
        }

        info!("Decommissioning cluster '{}'", name);
        let mut done: Vec<&str> = Vec::new();

        if let Some(cleanup) = adapter.teardown_step() {
            if workspace.has_procedure(cleanup.playbook) {
                self.require(&workspace, &cleanup)?;
                self.run_procedure(&workspace, &cleanup, &BTreeMap::new())
                    .await?;
                done.push(cleanup.done);
            }
        }

        self.provisioner.destroy(&provision_dir).await?;
        done.push("Resources destroyed.");

        workspace.remove()?;
        self.store.delete(name).await?;
        info!("Cluster '{}' decommissioned", name);

        let finished = format!("Cluster '{}' decommissioned successfully", name);
        done.push(finished.as_str());
        Ok(Outcome::from_steps(&done))
    }
}
