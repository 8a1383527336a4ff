use super::types::DeployRequest;
use super::Orchestrator;
use crate::cluster::{node_id, ClusterRecord, ClusterStatus, NodeEndpoint, Platform, Topology};
use crate::error::{Error, Result};
use crate::platform::{adapter_for, DeployContext, PlatformAdapter};
use crate::tool::ProvisionOutputs;
use crate::workspace::{validate_cluster_name, Workspace};
use chrono::Utc;
use tracing::{info, warn, Instrument};

/// Maximum number of client CIDRs a cluster firewall accepts.
const MAX_ALLOWED_CIDRS: usize = 2;

impl Orchestrator {
    /// Provision a new cluster and record it as running.
    ///
    /// Either the whole deploy succeeds and the record exists, or nothing is
    /// left behind: on failure after the workspace was allocated, resources
    /// are destroyed (best effort) and the workspace is removed before the
    /// error is returned.
    pub async fn deploy(&self, request: DeployRequest) -> Result<ClusterRecord> {
        let name = request.name.clone();
        self.deploy_impl(request)
            .instrument(tracing::info_span!("deploy", cluster = %name, operation = "deploy"))
            .await
    }

    async fn deploy_impl(&self, request: DeployRequest) -> Result<ClusterRecord> {
        let adapter = adapter_for(request.platform);
        let topology = self.validate_deploy(&request, adapter)?;
        let name = request.name.as_str();

        let _guard = self.locks.acquire(name).await?;
        info!("Deploying {} cluster '{}' ({} node(s))", request.platform, name, topology.node_count);

        if self.store.exists(name).await? {
            return Err(Error::Conflict(name.to_string()));
        }
        let workspace = self.workspaces.allocate(name)?;

        let mut apply_started = false;
        match self
            .provision(name, adapter, &topology, &workspace, &mut apply_started)
            .await
        {
            Ok(record) => {
                info!(
                    "Cluster '{}' is running at {}",
                    name,
                    record.primary_address().unwrap_or("<no address>")
                );
                Ok(record)
            }
            Err(e) => {
                warn!("Deploy of '{}' failed, rolling back: {}", name, e);
                self.rollback(&workspace, apply_started).await;
                Err(e)
            }
        }
    }

    /// Reject requests that break policy, before any side effect.
    fn validate_deploy(&self, request: &DeployRequest, adapter: &dyn PlatformAdapter) -> Result<Topology> {
        validate_cluster_name(&request.name)?;

        let mut topology = request.topology.clone();
        let max = adapter.max_nodes(self.config.max_vm_nodes);
        if topology.node_count == 0 {
            return Err(Error::PolicyViolation("At least one node is required.".to_string()));
        }
        if topology.node_count > max {
            return Err(Error::PolicyViolation(format!(
                "Maximum {} instances allowed.",
                max
            )));
        }
        if !self.config.database_versions.contains(&topology.database_version) {
            return Err(Error::PolicyViolation(format!(
                "Unsupported database version '{}' (supported: {})",
                topology.database_version,
                self.config.database_versions.join(", ")
            )));
        }
        topology.allowed_cidrs.retain(|c| !c.trim().is_empty());
        if topology.allowed_cidrs.len() > MAX_ALLOWED_CIDRS {
            return Err(Error::PolicyViolation(format!(
                "At most {} allowed client CIDRs are supported.",
                MAX_ALLOWED_CIDRS
            )));
        }

        topology.workload_units = match request.platform {
            Platform::Vm => None,
            Platform::Orchestrated => match topology.workload_units.unwrap_or(1) {
                0 => {
                    return Err(Error::PolicyViolation(
                        "At least one workload unit is required.".to_string(),
                    ))
                }
                units => Some(units),
            },
        };
        Ok(topology)
    }

    async fn provision(
        &self,
        name: &str,
        adapter: &dyn PlatformAdapter,
        topology: &Topology,
        workspace: &Workspace,
        apply_started: &mut bool,
    ) -> Result<ClusterRecord> {
        let operator_address = self.operator_address().await?;
        let ctx = DeployContext {
            name,
            topology,
            operator_address: &operator_address,
            login_user: self.config.login_user_for(&topology.image),
            ssh: &self.config.ssh,
        };
        adapter.render_provisioning_input(workspace, &ctx)?;
        adapter.render_config_input(workspace, &ctx)?;

        let dir = workspace.provision_dir();
        self.provisioner.init(&dir).await?;
        *apply_started = true;
        self.provisioner.apply(&dir).await?;

        let outputs = self.provisioner.outputs(&dir).await?;
        let primary = outputs.primary_instance().ok_or_else(|| Error::ParseFailure {
            what: "provisioning outputs".to_string(),
            reason: "no instance ids".to_string(),
        })?;
        let address = self.inspector.public_address_of(primary).await?;

        let inventory = workspace.inventory_path();
        if !inventory.is_file() {
            return Err(Error::MissingArtifact(format!(
                "generated inventory {}",
                inventory.display()
            )));
        }

        let record = ClusterRecord {
            name: name.to_string(),
            platform: adapter.platform(),
            status: ClusterStatus::Running,
            topology: topology.clone(),
            endpoints: endpoints(name, adapter.compute_count(topology), &outputs, &address),
            workspace: workspace.path().to_path_buf(),
            created_at: Utc::now(),
        };
        self.store.create(&record).await?;
        Ok(record)
    }

    /// Best-effort cleanup of a failed deploy. Never raises.
    async fn rollback(&self, workspace: &Workspace, apply_started: bool) {
        if apply_started {
            if let Err(e) = self.provisioner.destroy(&workspace.provision_dir()).await {
                warn!(
                    "Destroy during rollback failed, external resources may be orphaned: {}",
                    e
                );
            }
        }
        if let Err(e) = workspace.remove() {
            warn!("Failed to remove workspace during rollback: {}", e);
        }
    }
}

/// One endpoint per compute resource; the primary uses the inspected address.
fn endpoints(name: &str, count: u32, outputs: &ProvisionOutputs, primary_address: &str) -> Vec<NodeEndpoint> {
    (0..count.max(1) as usize)
        .map(|i| NodeEndpoint {
            node: node_id(name, i + 1),
            public_address: if i == 0 {
                Some(primary_address.to_string())
            } else {
                outputs.public_ips.get(i).cloned()
            },
            private_address: outputs.private_ips.get(i).cloned(),
        })
        .collect()
}
