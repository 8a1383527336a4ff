use super::types::{Outcome, StopRequest};
use super::Orchestrator;
use crate::cluster::{node_id, ClusterPatch, ClusterRecord, ClusterStatus, Operation};
use crate::error::{Error, Result};
use crate::inventory::{self, HostEntry};
use crate::platform::adapter_for;
use crate::workspace::Workspace;
use std::collections::BTreeMap;
use tracing::{info, Instrument};

fn partial(record: &ClusterRecord, completed: &[&str], failed: &str, cause: &Error) -> Error {
    Error::PartialFailure {
        cluster: record.name.clone(),
        completed: completed.iter().map(|s| s.to_string()).collect(),
        failed: failed.to_string(),
        cause: cause.to_string(),
    }
}

/// Tool failures mean something may have happened externally; anything
/// else (missing files, parse errors) was caught before a side effect.
fn touched_externally(err: &Error) -> bool {
    matches!(err, Error::ExternalToolFailure(_))
}

impl Orchestrator {
    /// Start the primary node's server, re-resolve its public address,
    /// record it, then start the database service.
    ///
    /// The address update is kept even if the service fails to start, in
    /// which case the cluster is left `Degraded` and a `PartialFailure` is
    /// returned.
    pub async fn start(&self, name: &str) -> Result<Outcome> {
        self.start_impl(name)
            .instrument(tracing::info_span!("start", cluster = %name, operation = "start"))
            .await
    }

    async fn start_impl(&self, name: &str) -> Result<Outcome> {
        let _guard = self.locks.acquire(name).await?;
        let record = self.load_for(name, Operation::Start).await?;
        let adapter = adapter_for(record.platform);
        let workspace = Workspace::open(&record.workspace);
        let no_vars = BTreeMap::new();

        let server = adapter.server_start_step();
        let service = adapter.service_start_step();
        self.require(&workspace, &server)?;
        self.require(&workspace, &service)?;

        info!("Starting cluster '{}'", name);
        let mut done: Vec<&str> = Vec::new();
        let mut completed: Vec<&str> = Vec::new();

        if let Err(e) = self.run_procedure(&workspace, &server, &no_vars).await {
            if touched_externally(&e) {
                self.mark_after_failure(&record, ClusterStatus::Unknown, Operation::Start)
                    .await;
            }
            return Err(e);
        }
        done.push(server.done);
        completed.push(server.step);

        let address = match self.refresh_primary_address(&record, &workspace).await {
            Ok(address) => address,
            Err(e) => {
                self.mark_after_failure(&record, ClusterStatus::Unknown, Operation::Start)
                    .await;
                return Err(partial(&record, &completed, "address update", &e));
            }
        };
        completed.push("address update");
        info!("Primary node of '{}' is now at {}", name, address);

        if let Err(e) = self.run_procedure(&workspace, &service, &no_vars).await {
            self.mark_after_failure(&record, ClusterStatus::Degraded, Operation::Start)
                .await;
            return Err(partial(&record, &completed, service.step, &e));
        }
        done.push(service.done);

        self.set_status(&record, ClusterStatus::Running, Operation::Start)
            .await?;
        Ok(Outcome::from_steps(&done))
    }

    /// Resolve the primary node's address and write it to the inventory
    /// and the record.
    async fn refresh_primary_address(&self, record: &ClusterRecord, workspace: &Workspace) -> Result<String> {
        let adapter = adapter_for(record.platform);
        let address = self
            .inspector
            .public_address_by_tag(&adapter.resource_ref_for_primary_node(&record.name))
            .await?;

        let node = node_id(&record.name, 1);
        inventory::update_file(
            &workspace.inventory_path(),
            &HostEntry {
                node: &node,
                address: &address,
                user: self.config.login_user_for(&record.topology.image),
                private_key: &self.config.ssh.private_key_path,
            },
        )?;

        self.store
            .update(
                &record.name,
                ClusterPatch::endpoints(record.endpoints_with_primary_address(&address)),
            )
            .await?;
        Ok(address)
    }

    /// Two-tier stop. Without service confirmation nothing runs, the status
    /// is unchanged and the call fails with `PolicyViolation`. The server
    /// tier only runs after the service tier succeeded.
    pub async fn stop(&self, name: &str, request: StopRequest) -> Result<Outcome> {
        self.stop_impl(name, request)
            .instrument(tracing::info_span!("stop", cluster = %name, operation = "stop"))
            .await
    }

    async fn stop_impl(&self, name: &str, request: StopRequest) -> Result<Outcome> {
        let _guard = self.locks.acquire(name).await?;
        let record = self.load_for(name, Operation::Stop).await?;
        let adapter = adapter_for(record.platform);
        let service = adapter.service_stop_step();

        if !request.stop_service {
            info!("Stop of '{}' not confirmed, nothing to do", name);
            return Err(Error::PolicyViolation(format!(
                "{} cancelled. No actions performed.",
                service.step
            )));
        }

        let workspace = Workspace::open(&record.workspace);
        let server = adapter.server_stop_step();
        self.require(&workspace, &service)?;
        if request.stop_server {
            self.require(&workspace, &server)?;
        }

        info!("Stopping cluster '{}'", name);
        let no_vars = BTreeMap::new();
        let mut done: Vec<&str> = Vec::new();

        if let Err(e) = self.run_procedure(&workspace, &service, &no_vars).await {
            if touched_externally(&e) {
                self.mark_after_failure(&record, ClusterStatus::Unknown, Operation::Stop)
                    .await;
            }
            return Err(e);
        }
        done.push(service.done);

        if request.stop_server {
            if let Err(e) = self.run_procedure(&workspace, &server, &no_vars).await {
                // The database is down either way
                self.mark_after_failure(&record, ClusterStatus::Stopped, Operation::Stop)
                    .await;
                return Err(partial(&record, &[service.step], server.step, &e));
            }
            done.push(server.done);
        }

        self.set_status(&record, ClusterStatus::Stopped, Operation::Stop)
            .await?;
        Ok(Outcome::from_steps(&done))
    }
}
