use super::locks::NameLocks;
use super::types::{ClusterStatusReport, ConnectionInfo};
use crate::cluster::{ClusterFilter, ClusterPatch, ClusterRecord, ClusterStatus, ClusterSummary, Operation};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::{adapter_for, Procedure};
use crate::state::ClusterStore;
use crate::status::{interpret_output, StatusReport};
use crate::tool::{parse_address, ConfigTool, Provisioner, ResourceInspector, ToolOutput, ToolRunner};
use crate::workspace::{Workspace, WorkspaceRoot};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// Coordinates cluster lifecycles.
///
/// Owns the record store, the external tool wrappers and the per-name locks.
/// Every mutating operation runs under the cluster name's lock, reads the
/// record, checks the requested operation against the stored status, runs
/// the platform adapter's procedures and writes the outcome back before
/// returning.
///
/// # Example
///
/// ```no_run
/// use db_provisioner::{Config, Orchestrator};
/// use db_provisioner::orchestrator::StopRequest;
///
/// # async fn example() -> Result<(), db_provisioner::Error> {
/// let orchestrator = Orchestrator::builder()
///     .config(Config::default())
///     .build()
///     .await?;
/// let outcome = orchestrator
///     .stop("orders", StopRequest { stop_service: true, stop_server: false })
///     .await?;
/// println!("{}", outcome.message);
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    pub(super) config: Config,
    pub(super) store: ClusterStore,
    pub(super) workspaces: WorkspaceRoot,
    pub(super) provisioner: Provisioner,
    pub(super) inspector: ResourceInspector,
    pub(super) config_tool: ConfigTool,
    pub(super) locks: NameLocks,
}

impl Orchestrator {
    /// Create a builder for constructing an `Orchestrator`.
    pub fn builder() -> crate::orchestrator::OrchestratorBuilder {
        crate::orchestrator::OrchestratorBuilder::new()
    }

    pub(super) fn from_parts(
        config: Config,
        store: ClusterStore,
        runner: Arc<dyn ToolRunner>,
        locks: NameLocks,
    ) -> Self {
        let tool_timeout = config.tool_timeout;
        let inspect_timeout = config.inspect_timeout;
        Self {
            workspaces: WorkspaceRoot::new(&config.deployments_dir, &config.templates_dir),
            provisioner: Provisioner::new(Arc::clone(&runner), &config.tools.provisioner, tool_timeout),
            inspector: ResourceInspector::new(Arc::clone(&runner), &config.tools.inspector, inspect_timeout),
            config_tool: ConfigTool::new(runner, &config.tools.configurator, tool_timeout),
            locks,
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    /// Stored record for `name`.
    pub async fn get(&self, name: &str) -> Result<ClusterRecord> {
        self.store.get(name).await
    }

    pub async fn list(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
        self.store.list(filter).await
    }

    /// Compute image id -> login user.
    pub fn images(&self) -> &BTreeMap<String, String> {
        &self.config.images
    }

    pub fn database_versions(&self) -> &[String] {
        &self.config.database_versions
    }

    /// Inspect the cluster's database and classify the result.
    ///
    /// Read-only: the stored status is never changed, so a transient
    /// inspection failure cannot masquerade as durable state. Runs without
    /// the name lock so it stays responsive during long operations.
    pub async fn get_status(&self, name: &str) -> Result<ClusterStatusReport> {
        self.get_status_impl(name)
            .instrument(tracing::info_span!("get_status", cluster = %name, operation = "status"))
            .await
    }

    async fn get_status_impl(&self, name: &str) -> Result<ClusterStatusReport> {
        let record = self.store.get(name).await?;
        let adapter = adapter_for(record.platform);
        let workspace = Workspace::open(&record.workspace);
        let (procedure, grammar) = adapter.status_inspection_step();

        let inventory = workspace.inventory_path();
        if !workspace.has_procedure(procedure.playbook)
            || (procedure.with_inventory && !inventory.is_file())
        {
            debug!("Status procedure or inventory missing for '{}'", name);
            return Ok(ClusterStatusReport {
                record,
                observed: StatusReport::unknown(),
            });
        }

        let observed = match self
            .config_tool
            .run(
                &workspace.procedure_path(procedure.playbook),
                procedure.with_inventory.then_some(inventory.as_path()),
                &BTreeMap::new(),
            )
            .await
        {
            Ok(output) => interpret_output(&output, grammar),
            Err(Error::ExternalToolFailure(err)) => StatusReport::from_invocation_error(&err),
            Err(e) => return Err(e),
        };

        Ok(ClusterStatusReport { record, observed })
    }

    /// Client connection details for `name`.
    pub async fn connection_info(&self, name: &str) -> Result<ConnectionInfo> {
        let record = self.store.get(name).await?;
        let adapter = adapter_for(record.platform);
        let connection = &self.config.connection;
        Ok(ConnectionInfo {
            cluster: record.name.clone(),
            platform: record.platform,
            host: adapter.address_for_node(&record, 1),
            port: adapter.service_port(connection),
            user: connection.user.clone(),
            password: connection.password.clone(),
            database: connection.database.clone(),
        })
    }

    /// Address to whitelist for the operator: configured, else discovered.
    pub(super) async fn operator_address(&self) -> Result<String> {
        if let Some(address) = &self.config.operator_address {
            return Ok(address.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(self.config.inspect_timeout)
            .build()?;
        let body = client
            .get(&self.config.operator_address_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_address(&body)
    }

    /// Fetch the record and check `op` is allowed in its current status.
    pub(super) async fn load_for(&self, name: &str, op: Operation) -> Result<ClusterRecord> {
        let record = self.store.get(name).await?;
        if !record.status.permits(op) {
            return Err(Error::InvalidState {
                cluster: name.to_string(),
                status: record.status.to_string(),
                operation: op.to_string(),
            });
        }
        Ok(record)
    }

    /// Fail with `MissingArtifact` before any side effect if a procedure
    /// (or the inventory it needs) is absent.
    pub(super) fn require(&self, workspace: &Workspace, procedure: &Procedure) -> Result<()> {
        let path = workspace.procedure_path(procedure.playbook);
        if !path.is_file() {
            return Err(Error::MissingArtifact(path.display().to_string()));
        }
        if procedure.with_inventory {
            let inventory = workspace.inventory_path();
            if !inventory.is_file() {
                return Err(Error::MissingArtifact(inventory.display().to_string()));
            }
        }
        Ok(())
    }

    /// Run a procedure and require success.
    pub(super) async fn run_procedure(
        &self,
        workspace: &Workspace,
        procedure: &Procedure,
        vars: &BTreeMap<String, String>,
    ) -> Result<ToolOutput> {
        let inventory = workspace.inventory_path();
        debug!("Running procedure {}", procedure.playbook);
        self.config_tool
            .run_checked(
                &workspace.procedure_path(procedure.playbook),
                procedure.with_inventory.then_some(inventory.as_path()),
                vars,
            )
            .await
    }

    /// Persist a status change.
    pub(super) async fn set_status(
        &self,
        record: &ClusterRecord,
        status: ClusterStatus,
        op: Operation,
    ) -> Result<()> {
        if !record.status.is_valid_transition(status) {
            return Err(Error::InvalidState {
                cluster: record.name.clone(),
                status: record.status.to_string(),
                operation: op.to_string(),
            });
        }
        self.store.update(&record.name, ClusterPatch::status(status)).await
    }

    /// Record a status on a failure path. The original error is what the
    /// caller reports, so a failed write is only logged.
    pub(super) async fn mark_after_failure(
        &self,
        record: &ClusterRecord,
        status: ClusterStatus,
        op: Operation,
    ) {
        if let Err(e) = self.set_status(record, status, op).await {
            warn!(
                "Failed to record status {} for '{}' after failed {}: {}",
                status, record.name, op, e
            );
        }
    }
}
