use super::types::Outcome;
use super::Orchestrator;
use crate::cluster::Operation;
use crate::error::Result;
use crate::platform::{adapter_for, DataPlaneOp};
use crate::status::parse_database_list;
use crate::tool::ToolOutput;
use crate::workspace::Workspace;
use tracing::{info, Instrument};

impl Orchestrator {
    pub async fn create_database(&self, cluster: &str, database: &str) -> Result<Outcome> {
        self.data_plane(
            cluster,
            DataPlaneOp::CreateDatabase {
                database: database.to_string(),
            },
        )
        .await
    }

    pub async fn drop_database(&self, cluster: &str, database: &str) -> Result<Outcome> {
        self.data_plane(
            cluster,
            DataPlaneOp::DropDatabase {
                database: database.to_string(),
            },
        )
        .await
    }

    /// Create a database user. `database` defaults to `postgres`.
    pub async fn add_user(
        &self,
        cluster: &str,
        user: &str,
        password: &str,
        roles: &[String],
        database: Option<&str>,
    ) -> Result<Outcome> {
        self.data_plane(
            cluster,
            DataPlaneOp::AddUser {
                user: user.to_string(),
                password: password.to_string(),
                roles: roles.to_vec(),
                database: database.unwrap_or("postgres").to_string(),
            },
        )
        .await
    }

    pub async fn remove_user(&self, cluster: &str, user: &str) -> Result<Outcome> {
        self.data_plane(
            cluster,
            DataPlaneOp::RemoveUser {
                user: user.to_string(),
            },
        )
        .await
    }

    /// Names of the databases on a running cluster.
    pub async fn list_databases(&self, cluster: &str) -> Result<Vec<String>> {
        let output = self
            .run_data_plane(cluster, &DataPlaneOp::ListDatabases)
            .instrument(tracing::info_span!(
                "list_databases",
                cluster = %cluster,
                operation = "list_databases"
            ))
            .await?;
        parse_database_list(&output.stdout)
    }

    /// Pass-through configuration action: one procedure, no status change,
    /// failures surfaced as-is.
    async fn data_plane(&self, cluster: &str, op: DataPlaneOp) -> Result<Outcome> {
        let span = tracing::info_span!("data_plane", cluster = %cluster, operation = %op_name(&op));
        self.run_data_plane(cluster, &op).instrument(span).await?;
        Ok(Outcome::new(op.success_message()))
    }

    async fn run_data_plane(&self, cluster: &str, op: &DataPlaneOp) -> Result<ToolOutput> {
        let _guard = self.locks.acquire(cluster).await?;
        let record = self.load_for(cluster, Operation::DataPlane).await?;
        let adapter = adapter_for(record.platform);
        let workspace = Workspace::open(&record.workspace);

        let (procedure, vars) = adapter.data_plane_step(&record.name, op);
        self.require(&workspace, &procedure)?;
        info!("Running {} on '{}'", procedure.step, cluster);
        self.run_procedure(&workspace, &procedure, &vars).await
    }
}

fn op_name(op: &DataPlaneOp) -> &'static str {
    match op {
        DataPlaneOp::CreateDatabase { .. } => "create_database",
        DataPlaneOp::DropDatabase { .. } => "drop_database",
        DataPlaneOp::AddUser { .. } => "add_user",
        DataPlaneOp::RemoveUser { .. } => "remove_user",
        DataPlaneOp::ListDatabases => "list_databases",
    }
}
