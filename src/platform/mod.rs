//! Platform adapters.
//!
//! A [`PlatformAdapter`] turns abstract lifecycle steps into the concrete
//! procedures and template variables of one infrastructure substrate. The
//! adapter is chosen once from the record's stored [`Platform`] via
//! [`adapter_for`]; operation code never branches on the platform itself.

mod orchestrated;
mod vm;

pub use orchestrated::OrchestratedAdapter;
pub use vm::VmAdapter;

use crate::cluster::{node_id, ClusterRecord, Platform, Topology};
use crate::config::{ConnectionConfig, SshConfig};
use crate::error::Result;
use crate::status::StatusGrammar;
use crate::workspace::Workspace;
use std::collections::BTreeMap;

/// Procedure shared by both platforms for compute power control.
pub const SERVER_STOP: Procedure = Procedure {
    playbook: "stop_server.yml",
    with_inventory: true,
    step: "server stop",
    done: "Server stopped.",
};

pub const SERVER_START: Procedure = Procedure {
    playbook: "start_server.yml",
    with_inventory: true,
    step: "server start",
    done: "Server started.",
};

/// One configuration-tool procedure in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Procedure {
    /// File name under the workspace's configuration directory.
    pub playbook: &'static str,
    /// Whether to pass the cluster inventory.
    pub with_inventory: bool,
    /// Short name used when reporting partial progress.
    pub step: &'static str,
    /// Message reported when the procedure succeeded.
    pub done: &'static str,
}

/// Database and user management actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPlaneOp {
    CreateDatabase {
        database: String,
    },
    DropDatabase {
        database: String,
    },
    AddUser {
        user: String,
        password: String,
        roles: Vec<String>,
        database: String,
    },
    RemoveUser {
        user: String,
    },
    ListDatabases,
}

impl DataPlaneOp {
    /// Flat variables shared by both platforms.
    fn base_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        match self {
            DataPlaneOp::CreateDatabase { database } | DataPlaneOp::DropDatabase { database } => {
                vars.insert("db_name".to_string(), database.clone());
            }
            DataPlaneOp::AddUser {
                user,
                password,
                roles,
                database,
            } => {
                vars.insert("db_user".to_string(), user.clone());
                vars.insert("db_pass".to_string(), password.clone());
                vars.insert("db_roles".to_string(), roles.join(","));
                vars.insert("db_name".to_string(), database.clone());
            }
            DataPlaneOp::RemoveUser { user } => {
                vars.insert("db_user".to_string(), user.clone());
            }
            DataPlaneOp::ListDatabases => {}
        }
        vars
    }

    pub fn success_message(&self) -> String {
        match self {
            DataPlaneOp::CreateDatabase { database } => {
                format!("Database '{}' created successfully", database)
            }
            DataPlaneOp::DropDatabase { database } => {
                format!("Database '{}' dropped successfully", database)
            }
            DataPlaneOp::AddUser { user, .. } => format!("User '{}' added successfully", user),
            DataPlaneOp::RemoveUser { user } => format!("User '{}' removed successfully", user),
            DataPlaneOp::ListDatabases => "Databases listed".to_string(),
        }
    }
}

/// Inputs available when rendering a new cluster's templates.
#[derive(Debug, Clone, Copy)]
pub struct DeployContext<'a> {
    pub name: &'a str,
    pub topology: &'a Topology,
    /// Address of the operator host, whitelisted on the firewall.
    pub operator_address: &'a str,
    pub login_user: &'a str,
    pub ssh: &'a SshConfig,
}

impl DeployContext<'_> {
    /// Variables both platforms' templates understand.
    fn common_vars(&self, platform: Platform, compute_count: u32) -> BTreeMap<String, String> {
        let t = self.topology;
        let cidr = |i: usize| t.allowed_cidrs.get(i).cloned().unwrap_or_default();
        let allowed: Vec<&str> = t
            .allowed_cidrs
            .iter()
            .map(String::as_str)
            .filter(|c| !c.is_empty())
            .collect();

        [
            ("cluster_name", self.name.to_string()),
            ("platform", platform.to_string()),
            ("instance_count", compute_count.to_string()),
            ("node_count", t.node_count.to_string()),
            ("workload_units", t.workload_units.unwrap_or(0).to_string()),
            ("postgres_version", t.database_version.clone()),
            ("postgresql_version", t.database_version.clone()),
            ("ami", t.image.clone()),
            ("instance_type", t.instance_size.clone()),
            ("data_volume_size", t.data_volume_gb.to_string()),
            ("ssh_user", self.login_user.to_string()),
            ("key_name", self.ssh.key_name.clone()),
            ("public_key_path", self.ssh.public_key_path.clone()),
            ("allowed_ip_1", cidr(0)),
            ("allowed_ip_2", cidr(1)),
            (
                "allowed_ips",
                serde_json::to_string(&allowed).unwrap_or_else(|_| "[]".to_string()),
            ),
            ("server_public_ip", self.operator_address.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Capabilities one infrastructure substrate provides to the orchestrator.
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Largest node count a deploy may request.
    fn max_nodes(&self, configured_vm_cap: u32) -> u32;

    /// Number of compute resources the provisioning tool creates.
    fn compute_count(&self, topology: &Topology) -> u32;

    fn provisioning_vars(&self, ctx: &DeployContext<'_>) -> BTreeMap<String, String>;

    fn config_vars(&self, ctx: &DeployContext<'_>) -> BTreeMap<String, String>;

    /// Render `terraform.tfvars` for a new workspace.
    fn render_provisioning_input(&self, workspace: &Workspace, ctx: &DeployContext<'_>) -> Result<()> {
        workspace.render_provisioning_input(&self.provisioning_vars(ctx))
    }

    /// Render the configuration tool's group variables for a new workspace.
    fn render_config_input(&self, workspace: &Workspace, ctx: &DeployContext<'_>) -> Result<()> {
        workspace.render_config_input(&self.config_vars(ctx))
    }

    /// Tag the inspector uses to find the primary node's compute resource.
    fn resource_ref_for_primary_node(&self, cluster: &str) -> String {
        node_id(cluster, 1)
    }

    /// First stop tier: the database service or workload unit.
    fn service_stop_step(&self) -> Procedure;

    fn service_start_step(&self) -> Procedure;

    /// Second stop tier: the compute host.
    fn server_stop_step(&self) -> Procedure {
        SERVER_STOP
    }

    fn server_start_step(&self) -> Procedure {
        SERVER_START
    }

    fn status_inspection_step(&self) -> (Procedure, StatusGrammar);

    /// Procedure and variables for a data-plane action.
    fn data_plane_step(&self, cluster: &str, op: &DataPlaneOp) -> (Procedure, BTreeMap<String, String>);

    /// Cleanup run before resources are destroyed on decommission.
    fn teardown_step(&self) -> Option<Procedure> {
        None
    }

    /// Address clients use to reach the `ordinal`-th node (1-based).
    fn address_for_node(&self, record: &ClusterRecord, ordinal: usize) -> Option<String>;

    fn service_port(&self, connection: &ConnectionConfig) -> u16;
}

static VM: VmAdapter = VmAdapter;
static ORCHESTRATED: OrchestratedAdapter = OrchestratedAdapter;

/// Adapter for a stored platform.
pub fn adapter_for(platform: Platform) -> &'static dyn PlatformAdapter {
    match platform {
        Platform::Vm => &VM,
        Platform::Orchestrated => &ORCHESTRATED,
    }
}
