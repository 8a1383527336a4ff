use super::{DataPlaneOp, DeployContext, PlatformAdapter, Procedure};
use crate::cluster::{ClusterRecord, Platform, Topology};
use crate::config::ConnectionConfig;
use crate::status::StatusGrammar;
use std::collections::BTreeMap;

/// A single control host running the database as workload units (pods).
///
/// "Service" is the workload unit, "server" is the control host. Every node
/// is reached through the control host's address.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratedAdapter;

const SERVICE_STOP: Procedure = Procedure {
    playbook: "stop_postgres_pod.yml",
    with_inventory: true,
    step: "PostgreSQL pod stop",
    done: "PostgreSQL pod stopped.",
};

const SERVICE_START: Procedure = Procedure {
    playbook: "start_postgres_pod.yml",
    with_inventory: true,
    step: "PostgreSQL pod start",
    done: "PostgreSQL pod started.",
};

const STATUS: Procedure = Procedure {
    playbook: "check_postgres_status_k8s.yml",
    with_inventory: true,
    step: "status check",
    done: "Status checked.",
};

const CLEANUP: Procedure = Procedure {
    playbook: "k8s_cleanup.yml",
    with_inventory: true,
    step: "workload cleanup",
    done: "Workloads cleaned up.",
};

impl PlatformAdapter for OrchestratedAdapter {
    fn platform(&self) -> Platform {
        Platform::Orchestrated
    }

    fn max_nodes(&self, configured_vm_cap: u32) -> u32 {
        configured_vm_cap
    }

    fn compute_count(&self, _topology: &Topology) -> u32 {
        1
    }

    fn provisioning_vars(&self, ctx: &DeployContext<'_>) -> BTreeMap<String, String> {
        let mut vars = ctx.common_vars(Platform::Orchestrated, 1);
        vars.insert(
            "workload_units".to_string(),
            ctx.topology.workload_units.unwrap_or(1).to_string(),
        );
        vars
    }

    fn config_vars(&self, ctx: &DeployContext<'_>) -> BTreeMap<String, String> {
        // group vars carry the requested node count, not the single host
        let mut vars = ctx.common_vars(Platform::Orchestrated, ctx.topology.node_count);
        vars.insert(
            "workload_units".to_string(),
            ctx.topology.workload_units.unwrap_or(1).to_string(),
        );
        vars
    }

    fn service_stop_step(&self) -> Procedure {
        SERVICE_STOP
    }

    fn service_start_step(&self) -> Procedure {
        SERVICE_START
    }

    fn status_inspection_step(&self) -> (Procedure, StatusGrammar) {
        (STATUS, StatusGrammar::Enumerated)
    }

    fn data_plane_step(&self, cluster: &str, op: &DataPlaneOp) -> (Procedure, BTreeMap<String, String>) {
        let mut vars = op.base_vars();
        let (playbook, step, with_inventory) = match op {
            DataPlaneOp::CreateDatabase { .. } => {
                vars.insert("cluster_name".to_string(), cluster.to_string());
                ("create_database_k8s.yml", "create database", true)
            }
            DataPlaneOp::DropDatabase { .. } => {
                vars.insert("cluster_name".to_string(), cluster.to_string());
                ("drop_database_k8s.yml", "drop database", true)
            }
            DataPlaneOp::AddUser { .. } => ("k8s_add_user.yml", "add user", true),
            // runs against the local cluster context, no hosts needed
            DataPlaneOp::RemoveUser { .. } => ("k8s_remove_user.yml", "remove user", false),
            DataPlaneOp::ListDatabases => ("list_databases_k8s.yml", "list databases", true),
        };
        (
            Procedure {
                playbook,
                with_inventory,
                step,
                done: "",
            },
            vars,
        )
    }

    fn teardown_step(&self) -> Option<Procedure> {
        Some(CLEANUP)
    }

    fn address_for_node(&self, record: &ClusterRecord, _ordinal: usize) -> Option<String> {
        record.primary_address().map(str::to_string)
    }

    fn service_port(&self, connection: &ConnectionConfig) -> u16 {
        connection.orchestrated_port
    }
}
