use super::{DataPlaneOp, DeployContext, PlatformAdapter, Procedure};
use crate::cluster::{ClusterRecord, Platform, Topology};
use crate::config::ConnectionConfig;
use crate::status::StatusGrammar;
use std::collections::BTreeMap;

/// One compute instance per database node. The database process and the
/// instance are stopped and started separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmAdapter;

const SERVICE_STOP: Procedure = Procedure {
    playbook: "stop_instance.yml",
    with_inventory: true,
    step: "PostgreSQL service stop",
    done: "PostgreSQL service stopped.",
};

const SERVICE_START: Procedure = Procedure {
    playbook: "start_instance.yml",
    with_inventory: true,
    step: "PostgreSQL service start",
    done: "PostgreSQL service started.",
};

const STATUS: Procedure = Procedure {
    playbook: "check_postgres_status.yml",
    with_inventory: true,
    step: "status check",
    done: "Status checked.",
};

const fn data_plane(playbook: &'static str, step: &'static str) -> Procedure {
    Procedure {
        playbook,
        with_inventory: true,
        step,
        done: "",
    }
}

impl PlatformAdapter for VmAdapter {
    fn platform(&self) -> Platform {
        Platform::Vm
    }

    fn max_nodes(&self, configured_vm_cap: u32) -> u32 {
        configured_vm_cap
    }

    fn compute_count(&self, topology: &Topology) -> u32 {
        topology.node_count
    }

    fn provisioning_vars(&self, ctx: &DeployContext<'_>) -> BTreeMap<String, String> {
        ctx.common_vars(Platform::Vm, self.compute_count(ctx.topology))
    }

    fn config_vars(&self, ctx: &DeployContext<'_>) -> BTreeMap<String, String> {
        ctx.common_vars(Platform::Vm, self.compute_count(ctx.topology))
    }

    fn service_stop_step(&self) -> Procedure {
        SERVICE_STOP
    }

    fn service_start_step(&self) -> Procedure {
        SERVICE_START
    }

    fn status_inspection_step(&self) -> (Procedure, StatusGrammar) {
        (STATUS, StatusGrammar::BooleanFlag)
    }

    fn data_plane_step(&self, _cluster: &str, op: &DataPlaneOp) -> (Procedure, BTreeMap<String, String>) {
        let procedure = match op {
            DataPlaneOp::CreateDatabase { .. } => data_plane("create_database.yml", "create database"),
            DataPlaneOp::DropDatabase { .. } => data_plane("drop_database.yml", "drop database"),
            DataPlaneOp::AddUser { .. } => data_plane("add_user.yml", "add user"),
            DataPlaneOp::RemoveUser { .. } => data_plane("remove_user.yml", "remove user"),
            DataPlaneOp::ListDatabases => data_plane("list_databases.yml", "list databases"),
        };
        (procedure, op.base_vars())
    }

    fn address_for_node(&self, record: &ClusterRecord, ordinal: usize) -> Option<String> {
        record
            .endpoints
            .get(ordinal.checked_sub(1)?)
            .and_then(|e| e.public_address.clone())
    }

    fn service_port(&self, connection: &ConnectionConfig) -> u16 {
        connection.vm_port
    }
}
