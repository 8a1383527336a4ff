use crate::cluster::{ClusterRecord, Platform, Topology};
use crate::status::StatusReport;
use serde::Serialize;

/// Everything needed to create a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub name: String,
    pub platform: Platform,
    pub topology: Topology,
}

/// Two-tier stop confirmation.
///
/// `stop_server` is only honoured when `stop_service` is also confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopRequest {
    pub stop_service: bool,
    pub stop_server: bool,
}

/// Successful result of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub message: String,
}

impl Outcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Messages of the completed steps, joined the way operators expect.
    pub fn from_steps(steps: &[&str]) -> Self {
        if steps.is_empty() {
            Self::new("No actions performed.")
        } else {
            Self::new(steps.join(" | "))
        }
    }
}

/// Stored record plus a fresh, non-persisted inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatusReport {
    pub record: ClusterRecord,
    pub observed: StatusReport,
}

/// How a client reaches a cluster's database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub cluster: String,
    pub platform: Platform,
    /// Primary node's public address, if one is known.
    pub host: Option<String>,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionInfo {
    /// `psql` command line, when the host is known.
    pub fn connection_string(&self) -> Option<String> {
        self.host.as_ref().map(|host| {
            format!(
                "psql -h {} -p {} -U {} -d {}",
                host, self.port, self.user, self.database
            )
        })
    }
}
