use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Infrastructure substrate a cluster runs on. Fixed for the life of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// One compute instance per database node.
    Vm,
    /// One control host running the database as workload units.
    Orchestrated,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Vm => write!(f, "vm"),
            Platform::Orchestrated => write!(f, "orchestrated"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vm" | "ec2" => Ok(Platform::Vm),
            "orchestrated" | "kubernetes" | "k8s" => Ok(Platform::Orchestrated),
            other => Err(format!(
                "unknown platform '{}' (expected 'vm' or 'orchestrated')",
                other
            )),
        }
    }
}

/// Declared lifecycle status of a cluster.
///
/// ```text
/// ABSENT ──► Provisioning ──► Running ◄──► Stopped ──► Decommissioned
///                                │  ▲        │  ▲
///                                ▼  │        ▼  │
///                            Degraded / Unknown
/// ```
///
/// `Provisioning` is never persisted: a record only appears once deploy
/// has fully succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Provisioning,
    Running,
    Stopped,
    /// Compute is up but the database service is not.
    Degraded,
    /// The last external action had an ambiguous outcome.
    Unknown,
    Decommissioned,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterStatus::Provisioning => "provisioning",
            ClusterStatus::Running => "running",
            ClusterStatus::Stopped => "stopped",
            ClusterStatus::Degraded => "degraded",
            ClusterStatus::Unknown => "unknown",
            ClusterStatus::Decommissioned => "decommissioned",
        };
        f.write_str(s)
    }
}

impl FromStr for ClusterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(ClusterStatus::Provisioning),
            "running" => Ok(ClusterStatus::Running),
            "stopped" => Ok(ClusterStatus::Stopped),
            "degraded" => Ok(ClusterStatus::Degraded),
            "unknown" => Ok(ClusterStatus::Unknown),
            "decommissioned" => Ok(ClusterStatus::Decommissioned),
            other => Err(format!("unknown cluster status '{}'", other)),
        }
    }
}

/// Lifecycle operations that are gated on the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Decommission,
    /// Database/user management.
    DataPlane,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Start => write!(f, "start"),
            Operation::Stop => write!(f, "stop"),
            Operation::Decommission => write!(f, "decommission"),
            Operation::DataPlane => write!(f, "manage databases on"),
        }
    }
}

impl ClusterStatus {
    /// Check if a status transition is valid according to the state machine.
    ///
    /// # Examples
    ///
    /// ```
    /// use db_provisioner::cluster::ClusterStatus;
    ///
    /// assert!(ClusterStatus::Provisioning.is_valid_transition(ClusterStatus::Running));
    /// assert!(ClusterStatus::Running.is_valid_transition(ClusterStatus::Stopped));
    /// assert!(!ClusterStatus::Decommissioned.is_valid_transition(ClusterStatus::Running));
    /// ```
    pub fn is_valid_transition(&self, to: ClusterStatus) -> bool {
        use ClusterStatus::*;
        match (self, to) {
            // Nothing leaves the terminal state
            (Decommissioned, _) => false,

            // Deploy either completes or leaves no record at all
            (Provisioning, Running) => true,
            (Provisioning, _) => false,

            (_, Decommissioned) => true,
            (_, Provisioning) => false,

            (s1, s2) if *s1 == s2 => true,

            // Running, Stopped, Degraded and Unknown all reach each other
            // through start/stop and their partial failures
            (Running | Stopped | Degraded | Unknown, Running | Stopped | Degraded | Unknown) => {
                true
            }
        }
    }

    /// Whether `op` may run while the cluster is in this status.
    pub fn permits(&self, op: Operation) -> bool {
        use ClusterStatus::*;
        match op {
            Operation::Start => matches!(self, Stopped | Degraded | Unknown),
            Operation::Stop => matches!(self, Running | Stopped | Degraded | Unknown),
            Operation::Decommission => !matches!(self, Provisioning | Decommissioned),
            Operation::DataPlane => matches!(self, Running),
        }
    }
}

/// Instance/pod counts and sizing chosen at deploy time. Read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Number of database nodes requested.
    pub node_count: u32,
    /// Workload units (pods) for orchestrated clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_units: Option<u32>,
    /// Compute image reference.
    pub image: String,
    pub instance_size: String,
    pub data_volume_gb: u32,
    pub database_version: String,
    /// Client CIDRs allowed through the cluster firewall.
    #[serde(default)]
    pub allowed_cidrs: Vec<String>,
}

impl Topology {
    pub fn is_standalone(&self) -> bool {
        self.node_count == 1
    }
}

/// Addresses of one member node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Node identifier as used in the inventory, e.g. `orders-node-1`.
    pub node: String,
    pub public_address: Option<String>,
    pub private_address: Option<String>,
}

/// Node identifier for the `ordinal`-th member (1-based).
pub fn node_id(cluster: &str, ordinal: usize) -> String {
    format!("{}-node-{}", cluster, ordinal)
}

/// Persisted metadata for one named cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub name: String,
    pub platform: Platform,
    pub status: ClusterStatus,
    pub topology: Topology,
    /// Ordered, primary first.
    pub endpoints: Vec<NodeEndpoint>,
    pub workspace: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl ClusterRecord {
    pub fn primary(&self) -> Option<&NodeEndpoint> {
        self.endpoints.first()
    }

    pub fn primary_address(&self) -> Option<&str> {
        self.primary().and_then(|e| e.public_address.as_deref())
    }

    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            name: self.name.clone(),
            platform: self.platform,
            status: self.status,
            node_count: self.topology.node_count,
            created_at: self.created_at,
        }
    }

    /// Endpoints with the primary node's public address replaced.
    pub fn endpoints_with_primary_address(&self, address: &str) -> Vec<NodeEndpoint> {
        let mut endpoints = self.endpoints.clone();
        match endpoints.first_mut() {
            Some(primary) => primary.public_address = Some(address.to_string()),
            None => endpoints.push(NodeEndpoint {
                node: node_id(&self.name, 1),
                public_address: Some(address.to_string()),
                private_address: None,
            }),
        }
        endpoints
    }
}

/// Mutable fields of a record. Identity, platform, topology, workspace and
/// creation time have no counterpart here and so cannot be changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterPatch {
    pub status: Option<ClusterStatus>,
    pub endpoints: Option<Vec<NodeEndpoint>>,
}

impl ClusterPatch {
    pub fn status(status: ClusterStatus) -> Self {
        Self {
            status: Some(status),
            endpoints: None,
        }
    }

    pub fn endpoints(endpoints: Vec<NodeEndpoint>) -> Self {
        Self {
            status: None,
            endpoints: Some(endpoints),
        }
    }

    pub fn with_status(mut self, status: ClusterStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.endpoints.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub name: String,
    pub platform: Platform,
    pub status: ClusterStatus,
    pub node_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Predicate for listing records.
#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    /// Only single-node clusters.
    pub standalone: bool,
    pub platform: Option<Platform>,
    pub status: Option<ClusterStatus>,
}

impl ClusterFilter {
    pub fn standalone() -> Self {
        Self {
            standalone: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, summary: &ClusterSummary) -> bool {
        (!self.standalone || summary.node_count == 1)
            && self.platform.map_or(true, |p| p == summary.platform)
            && self.status.map_or(true, |s| s == summary.status)
    }
}
