//! Cluster lifecycle orchestration.
//!
//! - `core` - [`Orchestrator`] and shared helpers, status and connection reads
//! - `deploy` - provisioning with rollback
//! - `power` - start and two-tier stop
//! - `decommission` - standalone teardown
//! - `data_plane` - database and user management
//! - `locks` - per-name mutual exclusion

mod builder;
mod core;
mod data_plane;
mod decommission;
mod deploy;
mod locks;
mod power;
mod types;

pub use builder::OrchestratorBuilder;
pub use core::Orchestrator;
pub use locks::{NameGuard, NameLocks};
pub use types::{ClusterStatusReport, ConnectionInfo, DeployRequest, Outcome, StopRequest};
