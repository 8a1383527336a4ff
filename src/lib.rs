#![allow(unused_assignments)]

//! # db-provisioner
//!
//! Lifecycle management for named PostgreSQL clusters running either on
//! plain virtual machines or on a single orchestrated host.
//!
//! ## Features
//!
//! - **Deploy with rollback**: a cluster record exists only once
//!   infrastructure, configuration inputs and addresses are all in place
//! - **Two-tier stop**: stopping the server requires stopping the service first
//! - **Address refresh on start**: new public addresses land in both the
//!   record and the configuration inventory
//! - **Platform adapters**: VM and orchestrated clusters share one lifecycle
//! - **Database and user management** on running clusters
//!
//! ## Quick Start
//!
//! ```no_run
//! use db_provisioner::{Orchestrator, Parser};
//! use db_provisioner::cluster::ClusterFilter;
//!
//! # async fn example() -> Result<(), db_provisioner::Error> {
//! let config = Parser::new().load_or_default(None)?;
//! let orchestrator = Orchestrator::builder().config(config).build().await?;
//!
//! for cluster in orchestrator.list(&ClusterFilter::default()).await? {
//!     println!("{} ({})", cluster.name, cluster.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Operations on the same cluster name are serialized, across tasks and
//! across processes sharing a state directory. Operations on different
//! names run concurrently. Status inspection takes no lock.

pub mod cluster;
pub mod config;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod platform;
pub mod state;
pub mod status;
pub mod tool;
pub mod workspace;

pub use config::{Config, Parser};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
