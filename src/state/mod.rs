//! Durable cluster record store.
//!
//! Records live in a SQLite database (`<state_dir>/clusters.db`) in WAL mode.
//! The store is the single source of truth for whether a cluster exists and
//! what its declared status is; every mutation is committed before returning.
//!
//! # Example
//!
//! ```ignore
//! use db_provisioner::state::ClusterStore;
//!
//! let store = ClusterStore::new(config.database_path()).await?;
//! store.initialize().await?;
//! let record = store.get("orders").await?;
//! ```

mod sqlite;

pub use sqlite::SqliteClusterStore;

/// Primary record store type, backed by SQLite.
pub type ClusterStore = SqliteClusterStore;
