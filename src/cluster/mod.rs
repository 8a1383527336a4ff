//! Cluster data model: records, statuses, topology and listing filters.

mod types;

pub use types::*;
