use crate::cluster::{
    ClusterFilter, ClusterPatch, ClusterRecord, ClusterStatus, ClusterSummary, NodeEndpoint,
    Platform, Topology,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::path::{Path, PathBuf};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

/// Row as stored, before string columns are parsed back into domain types.
struct RawRecord {
    name: String,
    platform: String,
    status: String,
    topology: String,
    workspace: String,
    created_at: String,
    endpoints: Vec<NodeEndpoint>,
}

struct RawSummary {
    name: String,
    platform: String,
    status: String,
    node_count: u32,
    created_at: String,
}

/// SQLite-backed store of cluster records.
///
/// Every mutation runs in its own transaction and is committed before the
/// call returns; there is no write-back caching. `synchronous = FULL` makes
/// the commit durable across power loss, not just process crashes.
pub struct SqliteClusterStore {
    db_path: PathBuf,
    conn: Connection,
}

impl SqliteClusterStore {
    /// Open (creating if needed) the store at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path).await?;

        conn.call(|conn: &mut rusqlite::Connection| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "FULL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await?;

        Ok(Self { db_path, conn })
    }

    /// Create an in-memory store. Used by tests and dry runs.
    pub async fn new_ephemeral() -> Result<Self> {
        let conn = Connection::open(":memory:").await?;

        conn.call(|conn: &mut rusqlite::Connection| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            conn,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create schema if missing.
    pub async fn initialize(&self) -> Result<()> {
        let schema_exists: bool = self
            .conn
            .call(
                |conn: &mut rusqlite::Connection| -> tokio_rusqlite::Result<bool> {
                    Ok(conn.query_row(
                        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='clusters'",
                        [],
                        |row| row.get(0),
                    )?)
                },
            )
            .await?;

        if schema_exists {
            let version: i32 = self
                .conn
                .call(
                    |conn: &mut rusqlite::Connection| -> tokio_rusqlite::Result<i32> {
                        Ok(conn
                            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                                row.get::<_, Option<i32>>(0)
                            })?
                            .unwrap_or(SCHEMA_VERSION))
                    },
                )
                .await?;
            if version > SCHEMA_VERSION {
                return Err(Error::Config(format!(
                    "record store {} has schema version {}, newer than supported {}",
                    self.db_path.display(),
                    version,
                    SCHEMA_VERSION
                )));
            }
            debug!("Loaded existing record store (schema version {})", version);
            return Ok(());
        }

        info!("Creating record store at {}", self.db_path.display());
        self.conn
            .call(|conn: &mut rusqlite::Connection| -> tokio_rusqlite::Result<()> {
                conn.execute_batch(
                    r#"
                    CREATE TABLE IF NOT EXISTS schema_version (
                        version INTEGER PRIMARY KEY,
                        applied_at TEXT NOT NULL
                    );

                    -- Names compare with BINARY collation, so they are case-sensitive
                    CREATE TABLE IF NOT EXISTS clusters (
                        name TEXT PRIMARY KEY,
                        platform TEXT NOT NULL,
                        status TEXT NOT NULL,
                        node_count INTEGER NOT NULL,
                        topology TEXT NOT NULL,
                        workspace TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_clusters_node_count ON clusters(node_count);

                    CREATE TABLE IF NOT EXISTS cluster_endpoints (
                        cluster_name TEXT NOT NULL,
                        ordinal INTEGER NOT NULL,
                        node TEXT NOT NULL,
                        public_address TEXT,
                        private_address TEXT,
                        PRIMARY KEY (cluster_name, ordinal),
                        FOREIGN KEY (cluster_name) REFERENCES clusters(name) ON DELETE CASCADE
                    );
                    "#,
                )?;
                conn.execute(
                    "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                    rusqlite::params![SCHEMA_VERSION],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    /// Execute a function within a transaction and commit.
    #[tracing::instrument(skip(self, f), fields(operation = "db_transaction"))]
    async fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                let tx = conn.transaction()?;
                let result = f(&tx)?;
                tx.commit()?;
                Ok(result)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn get(&self, name: &str) -> Result<ClusterRecord> {
        let name_owned = name.to_string();
        let raw = self
            .conn
            .call(
                move |conn: &mut rusqlite::Connection| -> tokio_rusqlite::Result<Option<RawRecord>> {
                    let row = conn
                        .query_row(
                            "SELECT name, platform, status, topology, workspace, created_at FROM clusters WHERE name = ?1",
                            rusqlite::params![&name_owned],
                            |row| {
                                Ok(RawRecord {
                                    name: row.get(0)?,
                                    platform: row.get(1)?,
                                    status: row.get(2)?,
                                    topology: row.get(3)?,
                                    workspace: row.get(4)?,
                                    created_at: row.get(5)?,
                                    endpoints: Vec::new(),
                                })
                            },
                        )
                        .optional()?;

                    let Some(mut raw) = row else {
                        return Ok(None);
                    };

                    let mut stmt = conn.prepare(
                        "SELECT node, public_address, private_address FROM cluster_endpoints WHERE cluster_name = ?1 ORDER BY ordinal",
                    )?;
                    raw.endpoints = stmt
                        .query_map(rusqlite::params![&name_owned], |row| {
                            Ok(NodeEndpoint {
                                node: row.get(0)?,
                                public_address: row.get(1)?,
                                private_address: row.get(2)?,
                            })
                        })?
                        .collect::<rusqlite::Result<Vec<_>>>()?;

                    Ok(Some(raw))
                },
            )
            .await?;

        match raw {
            Some(raw) => decode_record(raw),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        let exists = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) > 0 FROM clusters WHERE name = ?1",
                    rusqlite::params![&name],
                    |row| row.get::<_, bool>(0),
                )?)
            })
            .await?;
        Ok(exists)
    }

    /// Insert a new record. Fails with `Conflict` if the name is taken; the
    /// existing row is left untouched.
    pub async fn create(&self, record: &ClusterRecord) -> Result<()> {
        debug!("Creating record for cluster {}", record.name);

        let name = record.name.clone();
        let platform = record.platform.to_string();
        let status = record.status.to_string();
        let node_count = record.topology.node_count;
        let topology = serde_json::to_string(&record.topology)?;
        let workspace = record.workspace.to_string_lossy().to_string();
        let created_at = record.created_at.to_rfc3339();
        let endpoints = record.endpoints.clone();

        let inserted = self
            .with_transaction(move |tx| {
                let taken: bool = tx.query_row(
                    "SELECT COUNT(*) > 0 FROM clusters WHERE name = ?1",
                    rusqlite::params![&name],
                    |row| row.get(0),
                )?;
                if taken {
                    return Ok(false);
                }

                tx.execute(
                    "INSERT INTO clusters (name, platform, status, node_count, topology, workspace, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    rusqlite::params![&name, &platform, &status, node_count, &topology, &workspace, &created_at],
                )?;
                insert_endpoints(tx, &name, &endpoints)?;
                Ok(true)
            })
            .await?;

        if !inserted {
            return Err(Error::Conflict(record.name.clone()));
        }
        Ok(())
    }

    /// Apply a partial update to the mutable fields of a record.
    #[must_use = "ignoring this result may cause state loss - the update will not be persisted"]
    pub async fn update(&self, name: &str, patch: ClusterPatch) -> Result<()> {
        let name_owned = name.to_string();
        let status = patch.status.map(|s| s.to_string());
        let endpoints = patch.endpoints;
        let now = Utc::now().to_rfc3339();

        let rows = self
            .with_transaction(move |tx| {
                let rows = tx.execute(
                    "UPDATE clusters SET status = COALESCE(?1, status), updated_at = ?2 WHERE name = ?3",
                    rusqlite::params![status, &now, &name_owned],
                )?;
                if rows > 0 {
                    if let Some(endpoints) = endpoints {
                        tx.execute(
                            "DELETE FROM cluster_endpoints WHERE cluster_name = ?1",
                            rusqlite::params![&name_owned],
                        )?;
                        insert_endpoints(tx, &name_owned, &endpoints)?;
                    }
                }
                Ok(rows)
            })
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(name.to_string()));
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let name_owned = name.to_string();
        let rows = self
            .with_transaction(move |tx| {
                tx.execute(
                    "DELETE FROM clusters WHERE name = ?1",
                    rusqlite::params![&name_owned],
                )
            })
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// Summaries of all records matching `filter`, ordered by creation time.
    pub async fn list(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
        let standalone = filter.standalone;
        let raws = self
            .conn
            .call(
                move |conn: &mut rusqlite::Connection| -> tokio_rusqlite::Result<Vec<RawSummary>> {
                    let sql = if standalone {
                        "SELECT name, platform, status, node_count, created_at FROM clusters WHERE node_count = 1 ORDER BY created_at, name"
                    } else {
                        "SELECT name, platform, status, node_count, created_at FROM clusters ORDER BY created_at, name"
                    };
                    let mut stmt = conn.prepare(sql)?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok(RawSummary {
                                name: row.get(0)?,
                                platform: row.get(1)?,
                                status: row.get(2)?,
                                node_count: row.get(3)?,
                                created_at: row.get(4)?,
                            })
                        })?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                },
            )
            .await?;

        let mut summaries = Vec::with_capacity(raws.len());
        for raw in raws {
            let summary = ClusterSummary {
                platform: parse_column(&raw.name, "platform", &raw.platform)?,
                status: parse_column(&raw.name, "status", &raw.status)?,
                created_at: parse_timestamp(&raw.name, &raw.created_at)?,
                node_count: raw.node_count,
                name: raw.name,
            };
            if filter.matches(&summary) {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }
}

fn insert_endpoints(
    tx: &rusqlite::Transaction,
    name: &str,
    endpoints: &[NodeEndpoint],
) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO cluster_endpoints (cluster_name, ordinal, node, public_address, private_address)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (ordinal, endpoint) in endpoints.iter().enumerate() {
        stmt.execute(rusqlite::params![
            name,
            ordinal as i64,
            &endpoint.node,
            endpoint.public_address.as_deref(),
            endpoint.private_address.as_deref(),
        ])?;
    }
    Ok(())
}

fn decode_record(raw: RawRecord) -> Result<ClusterRecord> {
    let platform: Platform = parse_column(&raw.name, "platform", &raw.platform)?;
    let status: ClusterStatus = parse_column(&raw.name, "status", &raw.status)?;
    let topology: Topology = serde_json::from_str(&raw.topology).map_err(|e| Error::ParseFailure {
        what: format!("stored topology of '{}'", raw.name),
        reason: e.to_string(),
    })?;
    let created_at = parse_timestamp(&raw.name, &raw.created_at)?;

    Ok(ClusterRecord {
        name: raw.name,
        platform,
        status,
        topology,
        endpoints: raw.endpoints,
        workspace: PathBuf::from(raw.workspace),
        created_at,
    })
}

fn parse_column<T>(name: &str, column: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(|reason| Error::ParseFailure {
        what: format!("stored {} of '{}'", column, name),
        reason,
    })
}

fn parse_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| Error::ParseFailure {
            what: format!("stored creation time of '{}'", name),
            reason: e.to_string(),
        })
}
