// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use crate::tool::ToolError;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Cluster not found: {0}")]
    #[diagnostic(
        code(dbprov::cluster::not_found),
        help("List known clusters with `dbprov list`")
    )]
    NotFound(String),

    #[error("Cluster '{0}' already exists")]
    #[diagnostic(
        code(dbprov::cluster::conflict),
        help("Choose a different name or decommission the existing cluster first")
    )]
    Conflict(String),

    #[error("Policy violation: {0}")]
    #[diagnostic(code(dbprov::policy))]
    PolicyViolation(String),

    #[error("Cannot {operation} cluster '{cluster}' while it is {status}")]
    #[diagnostic(
        code(dbprov::cluster::invalid_state),
        help("Check the cluster with `dbprov status {cluster}`")
    )]
    InvalidState {
        cluster: String,
        status: String,
        operation: String,
    },

    #[error("External tool failure: {0}")]
    #[diagnostic(
        code(dbprov::tool::failed),
        help("Inspect the tool output above; no operation is retried automatically")
    )]
    ExternalToolFailure(#[from] ToolError),

    #[error("Could not parse {what}: {reason}")]
    #[diagnostic(code(dbprov::tool::parse))]
    ParseFailure { what: String, reason: String },

    #[error("Partial failure on '{cluster}': {} succeeded, but {failed} failed: {cause}", completed_steps(.completed))]
    #[diagnostic(
        code(dbprov::cluster::partial),
        help("Only the failed step needs to be retried")
    )]
    PartialFailure {
        cluster: String,
        completed: Vec<String>,
        failed: String,
        cause: String,
    },

    #[error("Workspace artifact missing: {0}")]
    #[diagnostic(
        code(dbprov::workspace::missing),
        help("The cluster workspace is incomplete; check the templates directory")
    )]
    MissingArtifact(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(dbprov::config::error))]
    Config(String),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(dbprov::filesystem::error))]
    Filesystem(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(dbprov::database::error))]
    Database(#[from] tokio_rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn completed_steps(steps: &[String]) -> String {
    if steps.is_empty() {
        "nothing".to_string()
    } else {
        steps.join(", ")
    }
}

impl Error {
    /// HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Conflict(_) | Error::InvalidState { .. } => 409,
            Error::PolicyViolation(_) => 400,
            _ => 500,
        }
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::NotFound(name) => Some(format!(
                "No cluster named '{}' is recorded. Run 'dbprov list' to see known clusters.",
                name
            )),
            Error::Conflict(name) => Some(format!(
                "A record or workspace for '{}' already exists. Decommission it or pick another name.",
                name
            )),
            Error::InvalidState { cluster, .. } => Some(format!(
                "Check the current state with: dbprov status {}",
                cluster
            )),
            Error::ExternalToolFailure(ToolError::ExecFailed { .. }) => Some(
                "Check that terraform, ansible-playbook and aws are installed and on PATH, or set `tools` in db-provisioner.yaml".to_string(),
            ),
            Error::ExternalToolFailure(ToolError::Timeout { .. }) => Some(
                "Increase `tool_timeout` in db-provisioner.yaml if the tool is just slow".to_string(),
            ),
            Error::PartialFailure { failed, .. } => Some(format!(
                "Only the {} step needs to be retried once the cause is fixed",
                failed
            )),
            Error::PolicyViolation(msg) if msg.contains("standalone") => Some(
                "Multi-node clusters are torn down through the HA teardown path, not decommission"
                    .to_string(),
            ),
            Error::PolicyViolation(msg) if msg.contains("cancelled") => {
                Some("Pass --service to confirm stopping the database service".to_string())
            }
            Error::Config(_) | Error::Yaml(_) => {
                Some("Check db-provisioner.yaml for typos and invalid durations".to_string())
            }
            Error::Database(e) => {
                // tokio_rusqlite wraps the underlying rusqlite error opaquely, so
                // we can only match on the message.
                let err_str = e.to_string();
                if err_str.contains("database is locked") || err_str.contains("SQLITE_BUSY") {
                    Some("Another dbprov process holds the record store. Retry in a moment.".to_string())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
