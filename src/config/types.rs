//! Core configuration types.
//!
//! This module contains the root [`Config`] struct loaded from
//! `db-provisioner.yaml`. Every field has a default so an empty file (or no
//! file at all) yields a usable configuration.

use super::duration::serde_duration;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for db-provisioner.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for per-cluster workspaces.
    pub deployments_dir: PathBuf,

    /// Root directory of the provisioning/configuration templates.
    pub templates_dir: PathBuf,

    /// Record store database and lock files.
    pub state_dir: PathBuf,

    /// Timeout for provisioning and configuration tool calls.
    #[serde(with = "serde_duration")]
    pub tool_timeout: Duration,

    /// Timeout for resource inspector calls.
    #[serde(with = "serde_duration")]
    pub inspect_timeout: Duration,

    /// Maximum number of VM nodes a single cluster may request.
    pub max_vm_nodes: u32,

    /// Operator address whitelisted on the provisioned firewall.
    /// Discovered from `operator_address_url` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_address: Option<String>,

    pub operator_address_url: String,

    pub ssh: SshConfig,

    /// Compute image id -> login user.
    pub images: BTreeMap<String, String>,

    /// Supported database versions.
    pub database_versions: Vec<String>,

    pub tools: ToolsConfig,

    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub key_name: String,
    pub public_key_path: String,
    pub private_key_path: String,
    /// Login user for images missing from `images`.
    pub default_user: String,
}

/// Executable names of the external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub provisioner: String,
    pub configurator: String,
    pub inspector: String,
}

/// Credentials and ports reported by `connection-info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub vm_port: u16,
    pub orchestrated_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let images = [
            ("ami-0a73e96a849c232cc", "rocky"),
            ("ami-0c2b8ca1dad447f8a", "ubuntu"),
            ("ami-0de53d8956e8dcf80", "ec2-user"),
            ("ami-08962a4068733a2b6", "centos"),
        ]
        .into_iter()
        .map(|(ami, user)| (ami.to_string(), user.to_string()))
        .collect();

        Self {
            deployments_dir: PathBuf::from("deployments"),
            templates_dir: PathBuf::from("templates"),
            state_dir: PathBuf::from(".dbprov"),
            tool_timeout: Duration::from_secs(30 * 60),
            inspect_timeout: Duration::from_secs(2 * 60),
            max_vm_nodes: 9,
            operator_address: None,
            operator_address_url: "https://api.ipify.org".to_string(),
            ssh: SshConfig::default(),
            images,
            database_versions: vec!["14".into(), "15".into(), "16".into()],
            tools: ToolsConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key_name: "ha-postgres-key".to_string(),
            public_key_path: "~/.ssh/ha-postgres-key.pub".to_string(),
            private_key_path: "~/.ssh/ha-postgres-key".to_string(),
            default_user: "rocky".to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            provisioner: "terraform".to_string(),
            configurator: "ansible-playbook".to_string(),
            inspector: "aws".to_string(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            vm_port: 5432,
            orchestrated_port: 30036,
        }
    }
}

impl Config {
    /// Login user for a compute image, falling back to `ssh.default_user`.
    pub fn login_user_for(&self, image: &str) -> &str {
        self.images
            .get(image)
            .map(String::as_str)
            .unwrap_or(&self.ssh.default_user)
    }

    /// Path of the record store database.
    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("clusters.db")
    }

    /// Directory holding per-cluster lock files.
    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }

    /// Resolve relative directories against `base` (the config file's directory).
    pub fn rebase(&mut self, base: &std::path::Path) {
        for dir in [
            &mut self.deployments_dir,
            &mut self.templates_dir,
            &mut self.state_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("tools.provisioner", &self.tools.provisioner),
            ("tools.configurator", &self.tools.configurator),
            ("tools.inspector", &self.tools.inspector),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", field)));
            }
        }
        if self.max_vm_nodes == 0 {
            return Err(Error::Config("max_vm_nodes must be at least 1".to_string()));
        }
        if self.database_versions.is_empty() {
            return Err(Error::Config(
                "database_versions must list at least one version".to_string(),
            ));
        }
        if self.tool_timeout.is_zero() || self.inspect_timeout.is_zero() {
            return Err(Error::Config("tool timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}
