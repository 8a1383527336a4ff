#![allow(dead_code)]

use async_trait::async_trait;
use db_provisioner::cluster::{Platform, Topology};
use db_provisioner::orchestrator::DeployRequest;
use db_provisioner::tool::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use db_provisioner::{Config, Orchestrator};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEPLOY_ADDRESS: &str = "198.51.100.10";
pub const OPERATOR_ADDRESS: &str = "203.0.113.1";

/// Every procedure either platform can run.
pub const PROCEDURES: &[&str] = &[
    "stop_server.yml",
    "start_server.yml",
    "stop_instance.yml",
    "start_instance.yml",
    "check_postgres_status.yml",
    "create_database.yml",
    "drop_database.yml",
    "add_user.yml",
    "remove_user.yml",
    "list_databases.yml",
    "stop_postgres_pod.yml",
    "start_postgres_pod.yml",
    "check_postgres_status_k8s.yml",
    "create_database_k8s.yml",
    "drop_database_k8s.yml",
    "k8s_add_user.yml",
    "k8s_remove_user.yml",
    "list_databases_k8s.yml",
    "k8s_cleanup.yml",
];

/// Scripted stand-in for terraform, aws and ansible-playbook.
///
/// Invocations are keyed by what they do: `init`, `apply`, `destroy`,
/// `output`, `describe`, or the procedure's file name. Keys marked as failing
/// exit non-zero; `timeout` keys fail the invocation itself.
pub struct FakeRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    failing: Mutex<HashSet<String>>,
    timing_out: Mutex<HashSet<String>>,
    stdout: Mutex<HashMap<String, String>>,
    address: Mutex<String>,
    write_inventory: Mutex<bool>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            timing_out: Mutex::new(HashSet::new()),
            stdout: Mutex::new(HashMap::new()),
            address: Mutex::new(DEPLOY_ADDRESS.to_string()),
            write_inventory: Mutex::new(true),
        }
    }

    pub fn fail(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }

    pub fn recover(&self, key: &str) {
        self.failing.lock().remove(key);
        self.timing_out.lock().remove(key);
    }

    pub fn time_out(&self, key: &str) {
        self.timing_out.lock().insert(key.to_string());
    }

    pub fn set_stdout(&self, key: &str, text: &str) {
        self.stdout.lock().insert(key.to_string(), text.to_string());
    }

    /// Address the inspector reports from now on.
    pub fn set_address(&self, address: &str) {
        *self.address.lock() = address.to_string();
    }

    /// Whether apply generates the configuration inventory.
    pub fn set_write_inventory(&self, write: bool) {
        *self.write_inventory.lock() = write;
    }

    pub fn count(&self, key: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|inv| invocation_key(inv) == key)
            .count()
    }

    pub fn keys(&self) -> Vec<String> {
        self.calls.lock().iter().map(invocation_key).collect()
    }

    pub fn calls_for(&self, key: &str) -> Vec<ToolInvocation> {
        self.calls
            .lock()
            .iter()
            .filter(|inv| invocation_key(inv) == key)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn respond(&self, key: &str, invocation: &ToolInvocation) -> ToolOutput {
        if self.failing.lock().contains(key) {
            return ToolOutput {
                stdout: String::new(),
                stderr: format!("fatal: scripted failure of {}", key),
                exit_code: Some(2),
            };
        }

        let stdout = match key {
            "apply" => {
                if *self.write_inventory.lock() {
                    write_inventory(invocation);
                }
                "Apply complete!".to_string()
            }
            "output" => serde_json::json!({
                "instance_ids": { "value": ["i-0001", "i-0002", "i-0003"] },
                "public_ips": { "value": ["198.51.100.10", "198.51.100.11", "198.51.100.12"] },
                "private_ips": { "value": ["10.0.0.10", "10.0.0.11", "10.0.0.12"] },
            })
            .to_string(),
            "describe" => format!("{}\n", self.address.lock()),
            other => self.stdout.lock().get(other).cloned().unwrap_or_default(),
        };
        ToolOutput {
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
        }
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let key = invocation_key(invocation);
        self.calls.lock().push(invocation.clone());
        if self.timing_out.lock().contains(&key) {
            return Err(ToolError::timeout(invocation.command_line(), invocation.timeout));
        }
        Ok(self.respond(&key, invocation))
    }
}

fn invocation_key(invocation: &ToolInvocation) -> String {
    match invocation.program.as_str() {
        "terraform" => invocation.args.first().cloned().unwrap_or_default(),
        "aws" => "describe".to_string(),
        _ => invocation
            .args
            .iter()
            .find(|a| a.ends_with(".yml"))
            .and_then(|a| Path::new(a).file_name())
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

/// What the provisioning module generates on apply: an inventory listing
/// the primary node.
fn write_inventory(invocation: &ToolInvocation) {
    let Some(workspace) = invocation.cwd.as_deref().and_then(Path::parent) else {
        return;
    };
    let name = workspace
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let inventory = workspace.join("ansible/inventory/inventory.ini");
    fs::create_dir_all(inventory.parent().expect("inventory has a parent")).unwrap();
    fs::write(
        &inventory,
        format!(
            "[postgres]\n{name}-node-1 ansible_host={DEPLOY_ADDRESS} ansible_user=rocky\n\n[all:vars]\nansible_python_interpreter=/usr/bin/python3\n"
        ),
    )
    .unwrap();
}

/// Provisioning and configuration templates as an operator would ship them.
pub fn write_templates(root: &Path) {
    let terraform = root.join("terraform");
    let ansible = root.join("ansible");
    fs::create_dir_all(&terraform).unwrap();
    fs::create_dir_all(ansible.join("group_vars")).unwrap();

    fs::write(terraform.join("main.tf"), "# compute module\n").unwrap();
    fs::write(
        terraform.join("terraform.tfvars.tmpl"),
        "cluster_name   = \"{{ cluster_name }}\"\n\
         instance_count = {{ instance_count }}\n\
         ami            = \"{{ ami }}\"\n\
         allowed_ips    = {{ allowed_ips }}\n\
         operator_ip    = \"{{ server_public_ip }}\"\n",
    )
    .unwrap();
    fs::write(
        ansible.join("group_vars/all.yml"),
        "postgres_version: \"{{ postgres_version }}\"\nnode_count: {{ node_count }}\n",
    )
    .unwrap();
    for procedure in PROCEDURES {
        fs::write(ansible.join(procedure), "- hosts: all\n").unwrap();
    }
}

pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub runner: Arc<FakeRunner>,
    pub orchestrator: Orchestrator,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let templates = dir.path().join("templates");
        write_templates(&templates);

        let config = Config {
            deployments_dir: dir.path().join("deployments"),
            templates_dir: templates,
            state_dir: dir.path().join("state"),
            operator_address: Some(OPERATOR_ADDRESS.to_string()),
            ..Config::default()
        };
        let runner = Arc::new(FakeRunner::new());
        let orchestrator = Orchestrator::builder()
            .config(config)
            .runner(runner.clone())
            .ephemeral(true)
            .build()
            .await
            .expect("Failed to build orchestrator");

        Self {
            dir,
            runner,
            orchestrator,
        }
    }

    pub fn workspace(&self, name: &str) -> PathBuf {
        self.dir.path().join("deployments").join(name)
    }

    pub fn inventory(&self, name: &str) -> String {
        fs::read_to_string(self.workspace(name).join("ansible/inventory/inventory.ini"))
            .expect("Failed to read inventory")
    }

    /// Deploy a cluster and clear the call log.
    pub async fn deployed(&self, name: &str, platform: Platform, nodes: u32) {
        self.orchestrator
            .deploy(request(name, platform, nodes))
            .await
            .expect("deploy failed");
        self.runner.clear();
    }
}

pub fn request(name: &str, platform: Platform, nodes: u32) -> DeployRequest {
    DeployRequest {
        name: name.to_string(),
        platform,
        topology: Topology {
            node_count: nodes,
            workload_units: None,
            image: "ami-0a73e96a849c232cc".to_string(),
            instance_size: "t3.medium".to_string(),
            data_volume_gb: 20,
            database_version: "16".to_string(),
            allowed_cidrs: vec!["192.0.2.0/24".to_string()],
        },
    }
}
