//! Per-cluster workspaces.
//!
//! A workspace is the directory holding one cluster's generated provisioning
//! and configuration artifacts:
//!
//! ```text
//! <deployments_dir>/<name>/
//!   terraform/                  copied from <templates_dir>/terraform
//!     terraform.tfvars          rendered from terraform.tfvars.tmpl
//!   ansible/                    copied from <templates_dir>/ansible
//!     group_vars/all.yml        rendered in place
//!     inventory/inventory.ini   written by the provisioning run
//!     *.yml                     procedures
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

const PROVISION_DIR: &str = "terraform";
const CONFIG_DIR: &str = "ansible";
const PROVISION_TEMPLATE: &str = "terraform.tfvars.tmpl";
const PROVISION_INPUT: &str = "terraform.tfvars";
const CONFIG_INPUT: &str = "group_vars/all.yml";
const INVENTORY: &str = "inventory/inventory.ini";

static TEMPLATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_template_regex() -> &'static Regex {
    TEMPLATE_REGEX
        .get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").expect("static regex pattern is valid"))
}

/// Substitute every `{{ key }}` placeholder in `template`.
///
/// Unknown keys are an error rather than silently rendering as empty.
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let regex = get_template_regex();
    let mut missing = Vec::new();
    let rendered = regex.replace_all(template, |caps: &regex::Captures| {
        let key = caps[1].trim();
        match vars.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(Error::Template(format!(
            "undefined template variables: {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

/// Cluster names double as directory names.
pub fn validate_cluster_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::PolicyViolation(
            "cluster name must not be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::PolicyViolation(format!(
            "cluster name '{}' may only contain letters, digits, '-' and '_'",
            name
        )));
    }
    Ok(())
}

/// Where workspaces are created and what they are created from.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    deployments_dir: PathBuf,
    templates_dir: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(deployments_dir: impl Into<PathBuf>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            deployments_dir: deployments_dir.into(),
            templates_dir: templates_dir.into(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.deployments_dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    /// Create the workspace directory for `name` and populate it from the
    /// templates. Fails with `Conflict` if the directory already exists.
    ///
    /// If population fails the half-built directory is removed again.
    pub fn allocate(&self, name: &str) -> Result<Workspace> {
        let path = self.path_for(name);
        fs::create_dir_all(&self.deployments_dir).map_err(|e| {
            Error::Filesystem(format!(
                "cannot create deployments directory {}: {}",
                self.deployments_dir.display(),
                e
            ))
        })?;

        // create_dir (not create_dir_all) so two allocations cannot both win
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::Conflict(name.to_string()));
            }
            Err(e) => {
                return Err(Error::Filesystem(format!(
                    "cannot create workspace {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        let workspace = Workspace { root: path };
        if let Err(e) = self.populate(&workspace) {
            if let Err(cleanup) = workspace.remove() {
                warn!("Failed to remove partial workspace: {}", cleanup);
            }
            return Err(e);
        }
        debug!("Allocated workspace {}", workspace.path().display());
        Ok(workspace)
    }

    fn populate(&self, workspace: &Workspace) -> Result<()> {
        for dir in [PROVISION_DIR, CONFIG_DIR] {
            let src = self.templates_dir.join(dir);
            if !src.is_dir() {
                return Err(Error::MissingArtifact(src.display().to_string()));
            }
            copy_dir_recursive(&src, &workspace.root.join(dir))?;
        }
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Handle to one cluster's workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open an existing workspace by path (as stored in the record).
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Working directory of the provisioning tool.
    pub fn provision_dir(&self) -> PathBuf {
        self.root.join(PROVISION_DIR)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.config_dir().join(INVENTORY)
    }

    pub fn procedure_path(&self, procedure: &str) -> PathBuf {
        self.config_dir().join(procedure)
    }

    pub fn has_procedure(&self, procedure: &str) -> bool {
        self.procedure_path(procedure).is_file()
    }

    /// Render `terraform.tfvars` from its template and drop the template.
    pub fn render_provisioning_input(&self, vars: &BTreeMap<String, String>) -> Result<()> {
        let dir = self.provision_dir();
        let template_path = dir.join(PROVISION_TEMPLATE);
        let template = fs::read_to_string(&template_path)
            .map_err(|_| Error::MissingArtifact(template_path.display().to_string()))?;
        fs::write(dir.join(PROVISION_INPUT), render_template(&template, vars)?)?;
        fs::remove_file(&template_path)?;
        Ok(())
    }

    /// Render `group_vars/all.yml` in place. Templates without group
    /// variables are left alone.
    pub fn render_config_input(&self, vars: &BTreeMap<String, String>) -> Result<()> {
        let path = self.config_dir().join(CONFIG_INPUT);
        if !path.is_file() {
            debug!("No {} in workspace, skipping", CONFIG_INPUT);
            return Ok(());
        }
        let template = fs::read_to_string(&path)?;
        fs::write(&path, render_template(&template, vars)?)?;
        Ok(())
    }

    /// Delete the workspace directory. Missing directories are not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Filesystem(format!(
                "cannot remove workspace {}: {}",
                self.root.display(),
                e
            ))),
        }
    }
}
