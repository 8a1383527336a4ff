use super::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAMES: [&str; 2] = ["db-provisioner.yaml", "db-provisioner.yml"];

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find config file starting from current directory
    pub fn find_config_file(&self) -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        Self::find_config_in_dir(&current_dir)
    }

    pub fn find_config_in_dir(dir: &Path) -> Option<PathBuf> {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        dir.parent().and_then(Self::find_config_in_dir)
    }

    /// Load config from file path. Relative directories in the file are
    /// resolved against the file's own directory.
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = self.parse_config(&content)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load the explicitly requested file, else the nearest discovered one,
    /// else built-in defaults.
    pub fn load_or_default(&self, explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return self.load_config(path);
        }
        match self.find_config_file() {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                self.load_config(path)
            }
            None => {
                tracing::debug!("No db-provisioner.yaml found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<Config> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?;

        Ok(config)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
