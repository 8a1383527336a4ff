use super::locks::NameLocks;
use super::Orchestrator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::ClusterStore;
use crate::tool::{ProcessRunner, ToolRunner};
use std::sync::Arc;

/// Builder for constructing an `Orchestrator` with a fluent API.
///
/// `build()` opens and initializes the record store, so a built
/// orchestrator is ready to use.
///
/// # Example
///
/// ```no_run
/// use db_provisioner::{Config, Orchestrator};
///
/// # async fn example() -> Result<(), db_provisioner::Error> {
/// let orchestrator = Orchestrator::builder()
///     .config(Config::default())
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    config: Option<Config>,
    runner: Option<Arc<dyn ToolRunner>>,
    ephemeral: bool,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            runner: None,
            ephemeral: false,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the child-process runner (tests use a scripted runner).
    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Keep records in memory and skip cross-process lock files.
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// # Errors
    ///
    /// Returns an error if no config was given, the config is invalid, or
    /// the record store cannot be opened.
    pub async fn build(self) -> Result<Orchestrator> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("config is required".to_string()))?;
        config.validate()?;

        let (store, locks) = if self.ephemeral {
            (ClusterStore::new_ephemeral().await?, NameLocks::new(None))
        } else {
            (
                ClusterStore::new(config.database_path()).await?,
                NameLocks::new(Some(config.locks_dir())),
            )
        };
        store.initialize().await?;

        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(ProcessRunner::new()));

        Ok(Orchestrator::from_parts(config, store, runner, locks))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
