//! `bt.toml` configuration
//!
//! The file is optional. Missing keys take their defaults; unknown keys are
//! rejected so typos do not silently fall back.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BtError, Result};
use crate::executor::DEFAULT_SHELL;
use crate::orchestrator::OrchestratorConfig;
use crate::stages::DEFAULT_STAGES_DIR;

pub const CONFIG_FILE: &str = "bt.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub poll_interval_secs: u64,
    pub max_parallel: usize,
    pub shell: String,
    pub stages_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_parallel: 4,
            shell: DEFAULT_SHELL.to_string(),
            stages_dir: DEFAULT_STAGES_DIR.to_string(),
        }
    }
}

impl Config {
    /// Read `<dir>/bt.toml`, or defaults if there is none
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| BtError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| BtError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.max_parallel == 0 {
            return Err("max_parallel must be at least 1".to_string());
        }
        if self.shell.trim().is_empty() {
            return Err("shell must not be empty".to_string());
        }
        if self.stages_dir.trim_matches('/').is_empty() {
            return Err("stages_dir must not be empty".to_string());
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the file values
    pub fn with_overrides(mut self, interval_secs: Option<u64>, max_parallel: Option<usize>) -> Result<Self> {
        if let Some(secs) = interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(jobs) = max_parallel {
            if jobs == 0 {
                return Err(BtError::Config("-j must be at least 1".to_string()));
            }
            self.max_parallel = jobs;
        }
        Ok(self)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_parallel: self.max_parallel,
            shell: self.shell.clone(),
            stages_dir: self.stages_dir.trim_matches('/').to_string(),
        }
    }
}
