use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Static agent configuration, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    /// Directories (or single files) holding type descriptors.
    pub code_base: Vec<PathBuf>,
    /// Globs selecting descriptor files below `code_base`; empty means the default.
    pub include: Vec<String>,
    /// Package prefixes that make up the application's own code.
    pub packages: Vec<String>,
    pub exclude_packages: Vec<String>,
    /// `public`, `protected`, `package-private` or `private`.
    pub method_visibility: String,
    pub include_trivial_accessors: bool,
    pub exchange_dir: PathBuf,
    pub tick_period_ms: u64,
    pub shutdown_timeout_secs: u64,
    /// Task cadence until a config poll says otherwise.
    pub initial: DynamicConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            app_version: "unspecified".into(),
            environment: "default".into(),
            code_base: Vec::new(),
            include: Vec::new(),
            packages: Vec::new(),
            exclude_packages: Vec::new(),
            method_visibility: "public".into(),
            include_trivial_accessors: false,
            exchange_dir: std::env::temp_dir().join("tally"),
            tick_period_ms: 1_000,
            shutdown_timeout_secs: 30,
            initial: DynamicConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by `TALLY_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_vars(std::env::vars())
    }

    /// Reads a JSON config file; `TALLY_*` environment variables still win.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| AgentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| AgentError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.with_vars(std::env::vars()))
    }

    fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        for (key, value) in vars {
            match key.as_str() {
                "TALLY_APP_NAME" => self.app_name = value,
                "TALLY_APP_VERSION" => self.app_version = value,
                "TALLY_ENVIRONMENT" => self.environment = value,
                "TALLY_CODE_BASE" => {
                    self.code_base = split_list(&value).map(PathBuf::from).collect()
                }
                "TALLY_PACKAGES" => self.packages = split_list(&value).map(String::from).collect(),
                "TALLY_EXCLUDE_PACKAGES" => {
                    self.exclude_packages = split_list(&value).map(String::from).collect()
                }
                "TALLY_METHOD_VISIBILITY" => self.method_visibility = value,
                "TALLY_EXCHANGE_DIR" => self.exchange_dir = PathBuf::from(value),
                _ => {}
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.app_name.trim().is_empty() {
            return Err(AgentError::Config("app_name must be set".into()));
        }
        if self.packages.iter().all(|p| p.trim().is_empty()) {
            return Err(AgentError::Config("at least one package prefix is required".into()));
        }
        if self.tick_period_ms == 0 {
            return Err(AgentError::Config("tick_period_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Longest interval a task may be configured with: one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3_600;

/// Cadence of one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub interval_secs: u64,
    pub retry_interval_secs: u64,
    pub enabled: bool,
}

impl TaskSettings {
    pub const fn every(interval_secs: u64, retry_interval_secs: u64) -> Self {
        Self {
            interval_secs,
            retry_interval_secs,
            enabled: true,
        }
    }

    /// Clamped to one second up to [`MAX_INTERVAL_SECS`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.clamp(1, MAX_INTERVAL_SECS))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.clamp(1, MAX_INTERVAL_SECS))
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::every(600, 60)
    }
}

/// Task cadence as served by the remote-config collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicConfig {
    pub config_poll: TaskSettings,
    pub code_base: TaskSettings,
    pub invocation_data: TaskSettings,
    pub upload: TaskSettings,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            config_poll: TaskSettings::every(3_600, 10),
            code_base: TaskSettings::every(600, 60),
            invocation_data: TaskSettings::every(3_600, 60),
            upload: TaskSettings::every(60, 30),
        }
    }
}
