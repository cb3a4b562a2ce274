use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;

use super::traits::ConfigPoller;
use crate::config::DynamicConfig;

/// Serves the same configuration on every poll.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigPoller {
    config: DynamicConfig,
}

impl StaticConfigPoller {
    pub fn new(config: DynamicConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigPoller for StaticConfigPoller {
    async fn poll(&self) -> anyhow::Result<DynamicConfig> {
        Ok(self.config.clone())
    }
}

/// Re-reads a JSON file on every poll, so cadence can be changed without a
/// restart. A missing or malformed file fails the poll.
#[derive(Debug, Clone)]
pub struct FileConfigPoller {
    path: PathBuf,
}

impl FileConfigPoller {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigPoller for FileConfigPoller {
    async fn poll(&self) -> anyhow::Result<DynamicConfig> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse {}", self.path.display()))
    }
}
