use async_trait::async_trait;

use crate::config::DynamicConfig;

/// Source of task cadence, usually a remote configuration service.
#[async_trait]
pub trait ConfigPoller: Send + Sync {
    async fn poll(&self) -> anyhow::Result<DynamicConfig>;
}

/// Transport for finished exchange files.
#[async_trait]
pub trait Uploader: Send + Sync {
    fn name(&self) -> &str;
    /// `name` is the exchange file stem; `bytes` the publication it holds.
    async fn upload(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()>;
}
