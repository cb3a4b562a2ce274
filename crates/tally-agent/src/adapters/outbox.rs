use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;

use super::traits::Uploader;

/// "Uploads" by copying each file into a local outbox directory, for setups
/// where another process ships the files onward.
#[derive(Debug, Clone)]
pub struct OutboxUploader {
    dir: PathBuf,
}

impl OutboxUploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Uploader for OutboxUploader {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create outbox {}", self.dir.display()))?;
        let tmp = self.dir.join(format!(".{name}.part"));
        let target = self.dir.join(format!("{name}.cbor"));
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("move into {}", target.display()))?;
        Ok(())
    }
}
