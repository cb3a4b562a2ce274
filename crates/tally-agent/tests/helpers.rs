#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tally_agent::{
    AgentConfig, DynamicConfig, TaskSettings,
    adapters::{ConfigPoller, Uploader},
};
use tally_core::Publication;
use tempfile::TempDir;

/// A code base with `com.acme.Foo{public void a()}` and `com.acme.Bar{private void b()}`.
pub fn write_code_base(root: &Path) {
    fs::create_dir_all(root.join("com/acme")).unwrap();
    fs::write(
        root.join("com/acme/Foo.type.json"),
        r#"{"name":"com.acme.Foo","methods":[{"name":"a"}]}"#,
    )
    .unwrap();
    fs::write(
        root.join("com/acme/Bar.type.json"),
        r#"{"name":"com.acme.Bar","methods":[{"name":"b","visibility":"private"}]}"#,
    )
    .unwrap();
}

pub fn fast_cadence() -> DynamicConfig {
    DynamicConfig {
        config_poll: TaskSettings::every(3_600, 10),
        code_base: TaskSettings::every(60, 10),
        invocation_data: TaskSettings::every(5, 5),
        upload: TaskSettings::every(2, 1),
    }
}

pub struct Fixture {
    pub tmp: TempDir,
    pub config: AgentConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let code_base = tmp.path().join("classes");
        write_code_base(&code_base);
        let config = AgentConfig {
            app_name: "shop".into(),
            app_version: "1.0".into(),
            code_base: vec![code_base],
            packages: vec!["com.acme".into()],
            exchange_dir: tmp.path().join("exchange"),
            tick_period_ms: 1_000,
            shutdown_timeout_secs: 5,
            initial: fast_cadence(),
            ..AgentConfig::default()
        };
        Self { tmp, config }
    }

    pub fn exchange_dir(&self) -> std::path::PathBuf {
        self.config.exchange_dir.clone()
    }

    /// Decoded pending publications, sorted by file name.
    pub fn pending(&self) -> Vec<(String, Publication)> {
        let mut names: Vec<_> = fs::read_dir(self.exchange_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".pending"))
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let bytes = fs::read(self.exchange_dir().join(&name)).unwrap();
                (name, Publication::decode(&bytes).unwrap())
            })
            .collect()
    }
}

/// Always fails, counting attempts.
#[derive(Clone, Default)]
pub struct FailingPoller {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ConfigPoller for FailingPoller {
    async fn poll(&self) -> anyhow::Result<DynamicConfig> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("config service unreachable")
    }
}

/// Records every upload; fails them all when `fail` is set.
#[derive(Clone, Default)]
pub struct MemoryUploader {
    pub uploaded: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub fail: bool,
}

impl MemoryUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl Uploader for MemoryUploader {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("transport down");
        }
        self.uploaded
            .lock()
            .unwrap()
            .push((name.to_string(), bytes.to_vec()));
        Ok(())
    }
}
