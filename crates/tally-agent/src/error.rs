use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot parse config file {path:?}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("exchange error: {0}")]
    Exchange(#[from] tally_exchange::ExchangeError),
    #[error("scan error: {0}")]
    Scan(#[from] tally_core::ScanError),
    #[error("flush error: {0}")]
    Flush(#[from] tally_core::FlushError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_cbor::Error),
    #[error("config poll failed: {0:#}")]
    Poll(anyhow::Error),
    #[error("upload of '{name}' failed: {error:#}")]
    Upload { name: String, error: anyhow::Error },
    #[error("agent did not stop within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("agent task failed: {0}")]
    Join(String),
}
