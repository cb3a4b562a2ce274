pub mod fingerprint;
pub mod pending;
pub mod run;
pub mod scan;

use tally_agent::AgentConfig;
use tally_core::{CodeBase, ScanError};
use tracing_subscriber::EnvFilter;

/// Logs to stderr; `RUST_LOG` overrides `default_level`.
pub fn setup_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}

pub fn code_base(config: &AgentConfig) -> Result<CodeBase, ScanError> {
    CodeBase::new(config.code_base.clone(), &config.include)
}
