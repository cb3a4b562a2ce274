//! Global CLI options and config resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tally_agent::AgentConfig;

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Agent config file (env: TALLY_CONFIG); without one, config comes from TALLY_* variables
    #[arg(short = 'c', long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,
}

pub fn load_config(opts: &GlobalOpts) -> Result<AgentConfig> {
    match &opts.config {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("load config {}", path.display())),
        None => Ok(AgentConfig::from_env()),
    }
}
