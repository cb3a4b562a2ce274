//! `tally run` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tally_agent::{
    Agent,
    adapters::{FileConfigPoller, OutboxUploader},
};
use tracing::info;

use crate::opts::{GlobalOpts, load_config};

use super::setup_logging;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Copy published files into this directory, acting as the upload target
    #[arg(long)]
    pub outbox: Option<PathBuf>,

    /// Re-read task cadence from this JSON file on every config poll
    #[arg(long = "dynamic-config")]
    pub dynamic_config: Option<PathBuf>,
}

pub async fn cmd_run(opts: &GlobalOpts, args: &RunArgs) -> Result<()> {
    setup_logging("info");
    let config = load_config(opts)?;

    let mut agent = Agent::new(config)?;
    if let Some(path) = &args.dynamic_config {
        agent = agent.with_poller(FileConfigPoller::new(path));
    }
    if let Some(dir) = &args.outbox {
        agent = agent.with_uploader(OutboxUploader::new(dir));
    }
    let handle = agent.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("wait for interrupt")?;
    info!("interrupted; flushing");
    let stats = handle.shutdown().await?;
    info!(
        ticks = stats.ticks,
        polls = stats.polls,
        code_base_publications = stats.code_base_publications,
        invocation_publications = stats.invocation_publications,
        uploaded_files = stats.uploaded_files,
        "done"
    );
    Ok(())
}
