//! `tally pending` command.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};
use tally_core::{Payload, Publication, publication::ALL_PATTERN};
use tally_exchange::ExchangeDir;

use crate::opts::{GlobalOpts, load_config};
use crate::output::print_json;

use super::setup_logging;

#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Only files whose stem matches this glob
    #[arg(long, default_value = ALL_PATTERN)]
    pub pattern: String,

    /// Decode each file and print its header
    #[arg(long)]
    pub decode: bool,
}

pub fn cmd_pending(opts: &GlobalOpts, args: &PendingArgs) -> Result<()> {
    setup_logging("warn");
    let config = load_config(opts)?;
    let exchange = ExchangeDir::open(&config.exchange_dir)?;

    let mut entries = Vec::new();
    for path in exchange.list_pending(&args.pattern)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !args.decode {
            entries.push(Value::String(name));
            continue;
        }
        let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let publication =
            Publication::decode(&bytes).with_context(|| format!("decode {}", path.display()))?;
        let (kind, size) = match &publication.payload {
            Payload::CodeBase(model) => ("codebase", model.tracked.len()),
            Payload::InvocationData(data) => ("invocations", data.invocations.len()),
        };
        entries.push(json!({
            "name": name,
            "kind": kind,
            "signatures": size,
            "app": publication.header.app.app_name,
            "sequence": publication.header.sequence,
            "published_at_millis": publication.header.published_at_millis,
        }));
    }
    print_json(opts, &entries)
}
