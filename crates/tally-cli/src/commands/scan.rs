//! `tally scan` command.

use anyhow::Result;
use clap::Args;
use serde_json::json;
use tally_core::{MethodFilter, ScanScope, SignatureResolver};

use crate::opts::{GlobalOpts, load_config};
use crate::output::print_json;

use super::{code_base, setup_logging};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Print the whole model instead of a summary
    #[arg(long)]
    pub full: bool,
}

pub fn cmd_scan(opts: &GlobalOpts, args: &ScanArgs) -> Result<()> {
    setup_logging("warn");
    let config = load_config(opts)?;

    let scope = ScanScope::new(&config.packages, &config.exclude_packages)?;
    let filter = MethodFilter::parse(&config.method_visibility)
        .with_trivial_accessors(config.include_trivial_accessors);
    let model = SignatureResolver::new(scope, filter).scan(&code_base(&config)?)?;

    if args.full {
        return print_json(opts, &model);
    }
    print_json(
        opts,
        &json!({
            "fingerprint": model.fingerprint.content_hash(),
            "files": model.fingerprint.count,
            "classes": model.num_classes,
            "tracked": model.tracked.len(),
            "excluded": model.excluded.len(),
            "overrides": model.overrides.len(),
        }),
    )
}
