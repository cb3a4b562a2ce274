//! `tally fingerprint` command.

use anyhow::Result;
use serde_json::json;

use crate::opts::{GlobalOpts, load_config};
use crate::output::print_json;

use super::{code_base, setup_logging};

pub fn cmd_fingerprint(opts: &GlobalOpts) -> Result<()> {
    setup_logging("warn");
    let config = load_config(opts)?;
    let fingerprint = code_base(&config)?.fingerprint()?;
    print_json(
        opts,
        &json!({
            "count": fingerprint.count,
            "total_size": fingerprint.total_size,
            "max_modified_millis": fingerprint.max_modified_millis,
            "content_hash": fingerprint.content_hash(),
        }),
    )
}
