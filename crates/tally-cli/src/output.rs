use anyhow::Result;
use serde::Serialize;

use crate::opts::GlobalOpts;

/// Command results go to stdout as JSON; logs go to stderr.
pub fn print_json(opts: &GlobalOpts, value: &impl Serialize) -> Result<()> {
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
