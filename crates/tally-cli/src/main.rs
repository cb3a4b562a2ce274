mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::pending::PendingArgs;
use commands::run::RunArgs;
use commands::scan::ScanArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Method-usage telemetry agent")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent until interrupted
    Run(RunArgs),

    /// Scan the code base once and print the resulting model
    Scan(ScanArgs),

    /// Print the fingerprint of the code base
    Fingerprint,

    /// List files waiting in the exchange directory
    Pending(PendingArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Run(args) => commands::run::cmd_run(opts, &args).await,
        Command::Scan(args) => commands::scan::cmd_scan(opts, &args),
        Command::Fingerprint => commands::fingerprint::cmd_fingerprint(opts),
        Command::Pending(args) => commands::pending::cmd_pending(opts, &args),
    }
}
