mod batch;
mod cli;
mod config;
mod extract;
mod import;
mod logging;
mod policy;
mod reader;
mod resolve;
mod sink;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    match cli.command {
        Command::Import {
            csv_file,
            url,
            token,
            non_interactive,
            dry_run,
            start_from,
            threshold,
            summary_json,
        } => import::run(import::ImportArgs {
            csv_file,
            url,
            token,
            non_interactive,
            dry_run,
            start_from,
            threshold,
            summary_json,
        }),
        Command::Extract { csv_file } => extract::run(csv_file),
    }
}
