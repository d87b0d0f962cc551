use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "csv2thesis", about = "Thesis Manager CSV import CLI")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile and import a CSV file into the Thesis Manager.
    Import {
        csv_file: String,
        /// Thesis Manager URL (defaults to THESIS_MANAGER_URL).
        #[arg(long)]
        url: Option<String>,
        /// API token (defaults to THESIS_MANAGER_API_TOKEN).
        #[arg(long)]
        token: Option<String>,
        /// Resolve everything automatically instead of prompting.
        #[arg(long, default_value_t = false)]
        non_interactive: bool,
        /// Run the full reconciliation without writing to the remote.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// First data row to process (as reported in the run summary).
        #[arg(long, default_value_t = 1)]
        start_from: usize,
        /// Minimum name similarity for match suggestions.
        #[arg(long)]
        threshold: Option<f64>,
        /// Write the machine-readable run summary to this file.
        #[arg(long)]
        summary_json: Option<String>,
    },
    /// Parse a CSV file and print the extracted drafts without importing.
    Extract { csv_file: String },
}
