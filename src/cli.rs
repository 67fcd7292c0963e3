use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "crypto-collector")]
#[command(about = "Batched multi-currency CoinMarketCap collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect latest quotes for every configured symbol and currency
    Prices,
    /// Collect the global market snapshot
    Global,
    /// Run both collections and write a pipeline execution record
    Pipeline,
    /// Delete output files older than the retention period
    Cleanup {
        /// Maximum file age in days (default: configured retention)
        #[arg(short, long)]
        days: Option<u64>,

        /// File name pattern, `*` and `?` wildcards
        #[arg(short, long, default_value = "*.json")]
        pattern: String,

        /// Clean the processed directory instead of raw
        #[arg(long)]
        processed: bool,
    },
    /// Validate and print the configuration
    Config,
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Prices => {
            commands::collect::run(commands::collect::Target::Prices);
        }
        Commands::Global => {
            commands::collect::run(commands::collect::Target::Global);
        }
        Commands::Pipeline => {
            commands::collect::run(commands::collect::Target::Pipeline);
        }
        Commands::Cleanup { days, pattern, processed } => {
            commands::cleanup::run(days, pattern, processed);
        }
        Commands::Config => {
            commands::config::run();
        }
    }
}
