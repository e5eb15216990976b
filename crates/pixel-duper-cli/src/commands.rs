use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pixel-duper")]
#[command(about = "Find duplicate and defective images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fingerprint the configured paths and report duplicates and defects
    Scan {
        /// Also write the results to this CSV file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
    /// Display the number of records in the fingerprint store
    CountStore,
    /// Delete the fingerprint store
    ClearStore,
    /// Print configuration values
    PrintConfig,
}
