mod commands;
mod logging;
mod progress;
mod report;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::atomic::AtomicBool;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use pixel_duper_core::{AppConfig, ScanEngine};
use progress::CliReporter;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match pixel_duper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Scan { csv }) => {
            if let Err(err) = run_scan(&config, csv.as_deref()) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::CountStore) => {
            info!("Counting fingerprint store records...");
            match ScanEngine::new(config).count_store() {
                Ok(count) => info!("Total records in fingerprint store: {}", count),
                Err(e) => error!("Error counting store records: {}", e),
            }
        }
        Some(Commands::ClearStore) => {
            let engine = ScanEngine::new(config);
            let store = engine.store_path().display().to_string();
            match prompt_confirm(&format!("Delete the fingerprint store {}?", store), false) {
                Ok(true) => match engine.clear_store() {
                    Ok(true) => println!("Fingerprint store {} deleted", store),
                    Ok(false) => println!("No fingerprint store at {}", store),
                    Err(e) => error!("Error deleting fingerprint store {}: {}", store, e),
                },
                _ => {
                    process::exit(0);
                }
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_scan(config: &AppConfig, csv: Option<&Path>) -> anyhow::Result<()> {
    let engine = ScanEngine::new(config.clone());
    let reporter = CliReporter::new();
    let cancel = AtomicBool::new(false);
    let result = engine.scan(&reporter, &cancel)?;

    println!();
    report::print_results(&result.results);
    println!();
    info!(
        "Load: {}, Scan: {}, Fingerprint: {}, Compare: {}, Save: {}",
        format!("{:.2}s", result.load_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.fill_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.compare_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.save_duration.as_secs_f64()).green(),
    );
    info!(
        "{} images, {} from store, {} decoded, {} unreadable",
        format!("{}", result.files_visited).cyan(),
        format!("{}", result.cache_hits).cyan(),
        format!("{}", result.decoded).cyan(),
        format!("{}", result.failed).cyan(),
    );
    info!(
        "{} duplicate pairs, {} defective images",
        format!("{}", result.duplicate_count()).red(),
        format!("{}", result.defect_count()).red(),
    );

    if let Some(file) = csv {
        let rows = report::write_csv(file, &result.results)?;
        info!("Wrote {} results to {}", rows, file.display());
    }

    Ok(())
}

/// Ask a yes/no question on stdin. An empty answer or end of input picks
/// `default`.
fn prompt_confirm(question: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    let stdin = io::stdin();
    let mut answer = String::new();
    loop {
        print!("{} [{}] ", question, hint);
        io::stdout().flush()?;
        answer.clear();
        if stdin.read_line(&mut answer)? == 0 {
            return Ok(default);
        }
        if let Some(choice) = parse_answer(&answer, default) {
            return Ok(choice);
        }
        println!("Please answer yes or no.");
    }
}

fn parse_answer(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
