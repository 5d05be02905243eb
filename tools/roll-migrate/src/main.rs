//! roll-migrate - one-shot conversion of legacy message rules
//!
//! Rewrites `message.cond_messages` in a bot settings file into
//! `message.rules` records, in place.

mod migrate;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::*;

use crate::migrate::migrate_settings_file;

#[derive(Parser, Debug)]
#[command(author, version, about = "Migrate legacy message rules in a bot settings file")]
struct Cli {
    /// Settings file to migrate in place
    settings_file: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .init();

    match migrate_settings_file(&cli.settings_file) {
        Ok(true) => {
            println!(
                "{} Migrated legacy rules in '{}'",
                "OK".green(),
                cli.settings_file.display()
            );
            ExitCode::SUCCESS
        },
        Ok(false) => {
            println!("No legacy rules found; no changes were made.");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("{} {}", "ERROR".red(), e);
            ExitCode::FAILURE
        },
    }
}
