#![allow(dead_code)]
#[macro_use]
mod errors;
mod command;
mod meta;
mod repl;
mod session;
mod sql;
mod storage;

use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "simpledb",
    version = VERSION,
    about = "Single-table disk-backed database."
)]
struct Cli {
    /// Path to the database file. Created on first use.
    #[arg(env = "SIMPLEDB_FILE")]
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    if let Ok(file) = OpenOptions::new()
        .append(true)
        .create(true)
        .open("simpledb.log")
    {
        let _ = tracing_subscriber::fmt()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .try_init();
    }

    let cli = Cli::parse();
    let Some(file) = cli.file else {
        println!("No database filename supplied.");
        return ExitCode::FAILURE;
    };

    match repl::start(&file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
