//! CLI binary for `cadence`.
//!
//! This binary is a thin wrapper that parses arguments and delegates to the library.

use std::process::ExitCode;

use cadence::cli::{run, Cli};
use cadence::config::EngineConfig;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = EngineConfig::load_from(&cli.dir)
        .ok()
        .flatten()
        .map_or_else(|| "info".to_string(), |config| config.log_level);
    cadence::logging::init(&level);

    let output = run(cli).await;

    for msg in output.stdout {
        println!("{msg}");
    }
    for msg in output.stderr {
        eprintln!("{msg}");
    }

    output.exit_code
}
