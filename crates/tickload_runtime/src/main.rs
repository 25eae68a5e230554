//! tickload Runtime
//!
//! Loads the configured assets through a background dispatcher, builds the
//! configured atlases and reports what happened.
//!
//! Run with: cargo run -p tickload_runtime -- [--config <path>] [--json] [assets...]
//!       or: cargo run --bin tickload

mod config;
mod startup;

use std::process::ExitCode;

use config::{CliArgs, RuntimeConfig};

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every startup asset loaded
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = CliArgs::parse(std::env::args().skip(1))?;
    let config = RuntimeConfig::load(&cli)?;
    config.print_summary();

    let manager = startup::build_manager(&config);
    manager.start_dispatcher()?;
    let report = startup::preload(&manager, &config);
    manager.stop_dispatcher();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }

    manager.release();
    Ok(report.is_success())
}
