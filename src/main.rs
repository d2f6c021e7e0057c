//! kicad-outputs - build KiCad output artifacts from the command line
//!
//! Main entry point.
//!
//! # Execution Flow
//!
//! 1. Parse arguments ([`Cli`])
//! 2. Initialize logging (console, plus daily log files with `--log-dir`)
//! 3. `--write-config`: write default settings if absent and exit
//! 4. Load `kicad-outputs.yaml` (or `--config`) and apply `KICAD_CLI`
//! 5. Run the [`Pipeline`] on a single-threaded tokio runtime
//! 6. Print the output locations
//!
//! Any error ends the run with a non-zero exit status.

use anyhow::Result;
use clap::Parser;
use kicad_outputs::cli::Cli;
use kicad_outputs::{APP_NAME, OutputSettings, Pipeline, ProcessRunner, ToolLocator, VERSION};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Run failed: {:#}", e);
            eprintln!("\nERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let _guard = kicad_outputs::logging::setup_logging(cli.log_dir.as_deref(), cli.debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = cli.config_manager();

    if cli.write_config {
        let path = config_manager.settings_path();
        if path.exists() {
            println!("Settings file already exists: {}", path);
        } else {
            config_manager.save_settings(&OutputSettings::default())?;
            println!("Wrote default settings to {}", path);
        }
        return Ok(());
    }

    let settings = config_manager.load_with_env()?;
    let run_config = cli.into_run_config()?;

    // Steps run strictly in sequence.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let runner = ProcessRunner::new(settings.command_timeout());
    let locator = ToolLocator::from_env().with_explicit(settings.kicad_cli.clone());
    let pipeline = Pipeline::new(&runner, &locator, &settings);

    let summary = runtime.block_on(pipeline.run(&run_config))?;

    println!("\n{}", summary.report());
    Ok(())
}
