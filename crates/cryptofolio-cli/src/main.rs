mod cli;
mod commands;
mod error;
mod output;
mod telemetry;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    telemetry::init_logging(&cli.log_level, cli.log_format)?;

    let result = commands::run(&cli).await?;
    output::render(&result, cli.format, cli.pretty)?;

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    if result.degraded {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
