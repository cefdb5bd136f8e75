//! dupsweep - incremental duplicate file finder
//!
//! Entry point for the CLI application.

use clap::Parser;
use dupsweep::{
    cli::Cli,
    config::ConfigError,
    error::{ExitCode, StructuredError},
    runner::RunError,
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match dupsweep::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = if is_config_error(&err) {
                ExitCode::ConfigError
            } else {
                ExitCode::GeneralError
            };

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}

fn is_config_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConfigError>().is_some()
        || err
            .downcast_ref::<RunError>()
            .is_some_and(|e| matches!(e, RunError::Config(_)))
}
