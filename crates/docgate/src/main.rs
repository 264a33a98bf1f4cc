//! docgate entry point.

use std::process::ExitCode;

use docgate::{load_config, run, Invocation, USAGE, VERSION};
use docgate_telemetry::init_telemetry;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = match Invocation::parse(std::env::args().skip(1)) {
        Ok(Invocation::Run { config }) => config,
        Ok(Invocation::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Version) => {
            println!("docgate {VERSION}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("docgate: {err}");
            eprintln!("Use --help for usage information");
            return ExitCode::FAILURE;
        }
    };

    // Logging is configured by the file, so errors before this point go to stderr.
    let config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("docgate: invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_telemetry(&config.telemetry.telemetry_config()) {
        eprintln!("docgate: {err}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "docgate exited with an error");
            ExitCode::FAILURE
        }
    }
}
