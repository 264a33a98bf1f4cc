//! Command-line arguments.

use std::path::PathBuf;
use thiserror::Error;

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Start the gateway, optionally with a configuration file.
    Run {
        /// `--config <PATH>`
        config: Option<PathBuf>,
    },
    /// `--help`
    Help,
    /// `--version`
    Version,
}

/// An argument the binary does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ArgsError(pub String);

impl Invocation {
    /// Parses arguments, not including the program name.
    pub fn parse<I>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => match args.next() {
                    Some(path) => config = Some(PathBuf::from(path)),
                    None => return Err(ArgsError(format!("{arg} needs a path"))),
                },
                "--help" | "-h" => return Ok(Self::Help),
                "--version" | "-V" => return Ok(Self::Version),
                other => return Err(ArgsError(format!("unknown argument: {other}"))),
            }
        }

        Ok(Self::Run { config })
    }
}

/// Usage text for `--help`.
pub const USAGE: &str = "\
docgate - HTTP gateway for organization-scoped document CRUD

USAGE:
    docgate [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON)
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    DOCGATE__SERVER__HTTP_ADDR       Listen address (default: 0.0.0.0:8080)
    DOCGATE__STORE__URI              Store URI: memory://, mongodb://, mongodb+srv://
    DOCGATE__IDENTITY__SECRET_KEY    Identity provider secret key
    DOCGATE__<SECTION>__<KEY>        Any other setting
    MONGO_URI                        Store URI when none is configured
    CLERK_SECRET_KEY                 Secret key when none is configured
    RUST_LOG                         Log filter, overrides telemetry.logging.level

A .env file in the working directory is read at start-up.
";
