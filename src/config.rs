//! Server Configuration
//!
//! Command-line parsing for the `clonekv` binary. Parsing never exits the
//! process; it returns a [`CliAction`] or a [`ConfigError`] and `main`
//! decides what to do.

use crate::{DEFAULT_HOST, DEFAULT_PORT};
use thiserror::Error;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(Config),
    Help,
    Version,
}

/// Errors from command-line parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

impl Config {
    /// Parses arguments, excluding the program name.
    ///
    /// # Example
    ///
    /// ```
    /// use clonekv::config::{CliAction, Config};
    ///
    /// let args = ["--port", "6380"].map(String::from);
    /// match Config::from_args(args).unwrap() {
    ///     CliAction::Run(config) => assert_eq!(config.bind_address(), "127.0.0.1:6380"),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn from_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = args.next().ok_or(ConfigError::MissingValue("--host"))?;
                }
                "--port" | "-p" => {
                    let raw = args.next().ok_or(ConfigError::MissingValue("--port"))?;
                    config.port = raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?;
                }
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(CliAction::Run(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
