//! Error types for the engine test suite driver
//!
//! These are infrastructure failures only. Outcomes of the engine under test
//! (crashes, timeouts, unexpected passes) are reported as
//! [`TestCaseResult`](crate::TestCaseResult) values, never as errors.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the driver
#[derive(Error, Debug)]
pub enum Error {
    /// The engine binary (or an artifact run directly) could not be started
    #[error("SpawnError: failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error (pipes, temporary files, config files)
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A runner config file could not be parsed
    #[error("ConfigError: {0}")]
    Config(String),

    /// A required engine executable is missing from the binary directory
    #[error("MissingBinary: {} not found", .0.display())]
    MissingBinary(PathBuf),

    /// An invocation was built with an empty argument vector
    #[error("InvalidArgs: {0}")]
    InvalidArgs(String),
}

impl Error {
    /// Create a spawn error for the given program
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Error::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, Error>;
