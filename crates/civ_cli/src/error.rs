//! Error types for the command line front end.

use thiserror::Error;

use civ_core::data::ContentError;
use civ_core::error::GameError;
use civ_core::save::PersistenceError;

use crate::config::ConfigError;

/// Anything that can stop the front end.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Content failed to load or validate.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Saving or loading failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The engine reported an error.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Terminal or file IO failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A simulation script line could not be understood.
    #[error("Script line {line}: {message}")]
    Script {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// The background ticker stopped on an internal error.
    #[error("Simulation halted: {0}")]
    Halted(String),
}
