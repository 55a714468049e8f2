//! # Civ CLI
//!
//! Terminal front end for the civilization idle game:
//!
//! - **Interactive play**: a background ticker advances the game in real
//!   time while the player types commands
//! - **JSON protocol**: scripted or AI control over stdin/stdout, with time
//!   driven by the controller
//! - **Headless simulation**: deterministic runs from a script file
//! - **Content validation**: check RON content files before playing them
//!
//! Logs always go to stderr so stdout stays clean for the game and the
//! protocol.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod display;
pub mod error;
pub mod protocol;
pub mod session;
pub mod simulate;
pub mod validate;

pub use config::{CliConfig, ConfigError, Overrides};
pub use display::{DisplaySink, TextDisplay};
pub use error::CliError;
pub use protocol::{ProtocolRunner, Request, Response};
pub use session::Session;
pub use simulate::{parse_script, run_simulation, SimulationReport};
pub use validate::{validate_content, validate_content_file, ContentSummary};
