//! # Civ Core
//!
//! Deterministic simulation core for a terminal civilization idle game.
//!
//! This crate contains **only** the game rules and state:
//! - No rendering
//! - No terminal IO
//! - No randomness
//! - No floating-point math (uses fixed-point)
//!
//! The same content, starting state and command sequence always produce a
//! bit-identical state, which is what makes offline catch-up and the
//! determinism tests possible.
//!
//! ## Crate Structure
//!
//! - [`data`] - Content definitions loaded from RON
//! - [`rules`] - Validated, indexed content
//! - [`state`] - The aggregate game state
//! - [`engine`] - Tick loop, command submission, transactions
//! - [`resources`], [`buildings`], [`tech`], [`ages`], [`population`],
//!   [`economy`], [`jobs`] - Subsystems
//! - [`command`] - Command parsing and application
//! - [`snapshot`] - Read-only views for the front end
//! - [`save`] - Save files
//! - [`clock`] - Wall-clock to tick conversion
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ages;
pub mod buildings;
pub mod clock;
pub mod command;
pub mod data;
pub mod economy;
pub mod engine;
pub mod error;
pub mod ids;
pub mod jobs;
pub mod math;
pub mod population;
pub mod resources;
pub mod rules;
pub mod save;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod tech;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::Clock;
    pub use crate::command::{parse_command, Command, CommandError, CommandOutcome, ParseError};
    pub use crate::data::{ContentData, ContentError};
    pub use crate::engine::{CatchUpReport, GameEngine, LoadOutcome, SharedEngine, TickEvents};
    pub use crate::error::{GameError, InvariantViolation, Result, ValidationError};
    pub use crate::ids::{AgeId, BuildingId, PersonKind, ResourceKind, TechId};
    pub use crate::math::{Amount, Fixed};
    pub use crate::resources::ResourceBundle;
    pub use crate::rules::Ruleset;
    pub use crate::save::{list_saves, save_path, PersistenceError, SaveGame, SaveSummary};
    pub use crate::snapshot::Snapshot;
    pub use crate::state::GameState;
}
