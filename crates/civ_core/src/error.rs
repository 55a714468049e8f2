//! Error types for the game simulation.

use thiserror::Error;

use crate::command::ParseError;
use crate::data::ContentError;
use crate::ids::{AgeId, BuildingId, PersonKind, ResourceKind, TechId};
use crate::math::Amount;
use crate::save::PersistenceError;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Why a command was rejected.
///
/// Produced by pure validation against the current state. A command that
/// fails validation never mutates anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No building, tech, resource or kind of person with this id exists in
    /// the content.
    #[error("Unknown type: {id}")]
    UnknownType {
        /// The id that was looked up.
        id: String,
    },

    /// The building requires a tech that is not unlocked yet.
    #[error("{building} requires {tech} to be researched first")]
    LockedByTech {
        /// Building that was requested.
        building: BuildingId,
        /// Tech that gates it.
        tech: TechId,
    },

    /// Not enough of some cost resource.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource that is short.
        resource: ResourceKind,
        /// Amount required.
        required: Amount,
        /// Amount available.
        available: Amount,
    },

    /// The tech is already unlocked.
    #[error("{0} is already researched")]
    AlreadyUnlocked(TechId),

    /// Some prerequisite tech or age has not been reached.
    #[error("Prerequisites not met for {tech}: missing {}", missing.join(", "))]
    PrerequisitesNotMet {
        /// Tech that was requested.
        tech: TechId,
        /// Missing prerequisite tech ids or age ids.
        missing: Vec<String>,
    },

    /// A research job for this tech is already in progress.
    #[error("{0} is already being researched")]
    AlreadyResearching(TechId),

    /// The requested population allocation is not possible.
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// This kind of person cannot be recruited before an age is reached.
    #[error("{kind} cannot be recruited before the {age} age")]
    KindLocked {
        /// Kind that was requested.
        kind: PersonKind,
        /// Age that gates it.
        age: AgeId,
    },

    /// Not enough housing for the requested recruits.
    #[error("Not enough housing: {requested} requested, capacity {capacity}")]
    HousingFull {
        /// Population after recruiting.
        requested: u32,
        /// Housing capacity.
        capacity: u32,
    },
}

/// A broken engine invariant.
///
/// These are bugs, not player mistakes. The tick or command that produced
/// one is aborted and the previous state is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A resource amount went below zero.
    #[error("Resource {resource} is negative: {amount}")]
    NegativeAmount {
        /// Offending resource.
        resource: ResourceKind,
        /// Observed amount.
        amount: Amount,
    },

    /// A resource amount exceeds its capacity.
    #[error("Resource {resource} exceeds capacity: {amount} > {capacity}")]
    AboveCapacity {
        /// Offending resource.
        resource: ResourceKind,
        /// Observed amount.
        amount: Amount,
        /// Capacity at the time of the check.
        capacity: Amount,
    },

    /// A resource kind appeared that the content never defined.
    #[error("Resource {0} is not part of the content")]
    UnknownResource(ResourceKind),

    /// A population group is of a kind the content does not define.
    #[error("Population kind {0} is not part of the content")]
    UnknownPersonKind(PersonKind),

    /// More workers are assigned than exist.
    #[error("Population over-allocated: {assigned} assigned of {total}")]
    OverAllocated {
        /// Workers assigned to resources.
        assigned: u32,
        /// Total population.
        total: u32,
    },

    /// A building count refers to a type the content does not define.
    #[error("Owned building {0} is not part of the content")]
    UnknownBuilding(BuildingId),

    /// An unlocked tech is not part of the content.
    #[error("Unlocked tech {0} is not part of the content")]
    UnknownTech(TechId),

    /// A tech was unlocked and later found missing.
    #[error("Tech {0} was re-locked")]
    Relocked(TechId),

    /// A job has zero remaining ticks but was not completed.
    #[error("Job {0} is stalled at zero remaining ticks")]
    StalledJob(u64),
}

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Content data failed validation.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Command text could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A command was rejected.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// Saving or loading failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// An engine invariant was broken.
    #[error("Internal invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InsufficientResources {
            resource: ResourceKind::from("wood"),
            required: Fixed::from_num(50),
            available: Fixed::from_num(10),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient resources: need 50 wood, have 10"
        );

        let err = ValidationError::PrerequisitesNotMet {
            tech: TechId::from("mathematics"),
            missing: vec!["writing".to_string(), "bronze_age".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Prerequisites not met for mathematics: missing writing, bronze_age"
        );
    }

    #[test]
    fn test_invariant_wraps_into_game_error() {
        let err: GameError = InvariantViolation::OverAllocated {
            assigned: 4,
            total: 3,
        }
        .into();
        assert!(err.to_string().starts_with("Internal invariant violation"));
    }
}
