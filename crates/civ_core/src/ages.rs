//! Age progression.
//!
//! Ages form a fixed, ordered track. After jobs complete on each tick the
//! engine checks the requirements of the next age; when they are met the
//! settlement advances by exactly one step. Ages never regress.

use crate::data::AgeData;
use crate::ids::AgeId;
use crate::state::GameState;

/// The ordered list of ages.
#[derive(Debug, Clone, Default)]
pub struct AgeTrack {
    ages: Vec<AgeData>,
}

impl AgeTrack {
    /// Create a track from ages in order.
    #[must_use]
    pub fn new(ages: Vec<AgeData>) -> Self {
        Self { ages }
    }

    /// The starting age, if the track is non-empty.
    #[must_use]
    pub fn first(&self) -> Option<&AgeData> {
        self.ages.first()
    }

    /// Position of an age on the track.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ages.iter().position(|a| a.id.as_str() == id)
    }

    /// Get an age by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AgeData> {
        self.ages.iter().find(|a| a.id.as_str() == id)
    }

    /// The age after `current`, if any.
    #[must_use]
    pub fn next_after(&self, current: &str) -> Option<&AgeData> {
        self.index_of(current).and_then(|i| self.ages.get(i + 1))
    }

    /// All ages in order.
    pub fn iter(&self) -> impl Iterator<Item = &AgeData> {
        self.ages.iter()
    }

    /// Number of ages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ages.len()
    }

    /// Check if the track is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    /// Whether `current` is at or past `required`.
    #[must_use]
    pub fn is_reached(&self, required: &str, current: &str) -> bool {
        match (self.index_of(required), self.index_of(current)) {
            (Some(required), Some(current)) => current >= required,
            _ => false,
        }
    }
}

/// Whether the state satisfies the requirements of `age`.
#[must_use]
pub fn requirements_met(age: &AgeData, state: &GameState) -> bool {
    let resources_met = age
        .requirements
        .resources
        .iter()
        .all(|(kind, required)| state.resources.amount(kind.as_str()) >= *required);
    let buildings_met = age
        .requirements
        .buildings
        .iter()
        .all(|(building, required)| state.owned(building.as_str()) >= *required);
    resources_met && buildings_met
}

/// Advance one age if the next one's requirements are met.
///
/// Requirements are thresholds, nothing is consumed.
pub fn check_advancement(state: &mut GameState, track: &AgeTrack) -> Option<AgeId> {
    let next = track.next_after(state.age.as_str())?;
    if !requirements_met(next, state) {
        return None;
    }
    state.age = next.id.clone();
    Some(next.id.clone())
}
