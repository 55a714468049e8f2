//! The aggregate game state.
//!
//! [`GameState`] owns everything that changes during play. Only the engine
//! holds a mutable reference to the committed state; tick and command
//! application operate on a working copy handed to the subsystems for the
//! duration of one call.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{GameError, InvariantViolation, Result};
use crate::ids::{AgeId, BuildingId, TechId};
use crate::jobs::{JobKind, JobQueue};
use crate::population::Population;
use crate::resources::ResourceLedger;
use crate::rules::Ruleset;
use crate::stats::GameStats;

/// Everything that changes during a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Ticks applied since the game started.
    pub tick: u64,
    /// Stockpiles, capacities and rates.
    pub resources: ResourceLedger,
    /// Completed buildings per type. Zero counts are not stored.
    pub buildings: BTreeMap<BuildingId, u32>,
    /// Construction and research in flight.
    pub jobs: JobQueue,
    /// Unlocked techs. Only ever grows.
    pub unlocked: BTreeSet<TechId>,
    /// People and their assignments.
    pub population: Population,
    /// Current age.
    pub age: AgeId,
    /// Lifetime statistics.
    pub stats: GameStats,
}

impl GameState {
    /// Fresh state for a new game.
    #[must_use]
    pub fn new(rules: &Ruleset) -> Self {
        let age = rules
            .ages()
            .first()
            .map(|a| a.id.clone())
            .unwrap_or_else(|| AgeId::from(""));

        Self {
            tick: 0,
            resources: ResourceLedger::from_content(&rules.content().resources),
            buildings: BTreeMap::new(),
            jobs: JobQueue::new(),
            unlocked: BTreeSet::new(),
            population: Population::from_content(&rules.population().kinds),
            age,
            stats: GameStats::new(),
        }
    }

    /// Completed units of a building type.
    #[must_use]
    pub fn owned(&self, building: &str) -> u32 {
        self.buildings.get(building).copied().unwrap_or(0)
    }

    /// Check if a tech is unlocked.
    #[must_use]
    pub fn is_unlocked(&self, tech: &str) -> bool {
        self.unlocked.contains(tech)
    }

    /// Verify every engine invariant against the ruleset.
    pub fn check_invariants(&self, rules: &Ruleset) -> std::result::Result<(), InvariantViolation> {
        self.resources.check_invariants()?;

        for (kind, _) in self.resources.iter() {
            if rules.resource(kind.as_str()).is_none() {
                return Err(InvariantViolation::UnknownResource(kind.clone()));
            }
        }
        for resource in rules.resources() {
            if self.resources.get(resource.id.as_str()).is_none() {
                return Err(InvariantViolation::UnknownResource(resource.id.clone()));
            }
        }

        for (kind, group) in &self.population.groups {
            if rules.population().kind(kind.as_str()).is_none() {
                return Err(InvariantViolation::UnknownPersonKind(kind.clone()));
            }
            for resource in group.assignments.keys() {
                if rules.resource(resource.as_str()).is_none() {
                    return Err(InvariantViolation::UnknownResource(resource.clone()));
                }
            }
        }
        self.population.check_invariants()?;

        for building in self.buildings.keys() {
            if !rules.buildings().contains(building.as_str()) {
                return Err(InvariantViolation::UnknownBuilding(building.clone()));
            }
        }
        for tech in &self.unlocked {
            if !rules.techs().contains(tech.as_str()) {
                return Err(InvariantViolation::UnknownTech(tech.clone()));
            }
        }
        for job in self.jobs.iter() {
            match &job.kind {
                JobKind::Construction(id) if !rules.buildings().contains(id.as_str()) => {
                    return Err(InvariantViolation::UnknownBuilding(id.clone()));
                }
                JobKind::Research(id) if !rules.techs().contains(id.as_str()) => {
                    return Err(InvariantViolation::UnknownTech(id.clone()));
                }
                _ => {}
            }
        }
        self.jobs.check_invariants()?;

        Ok(())
    }

    /// Verify that nothing unlocked in `previous` has been lost.
    pub fn check_monotonic(&self, previous: &Self) -> std::result::Result<(), InvariantViolation> {
        match previous.unlocked.difference(&self.unlocked).next() {
            Some(tech) => Err(InvariantViolation::Relocked(tech.clone())),
            None => Ok(()),
        }
    }

    /// Check that a state read from disk fits the ruleset.
    ///
    /// Returns a description of the first mismatch.
    pub fn check_compatible(&self, rules: &Ruleset) -> std::result::Result<(), String> {
        if rules.ages().index_of(self.age.as_str()).is_none() {
            return Err(format!("unknown age '{}'", self.age));
        }
        self.check_invariants(rules).map_err(|e| e.to_string())
    }

    /// Canonical binary encoding.
    ///
    /// Two states are equal exactly when their encodings are equal.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize state: {e}")))
    }

    /// Decode a state produced by [`GameState::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize state: {e}")))
    }

    /// Hash of the canonical encoding, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.to_bytes() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => self.tick.hash(&mut hasher),
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    fn rules() -> Ruleset {
        Ruleset::classic().unwrap()
    }

    #[test]
    fn test_new_state() {
        let rules = rules();
        let state = GameState::new(&rules);
        assert_eq!(state.tick, 0);
        assert_eq!(state.age.as_str(), "stone");
        assert_eq!(state.population.total(), 1);
        assert_eq!(state.population.count("villager"), 1);
        assert_eq!(state.resources.amount("food"), Fixed::from_num(20));
        assert_eq!(state.resources.amount("wood"), Fixed::from_num(15));
        assert_eq!(state.resources.len(), 6);
        assert!(state.check_invariants(&rules).is_ok());
    }

    #[test]
    fn test_bytes_round_trip() {
        let rules = rules();
        let mut state = GameState::new(&rules);
        state.buildings.insert("hut".into(), 2);
        state.unlocked.insert("agriculture".into());

        let bytes = state.to_bytes().unwrap();
        let restored = GameState::from_bytes(&bytes).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.state_hash(), state.state_hash());
    }

    #[test]
    fn test_hash_changes_with_state() {
        let rules = rules();
        let a = GameState::new(&rules);
        let mut b = a.clone();
        b.tick = 1;
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_unknown_building_violates_invariants() {
        let rules = rules();
        let mut state = GameState::new(&rules);
        state.buildings.insert("castle".into(), 1);
        assert_eq!(
            state.check_invariants(&rules),
            Err(InvariantViolation::UnknownBuilding("castle".into()))
        );
    }

    #[test]
    fn test_unknown_person_kind_violates_invariants() {
        let rules = rules();
        let mut state = GameState::new(&rules);
        state
            .population
            .groups
            .insert("noble".into(), crate::population::Group::new(1));
        assert_eq!(
            state.check_invariants(&rules),
            Err(InvariantViolation::UnknownPersonKind("noble".into()))
        );
    }

    #[test]
    fn test_relock_detected() {
        let rules = rules();
        let mut before = GameState::new(&rules);
        before.unlocked.insert("writing".into());
        let after = GameState::new(&rules);
        assert_eq!(
            after.check_monotonic(&before),
            Err(InvariantViolation::Relocked("writing".into()))
        );
        assert!(before.check_monotonic(&after).is_ok());
    }

    #[test]
    fn test_compatibility_rejects_unknown_age() {
        let rules = rules();
        let mut state = GameState::new(&rules);
        state.age = AgeId::from("space");
        assert!(state.check_compatible(&rules).is_err());
    }
}
