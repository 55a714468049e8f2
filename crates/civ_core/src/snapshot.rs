//! Read-only views of the game state for the presentation layer.
//!
//! A [`Snapshot`] is a detached copy: holding one never blocks the engine
//! and it never observes a partially applied tick or command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::economy::housing_capacity;
use crate::error::ValidationError;
use crate::ids::{AgeId, BuildingId, PersonKind, ResourceKind, TechId};
use crate::jobs::{JobId, JobKind};
use crate::math::{decimal_serde, option_decimal_serde, Amount, Fixed};
use crate::rules::Ruleset;
use crate::state::GameState;
use crate::tech::validate_research;

/// One resource as seen by the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceView {
    /// Display name.
    pub name: String,
    /// Current stockpile.
    #[serde(with = "decimal_serde")]
    pub amount: Amount,
    /// Storage limit, if any.
    #[serde(with = "option_decimal_serde")]
    pub capacity: Option<Amount>,
    /// Net change applied on the last tick.
    #[serde(with = "decimal_serde")]
    pub rate: Fixed,
}

/// A job in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    /// Job identifier.
    pub id: JobId,
    /// What the job produces.
    pub kind: JobKind,
    /// Ticks left.
    pub remaining: u32,
    /// Total duration.
    pub total: u32,
}

/// One building type with anything owned or under construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingView {
    /// Display name.
    pub name: String,
    /// Completed units.
    pub owned: u32,
    /// Remaining ticks of each unit under construction, in enqueue order.
    pub in_progress: Vec<u32>,
}

/// People of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindView {
    /// Display name.
    pub name: String,
    /// Head count.
    pub total: u32,
    /// Unassigned people of this kind.
    pub idle: u32,
    /// Workers of this kind per resource.
    pub assignments: BTreeMap<ResourceKind, u32>,
}

/// Population summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationView {
    /// Head count.
    pub total: u32,
    /// Unassigned people.
    pub idle: u32,
    /// Housing capacity.
    pub housing: u32,
    /// Workers per resource, all kinds together.
    pub assignments: BTreeMap<ResourceKind, u32>,
    /// Living people per kind.
    pub kinds: BTreeMap<PersonKind, KindView>,
}

/// Immutable, point-in-time view of the whole game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ticks applied so far.
    pub tick: u64,
    /// Current age id.
    pub age: AgeId,
    /// Current age display name.
    pub age_name: String,
    /// Every resource kind.
    pub resources: BTreeMap<ResourceKind, ResourceView>,
    /// Building types that are owned or under construction.
    pub buildings: BTreeMap<BuildingId, BuildingView>,
    /// Every job in flight, in enqueue order.
    pub jobs: Vec<JobView>,
    /// Unlocked techs.
    pub unlocked: Vec<TechId>,
    /// Techs whose research could start right now.
    pub researchable: Vec<TechId>,
    /// People.
    pub population: PopulationView,
}

impl Snapshot {
    /// Capture the state.
    #[must_use]
    pub fn capture(state: &GameState, rules: &Ruleset) -> Self {
        let resources = state
            .resources
            .iter()
            .map(|(kind, entry)| {
                let name = rules
                    .resource(kind.as_str())
                    .map_or_else(|| kind.to_string(), |r| r.name.clone());
                (
                    kind.clone(),
                    ResourceView {
                        name,
                        amount: entry.amount,
                        capacity: entry.capacity,
                        rate: entry.rate,
                    },
                )
            })
            .collect();

        let mut buildings: BTreeMap<BuildingId, BuildingView> = BTreeMap::new();
        for data in rules.buildings().iter() {
            let owned = state.owned(data.id.as_str());
            let in_progress: Vec<u32> = state
                .jobs
                .constructions(data.id.as_str())
                .map(|job| job.remaining)
                .collect();
            if owned > 0 || !in_progress.is_empty() {
                buildings.insert(
                    data.id.clone(),
                    BuildingView {
                        name: data.name.clone(),
                        owned,
                        in_progress,
                    },
                );
            }
        }

        let jobs = state
            .jobs
            .iter()
            .map(|job| JobView {
                id: job.id,
                kind: job.kind.clone(),
                remaining: job.remaining,
                total: job.total,
            })
            .collect();

        let researchable = rules
            .techs()
            .iter()
            .filter(|tech| !state.unlocked.contains(&tech.id))
            .filter(|tech| {
                !matches!(
                    validate_research(state, rules, tech.id.as_str()),
                    Err(ValidationError::PrerequisitesNotMet { .. }
                        | ValidationError::AlreadyResearching(_))
                )
            })
            .map(|tech| tech.id.clone())
            .collect();

        let kinds = state
            .population
            .groups
            .iter()
            .map(|(kind, group)| {
                let name = rules
                    .population()
                    .kind(kind.as_str())
                    .map_or_else(|| kind.to_string(), |k| k.name.clone());
                (
                    kind.clone(),
                    KindView {
                        name,
                        total: group.total,
                        idle: group.idle(),
                        assignments: group.assignments.clone(),
                    },
                )
            })
            .collect();

        let age_name = rules
            .ages()
            .get(state.age.as_str())
            .map_or_else(|| state.age.to_string(), |a| a.name.clone());

        Self {
            tick: state.tick,
            age: state.age.clone(),
            age_name,
            resources,
            buildings,
            jobs,
            unlocked: state.unlocked.iter().cloned().collect(),
            researchable,
            population: PopulationView {
                total: state.population.total(),
                idle: state.population.idle(),
                housing: housing_capacity(state, rules),
                assignments: state.population.assignments(),
                kinds,
            },
        }
    }

    /// Amount of one resource, zero if unknown.
    #[must_use]
    pub fn amount(&self, resource: &str) -> Amount {
        self.resources
            .get(resource)
            .map_or(Fixed::ZERO, |r| r.amount)
    }

    /// Owned count of one building type.
    #[must_use]
    pub fn owned(&self, building: &str) -> u32 {
        self.buildings.get(building).map_or(0, |b| b.owned)
    }

    /// Check if a tech is unlocked.
    #[must_use]
    pub fn is_unlocked(&self, tech: &str) -> bool {
        self.unlocked.iter().any(|t| t.as_str() == tech)
    }
}
