//! Building registry and construction.
//!
//! Construction follows a commit-then-decrement pattern: a successful
//! build command deducts the full cost and enqueues a job; the job loses a
//! tick each simulation tick and, on reaching zero, becomes one owned unit.
//! A building only contributes production once it is owned.

use std::collections::BTreeMap;

use crate::data::BuildingData;
use crate::error::ValidationError;
use crate::ids::BuildingId;
use crate::jobs::{JobId, JobKind};
use crate::rules::Ruleset;
use crate::state::GameState;

/// Catalog of building types, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct BuildingRegistry {
    types: BTreeMap<BuildingId, BuildingData>,
}

impl BuildingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a building type, replacing any previous definition.
    pub fn register(&mut self, building: BuildingData) {
        self.types.insert(building.id.clone(), building);
    }

    /// Get a building type by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BuildingData> {
        self.types.get(id)
    }

    /// Check if a building type exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// All building types in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildingData> {
        self.types.values()
    }

    /// Number of building types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<BuildingData> for BuildingRegistry {
    fn from_iter<T: IntoIterator<Item = BuildingData>>(iter: T) -> Self {
        let mut registry = Self::new();
        for building in iter {
            registry.register(building);
        }
        registry
    }
}

/// Check whether construction of `id` may start. Pure.
///
/// Checks, in order: the type exists, its tech is unlocked, and every cost
/// resource is available.
pub fn validate_construction<'r>(
    state: &GameState,
    rules: &'r Ruleset,
    id: &str,
) -> Result<&'r BuildingData, ValidationError> {
    let building = rules
        .buildings()
        .get(id)
        .ok_or_else(|| ValidationError::UnknownType { id: id.to_string() })?;

    if let Some(tech) = &building.tech_required {
        if !state.unlocked.contains(tech) {
            return Err(ValidationError::LockedByTech {
                building: building.id.clone(),
                tech: tech.clone(),
            });
        }
    }

    state.resources.check_affordable(&building.cost)?;
    Ok(building)
}

/// Deduct the cost of `id` and enqueue a construction job.
///
/// All-or-nothing: on error nothing has changed.
pub fn start_construction(
    state: &mut GameState,
    rules: &Ruleset,
    id: &str,
) -> Result<JobId, ValidationError> {
    let building = validate_construction(state, rules, id)?;
    state.resources.deduct(&building.cost)?;
    let job = state
        .jobs
        .enqueue(JobKind::Construction(building.id.clone()), building.build_time);
    tracing::debug!(building = %building.id, job, "construction started");
    Ok(job)
}

/// Add one completed unit of `id` to the owned counts.
pub fn complete_construction(state: &mut GameState, id: &BuildingId) -> u32 {
    let count = state.buildings.entry(id.clone()).or_insert(0);
    *count += 1;
    *count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry: BuildingRegistry = vec![
            BuildingData::new("hut", "Hut"),
            BuildingData::new("farm", "Farm"),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("hut"));
        assert!(registry.get("mill").is_none());

        let ids: Vec<&str> = registry.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["farm", "hut"]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = BuildingRegistry::new();
        registry.register(BuildingData::new("hut", "Hut"));
        let mut bigger = BuildingData::new("hut", "Big Hut");
        bigger.housing = 4;
        registry.register(bigger);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("hut").unwrap().housing, 4);
    }
}
