//! Population: head counts per kind, worker assignments, recruiting and
//! starvation.
//!
//! People come in kinds defined by content (villagers, scholars, ...).
//! Each person is either idle or assigned to gather one resource. Every
//! person eats food each tick at the rate of their kind. When food runs out
//! one person is lost per tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::PersonKindData;
use crate::economy::housing_capacity;
use crate::error::{InvariantViolation, ValidationError};
use crate::ids::{PersonKind, ResourceKind};
use crate::rules::Ruleset;
use crate::state::GameState;

/// Requested worker counts per resource.
///
/// Entries replace the current assignment for that resource; resources not
/// mentioned keep their workers.
pub type Allocation = BTreeMap<ResourceKind, u32>;

/// People of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Head count.
    pub total: u32,
    /// Workers per gathered resource. Zero entries are not stored.
    pub assignments: BTreeMap<ResourceKind, u32>,
}

impl Group {
    /// A group with everyone idle.
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            assignments: BTreeMap::new(),
        }
    }

    /// Workers assigned to any resource.
    #[must_use]
    pub fn assigned(&self) -> u32 {
        self.assignments.values().fold(0, |acc, n| acc.saturating_add(*n))
    }

    /// People with no assignment.
    #[must_use]
    pub fn idle(&self) -> u32 {
        self.total.saturating_sub(self.assigned())
    }

    /// Workers gathering `resource`.
    #[must_use]
    pub fn assigned_to(&self, resource: &str) -> u32 {
        self.assignments.get(resource).copied().unwrap_or(0)
    }
}

/// The settlement's people, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    /// Groups in lexicographic kind order. Empty groups are not stored.
    pub groups: BTreeMap<PersonKind, Group>,
}

/// Where a lost person was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Casualty {
    /// An idle person of this kind.
    Idle(PersonKind),
    /// A worker of `kind` gathering `resource`.
    Worker {
        /// Kind of the lost worker.
        kind: PersonKind,
        /// Resource they were gathering.
        resource: ResourceKind,
    },
}

impl Casualty {
    /// Kind of the person lost.
    #[must_use]
    pub fn kind(&self) -> &PersonKind {
        match self {
            Self::Idle(kind) | Self::Worker { kind, .. } => kind,
        }
    }
}

impl Population {
    /// Starting groups from content, everyone idle.
    #[must_use]
    pub fn from_content(kinds: &[PersonKindData]) -> Self {
        let groups = kinds
            .iter()
            .filter(|k| k.starting > 0)
            .map(|k| (k.id.clone(), Group::new(k.starting)))
            .collect();
        Self { groups }
    }

    /// Head count across all kinds.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.groups
            .values()
            .fold(0, |acc, g| acc.saturating_add(g.total))
    }

    /// Workers assigned to any resource, across all kinds.
    #[must_use]
    pub fn assigned(&self) -> u32 {
        self.groups
            .values()
            .fold(0, |acc, g| acc.saturating_add(g.assigned()))
    }

    /// People with no assignment, across all kinds.
    #[must_use]
    pub fn idle(&self) -> u32 {
        self.groups
            .values()
            .fold(0, |acc, g| acc.saturating_add(g.idle()))
    }

    /// Workers gathering `resource`, across all kinds.
    #[must_use]
    pub fn assigned_to(&self, resource: &str) -> u32 {
        self.groups
            .values()
            .fold(0, |acc, g| acc.saturating_add(g.assigned_to(resource)))
    }

    /// Workers per resource, summed across kinds.
    #[must_use]
    pub fn assignments(&self) -> BTreeMap<ResourceKind, u32> {
        let mut merged: BTreeMap<ResourceKind, u32> = BTreeMap::new();
        for group in self.groups.values() {
            for (resource, count) in &group.assignments {
                let entry = merged.entry(resource.clone()).or_default();
                *entry = entry.saturating_add(*count);
            }
        }
        merged
    }

    /// The group of one kind, if anyone of that kind is alive.
    #[must_use]
    pub fn group(&self, kind: &str) -> Option<&Group> {
        self.groups.get(kind)
    }

    /// Head count of one kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> u32 {
        self.group(kind).map_or(0, |g| g.total)
    }

    /// Remove one person.
    ///
    /// Idle people go first, from the lexicographically first kind that has
    /// any. Otherwise a worker is taken from the lexicographically greatest
    /// assigned resource, ties going to the greatest kind.
    pub fn remove_one(&mut self) -> Option<Casualty> {
        let idle_kind = self
            .groups
            .iter()
            .find(|(_, g)| g.idle() > 0)
            .map(|(k, _)| k.clone());
        if let Some(kind) = idle_kind {
            self.shrink(&kind, None);
            return Some(Casualty::Idle(kind));
        }

        let (resource, kind) = self
            .groups
            .iter()
            .filter_map(|(k, g)| g.assignments.keys().next_back().map(|r| (r.clone(), k.clone())))
            .max()?;
        self.shrink(&kind, Some(&resource));
        Some(Casualty::Worker { kind, resource })
    }

    fn shrink(&mut self, kind: &PersonKind, resource: Option<&ResourceKind>) {
        let Some(group) = self.groups.get_mut(kind) else {
            return;
        };
        if let Some(resource) = resource {
            if let Some(count) = group.assignments.get_mut(resource) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    group.assignments.remove(resource);
                }
            }
        }
        group.total = group.total.saturating_sub(1);
        if group.total == 0 {
            self.groups.remove(kind);
        }
    }

    /// Verify that no group has more workers than people.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for group in self.groups.values() {
            let assigned = group.assigned();
            if assigned > group.total {
                return Err(InvariantViolation::OverAllocated {
                    assigned,
                    total: group.total,
                });
            }
        }
        Ok(())
    }
}

/// Resolve an optional kind to its content definition. `None` picks the
/// default kind.
pub fn resolve_kind<'r>(
    rules: &'r Ruleset,
    kind: Option<&str>,
) -> Result<&'r PersonKindData, ValidationError> {
    let population = rules.population();
    match kind {
        Some(id) => population
            .kind(id)
            .ok_or_else(|| ValidationError::UnknownType { id: id.to_string() }),
        None => population.default_kind().ok_or_else(|| {
            ValidationError::InvalidAllocation("content defines no kinds of people".to_string())
        }),
    }
}

/// Check an allocation for one kind against the current state. Pure.
///
/// Returns the kind's assignments that would result.
pub fn validate_assignment<'r>(
    state: &GameState,
    rules: &'r Ruleset,
    kind: Option<&str>,
    allocation: &Allocation,
) -> Result<(&'r PersonKindData, BTreeMap<ResourceKind, u32>), ValidationError> {
    let kind = resolve_kind(rules, kind)?;
    if allocation.is_empty() {
        return Err(ValidationError::InvalidAllocation(
            "no resources given".to_string(),
        ));
    }

    let group = state.population.group(kind.id.as_str());
    let mut result = group.map(|g| g.assignments.clone()).unwrap_or_default();
    for (resource, count) in allocation {
        let Some(data) = rules.resource(resource.as_str()) else {
            return Err(ValidationError::InvalidAllocation(format!(
                "unknown resource '{resource}'"
            )));
        };
        if !data.gatherable {
            return Err(ValidationError::InvalidAllocation(format!(
                "'{resource}' cannot be gathered"
            )));
        }
        if *count > 0 && !kind.can_gather(resource.as_str()) {
            return Err(ValidationError::InvalidAllocation(format!(
                "{} cannot gather '{resource}'",
                kind.name
            )));
        }
        if *count == 0 {
            result.remove(resource);
        } else {
            result.insert(resource.clone(), *count);
        }
    }

    let assigned = result.values().fold(0u32, |acc, n| acc.saturating_add(*n));
    let total = group.map_or(0, |g| g.total);
    if assigned > total {
        return Err(ValidationError::InvalidAllocation(format!(
            "{assigned} {} workers requested but there are {total}",
            kind.id
        )));
    }
    Ok((kind, result))
}

/// Replace the assignments named in `allocation` for one kind.
///
/// Returns the kind that was assigned.
pub fn assign(
    state: &mut GameState,
    rules: &Ruleset,
    kind: Option<&str>,
    allocation: &Allocation,
) -> Result<PersonKind, ValidationError> {
    let (kind, assignments) = validate_assignment(state, rules, kind, allocation)?;
    if let Some(group) = state.population.groups.get_mut(kind.id.as_str()) {
        group.assignments = assignments;
    }
    Ok(kind.id.clone())
}

/// Check whether `count` people of one kind may be recruited. Pure.
pub fn validate_recruit<'r>(
    state: &GameState,
    rules: &'r Ruleset,
    kind: Option<&str>,
    count: u32,
) -> Result<&'r PersonKindData, ValidationError> {
    let kind = resolve_kind(rules, kind)?;
    if count == 0 {
        return Err(ValidationError::InvalidAllocation(
            "recruit count must be positive".to_string(),
        ));
    }
    if let Some(age) = &kind.required_age {
        if !rules.ages().is_reached(age.as_str(), state.age.as_str()) {
            return Err(ValidationError::KindLocked {
                kind: kind.id.clone(),
                age: age.clone(),
            });
        }
    }

    let capacity = housing_capacity(state, rules);
    let requested = state.population.total().saturating_add(count);
    if requested > capacity {
        return Err(ValidationError::HousingFull {
            requested,
            capacity,
        });
    }

    state
        .resources
        .check_affordable(&kind.recruit_cost.scaled(count))?;
    Ok(kind)
}

/// Pay for and add `count` idle people of one kind.
///
/// Returns the kind that was recruited.
pub fn recruit(
    state: &mut GameState,
    rules: &Ruleset,
    kind: Option<&str>,
    count: u32,
) -> Result<PersonKind, ValidationError> {
    let kind = validate_recruit(state, rules, kind, count)?;
    state.resources.deduct(&kind.recruit_cost.scaled(count))?;
    let group = state.population.groups.entry(kind.id.clone()).or_default();
    group.total = group.total.saturating_add(count);
    Ok(kind.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population(groups: &[(&str, u32, &[(&str, u32)])]) -> Population {
        let mut population = Population::default();
        for (kind, total, assignments) in groups {
            let mut group = Group::new(*total);
            for (resource, count) in *assignments {
                group.assignments.insert((*resource).into(), *count);
            }
            population.groups.insert((*kind).into(), group);
        }
        population
    }

    #[test]
    fn test_idle_and_assigned() {
        let population = population(&[
            ("scholar", 2, &[("knowledge", 2)]),
            ("villager", 5, &[("wood", 2), ("knowledge", 1)]),
        ]);

        assert_eq!(population.total(), 7);
        assert_eq!(population.assigned(), 5);
        assert_eq!(population.idle(), 2);
        assert_eq!(population.assigned_to("knowledge"), 3);
        assert_eq!(population.assigned_to("gold"), 0);
        assert_eq!(population.count("scholar"), 2);
        assert_eq!(population.assignments().get("knowledge"), Some(&3));
    }

    #[test]
    fn test_remove_one_prefers_idle() {
        let mut population = population(&[("villager", 2, &[("wood", 1)])]);

        assert_eq!(
            population.remove_one(),
            Some(Casualty::Idle("villager".into()))
        );
        assert_eq!(population.total(), 1);
        assert_eq!(population.assigned_to("wood"), 1);
    }

    #[test]
    fn test_remove_one_takes_greatest_resource() {
        let mut population = population(&[
            ("scholar", 1, &[("knowledge", 1)]),
            ("villager", 3, &[("food", 2), ("wood", 1)]),
        ]);

        assert_eq!(
            population.remove_one(),
            Some(Casualty::Worker {
                kind: "villager".into(),
                resource: "wood".into()
            })
        );
        assert_eq!(
            population.remove_one(),
            Some(Casualty::Worker {
                kind: "scholar".into(),
                resource: "knowledge".into()
            })
        );
        assert!(population.group("scholar").is_none());
        assert_eq!(population.total(), 2);
    }

    #[test]
    fn test_remove_one_from_empty() {
        let mut population = Population::default();
        assert_eq!(population.remove_one(), None);
        assert_eq!(population.total(), 0);
    }

    #[test]
    fn test_from_content_skips_empty_kinds() {
        let kinds = vec![
            PersonKindData::new("villager", "Villager").with_starting(3),
            PersonKindData::new("scholar", "Scholar"),
        ];
        let population = Population::from_content(&kinds);
        assert_eq!(population.count("villager"), 3);
        assert!(population.group("scholar").is_none());
    }

    #[test]
    fn test_over_allocation_is_invariant_violation() {
        let population = population(&[("villager", 1, &[("food", 2)])]);
        assert!(matches!(
            population.check_invariants(),
            Err(InvariantViolation::OverAllocated { assigned: 2, total: 1 })
        ));
    }
}
