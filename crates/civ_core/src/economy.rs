//! Production, gathering and upkeep.
//!
//! Computes the per-tick rate of every resource from the buildings owned,
//! the workers assigned and the techs unlocked at the start of the tick.
//!
//! For each resource:
//!
//! ```text
//! rate = produced * (100 + production%) / 100
//!      + consumed
//!      + sum over kinds(workers * gather_rate * kind%) * (100 + gather%) / 100
//!      + sum over sources(workers * source_rate * side%)
//!      - sum over kinds(people * upkeep)   (food resource only)
//! ```
//!
//! where `produced` and `consumed` are the positive and negative building
//! deltas summed over owned counts. Production bonuses never scale
//! consumption, and gather bonuses never scale side yields.
//!
//! All calculations use fixed-point math for deterministic simulation.
//! Sums saturate at the range of [`Fixed`] so an unbounded stockpile can
//! grow forever without wrapping.

use std::collections::BTreeMap;

use crate::data::TechEffect;
use crate::math::{apply_percent, Amount, Fixed};
use crate::resources::RateSheet;
use crate::rules::Ruleset;
use crate::state::GameState;

/// Population capacity: base housing, buildings and techs.
#[must_use]
pub fn housing_capacity(state: &GameState, rules: &Ruleset) -> u32 {
    let from_buildings: u32 = rules
        .buildings()
        .iter()
        .map(|b| b.housing.saturating_mul(state.owned(b.id.as_str())))
        .fold(0, u32::saturating_add);
    let from_techs: u32 = rules
        .techs()
        .unlocked_effects(&state.unlocked)
        .filter_map(|effect| match effect {
            TechEffect::HousingFlat(n) => Some(*n),
            _ => None,
        })
        .fold(0, u32::saturating_add);

    rules
        .population()
        .base_housing
        .saturating_add(from_buildings)
        .saturating_add(from_techs)
}

/// Storage capacity of one resource. `None` stays unbounded.
#[must_use]
pub fn capacity(state: &GameState, rules: &Ruleset, resource: &str) -> Option<Amount> {
    let base = rules.resource(resource)?.base_capacity?;

    let from_buildings = rules
        .buildings()
        .iter()
        .map(|b| {
            b.storage
                .get(resource)
                .saturating_mul(Fixed::saturating_from_num(state.owned(b.id.as_str())))
        })
        .fold(Fixed::ZERO, Fixed::saturating_add);
    let from_techs = rules
        .techs()
        .unlocked_effects(&state.unlocked)
        .filter_map(|effect| match effect {
            TechEffect::CapacityFlat { resource: r, amount } if r.as_str() == resource => {
                Some(*amount)
            }
            _ => None,
        })
        .fold(Fixed::ZERO, Fixed::saturating_add);

    Some(
        base.saturating_add(from_buildings)
            .saturating_add(from_techs),
    )
}

/// Percent applied to building production of `resource` (100 = no bonus).
#[must_use]
pub fn production_percent(state: &GameState, rules: &Ruleset, resource: &str) -> i32 {
    rules
        .techs()
        .unlocked_effects(&state.unlocked)
        .filter_map(|effect| match effect {
            TechEffect::ProductionPercent { resource: r, percent } if r.as_str() == resource => {
                Some(*percent)
            }
            _ => None,
        })
        .fold(100, i32::saturating_add)
}

/// Percent applied to worker gathering of `resource` (100 = no bonus).
#[must_use]
pub fn gather_percent(state: &GameState, rules: &Ruleset, resource: &str) -> i32 {
    let from_buildings: i32 = rules
        .buildings()
        .iter()
        .map(|b| {
            let owned = i32::try_from(state.owned(b.id.as_str())).unwrap_or(i32::MAX);
            b.gather_bonus_for(resource).saturating_mul(owned)
        })
        .fold(0, i32::saturating_add);
    let from_techs: i32 = rules
        .techs()
        .unlocked_effects(&state.unlocked)
        .filter_map(|effect| match effect {
            TechEffect::GatherPercent { resource: r, percent } if r.as_str() == resource => {
                Some(*percent)
            }
            _ => None,
        })
        .fold(0, i32::saturating_add);

    100i32.saturating_add(from_buildings).saturating_add(from_techs)
}

/// Breakdown of one resource's rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateBreakdown {
    /// Building production after bonuses.
    pub produced: Fixed,
    /// Building consumption (zero or negative).
    pub consumed: Fixed,
    /// Worker gathering after bonuses, plus side yields from workers on
    /// other resources.
    pub gathered: Fixed,
    /// Population upkeep (zero or positive, subtracted).
    pub upkeep: Fixed,
}

impl RateBreakdown {
    /// Net per-tick delta.
    #[must_use]
    pub fn net(&self) -> Fixed {
        self.produced
            .saturating_add(self.consumed)
            .saturating_add(self.gathered)
            .saturating_sub(self.upkeep)
    }

    /// Income before consumption and upkeep.
    #[must_use]
    pub fn gross(&self) -> Fixed {
        self.produced.saturating_add(self.gathered)
    }
}

/// Rate breakdown of one resource.
#[must_use]
pub fn breakdown(state: &GameState, rules: &Ruleset, resource: &str) -> RateBreakdown {
    let mut positive = Fixed::ZERO;
    let mut negative = Fixed::ZERO;
    for building in rules.buildings().iter() {
        let owned = state.owned(building.id.as_str());
        if owned == 0 {
            continue;
        }
        let delta = building
            .production
            .get(resource)
            .saturating_mul(Fixed::saturating_from_num(owned));
        if delta >= Fixed::ZERO {
            positive = positive.saturating_add(delta);
        } else {
            negative = negative.saturating_add(delta);
        }
    }

    let gathered = gathered_by_workers(state, rules, resource)
        .saturating_add(side_yield(state, rules, resource));

    let population = rules.population();
    let upkeep = if population.food_resource.as_str() == resource {
        state
            .population
            .groups
            .iter()
            .filter_map(|(kind, group)| {
                let data = population.kind(kind.as_str())?;
                Some(data.upkeep.saturating_mul(Fixed::saturating_from_num(group.total)))
            })
            .fold(Fixed::ZERO, Fixed::saturating_add)
    } else {
        Fixed::ZERO
    };

    RateBreakdown {
        produced: apply_percent(positive, production_percent(state, rules, resource)),
        consumed: negative,
        gathered,
        upkeep,
    }
}

/// Worker gathering of `resource`: each kind at its own percent of the
/// base rate, then the settlement-wide gather bonus.
fn gathered_by_workers(state: &GameState, rules: &Ruleset, resource: &str) -> Fixed {
    let Some(data) = rules.resource(resource).filter(|d| d.gatherable) else {
        return Fixed::ZERO;
    };
    let population = rules.population();
    let base = state
        .population
        .groups
        .iter()
        .filter_map(|(kind, group)| {
            let workers = group.assigned_to(resource);
            if workers == 0 {
                return None;
            }
            let percent = population
                .kind(kind.as_str())
                .map_or(100, |k| k.gather_percent_for(resource));
            Some(apply_percent(
                data.gather_rate
                    .saturating_mul(Fixed::saturating_from_num(workers)),
                percent,
            ))
        })
        .fold(Fixed::ZERO, Fixed::saturating_add);

    apply_percent(base, gather_percent(state, rules, resource))
}

/// Income into `resource` from workers gathering other resources that
/// yield into it.
fn side_yield(state: &GameState, rules: &Ruleset, resource: &str) -> Fixed {
    rules
        .resources()
        .filter(|source| source.gatherable)
        .filter_map(|source| {
            let percent = *source.side_yield.get(resource)?;
            let workers = state.population.assigned_to(source.id.as_str());
            Some(apply_percent(
                source
                    .gather_rate
                    .saturating_mul(Fixed::saturating_from_num(workers)),
                percent,
            ))
        })
        .fold(Fixed::ZERO, Fixed::saturating_add)
}

/// Rates and capacities for every resource, in lexicographic order.
#[must_use]
pub fn rate_sheet(state: &GameState, rules: &Ruleset) -> RateSheet {
    let mut rates = BTreeMap::new();
    let mut capacities = BTreeMap::new();
    let mut gross = BTreeMap::new();

    for (kind, _) in state.resources.iter() {
        let parts = breakdown(state, rules, kind.as_str());
        rates.insert(kind.clone(), parts.net());
        gross.insert(kind.clone(), parts.gross());
        capacities.insert(kind.clone(), capacity(state, rules, kind.as_str()));
    }

    RateSheet {
        rates,
        capacities,
        gross,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ContentData;
    use crate::resources::ResourceBundle;

    fn setup() -> (Ruleset, GameState) {
        let rules = Ruleset::classic().unwrap();
        let state = GameState::new(&rules);
        (rules, state)
    }

    fn put_to_work(state: &mut GameState, kind: &str, resource: &str, workers: u32) {
        let group = state.population.groups.entry(kind.into()).or_default();
        group.assignments.insert(resource.into(), workers);
        group.total = group.total.max(group.assigned());
    }

    #[test]
    fn test_single_villager_upkeep() {
        let (rules, state) = setup();
        let food = breakdown(&state, &rules, "food");
        assert_eq!(food.upkeep, Fixed::from_num(0.5));
        assert_eq!(food.net(), Fixed::from_num(-0.5));
    }

    #[test]
    fn test_gathering_rate() {
        let (rules, mut state) = setup();
        put_to_work(&mut state, "villager", "wood", 1);
        let wood = breakdown(&state, &rules, "wood");
        assert_eq!(wood.gathered, Fixed::ONE);
        assert_eq!(wood.net(), Fixed::ONE);
    }

    #[test]
    fn test_building_production_and_bonus() {
        let (rules, mut state) = setup();
        state.buildings.insert("farm".into(), 2);
        let food = breakdown(&state, &rules, "food");
        assert_eq!(food.produced, Fixed::from_num(7));

        state.unlocked.insert("agriculture".into());
        let food = breakdown(&state, &rules, "food");
        assert_eq!(
            food.produced,
            Fixed::from_num(840) / Fixed::from_num(100)
        );
    }

    #[test]
    fn test_consumption_is_not_scaled() {
        let (rules, mut state) = setup();
        state.buildings.insert("foundry".into(), 2);
        let wood = breakdown(&state, &rules, "wood");
        assert_eq!(wood.consumed, Fixed::from_num(-2));
        assert_eq!(wood.produced, Fixed::ZERO);
    }

    #[test]
    fn test_building_gather_bonus() {
        let (rules, mut state) = setup();
        put_to_work(&mut state, "villager", "wood", 10);
        state.buildings.insert("lumber_mill".into(), 1);
        assert_eq!(gather_percent(&state, &rules, "wood"), 110);

        state.unlocked.insert("toolmaking".into());
        assert_eq!(gather_percent(&state, &rules, "wood"), 120);
        let wood = breakdown(&state, &rules, "wood");
        assert_eq!(wood.gathered, Fixed::from_num(12));
    }

    #[test]
    fn test_kind_gather_percent() {
        let (rules, mut state) = setup();
        let rate = Fixed::ONE / Fixed::from_num(10);
        put_to_work(&mut state, "villager", "knowledge", 10);
        let villagers = apply_percent(rate * Fixed::from_num(10), 20);
        assert_eq!(breakdown(&state, &rules, "knowledge").gathered, villagers);

        put_to_work(&mut state, "scholar", "knowledge", 2);
        let scholars = apply_percent(rate * Fixed::from_num(2), 150);
        assert_eq!(
            breakdown(&state, &rules, "knowledge").gathered,
            villagers + scholars
        );
    }

    #[test]
    fn test_upkeep_per_kind() {
        let (rules, mut state) = setup();
        state.population.groups.entry("villager".into()).or_default().total = 2;
        state.population.groups.entry("scholar".into()).or_default().total = 4;
        let food = breakdown(&state, &rules, "food");
        assert_eq!(food.upkeep, Fixed::from_num(4));
    }

    #[test]
    fn test_hunting_side_yield_ignores_gather_bonus() {
        let (rules, mut state) = setup();
        put_to_work(&mut state, "villager", "hunting", 5);
        let rate = Fixed::from_num(18) / Fixed::from_num(10);
        let side = apply_percent(rate * Fixed::from_num(5), 40);

        let food = breakdown(&state, &rules, "food");
        assert_eq!(food.gathered, side);
        assert_eq!(
            breakdown(&state, &rules, "hunting").gathered,
            rate * Fixed::from_num(5)
        );

        state.unlocked.insert("agriculture".into());
        assert_eq!(breakdown(&state, &rules, "food").gathered, side);
    }

    #[test]
    fn test_rates_saturate_instead_of_overflowing() {
        let mut content = ContentData::classic();
        content.buildings[0].production = ResourceBundle::new().with("wood", Fixed::MAX);
        let rules = Ruleset::new(content).unwrap();
        let mut state = GameState::new(&rules);
        state.buildings.insert("hut".into(), 3);
        put_to_work(&mut state, "villager", "wood", u32::MAX);

        let wood = breakdown(&state, &rules, "wood");
        assert_eq!(wood.produced, Fixed::MAX);
        assert_eq!(wood.net(), Fixed::MAX);
        assert_eq!(wood.gross(), Fixed::MAX);
    }

    #[test]
    fn test_housing_capacity() {
        let (rules, mut state) = setup();
        assert_eq!(housing_capacity(&state, &rules), 1);
        state.buildings.insert("hut".into(), 3);
        assert_eq!(housing_capacity(&state, &rules), 7);
        state.unlocked.insert("masonry".into());
        assert_eq!(housing_capacity(&state, &rules), 9);
    }

    #[test]
    fn test_capacity_from_storage_and_tech() {
        let (rules, mut state) = setup();
        assert_eq!(capacity(&state, &rules, "stone"), Some(Fixed::from_num(500)));
        state.unlocked.insert("masonry".into());
        assert_eq!(capacity(&state, &rules, "stone"), Some(Fixed::from_num(750)));
        state.buildings.insert("granary".into(), 2);
        assert_eq!(capacity(&state, &rules, "food"), Some(Fixed::from_num(1000)));
    }

    #[test]
    fn test_unbounded_resource_stays_unbounded() {
        let mut content = ContentData::classic();
        content.resources[0].base_capacity = None;
        let rules = Ruleset::new(content).unwrap();
        let state = GameState::new(&rules);
        assert_eq!(capacity(&state, &rules, "food"), None);
    }
}
