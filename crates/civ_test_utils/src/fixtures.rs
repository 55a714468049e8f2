//! Test fixtures and helpers.
//!
//! Small content sets and pre-built engines for consistent testing.

use civ_core::data::{
    AgeData, BuildingData, ContentData, PopulationData, ResourceData, TechData,
};
use civ_core::engine::GameEngine;
use civ_core::math::Fixed;
use civ_core::resources::ResourceBundle;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// Minimal content built around a single hut.
///
/// - `wood` starts at 100, `knowledge` at 100, `food` at 0, all uncapped
/// - `hut` costs 50 wood, takes 3 ticks, produces nothing
/// - `mill` costs 20 wood, takes 4 ticks, produces 1 food, needs `agriculture`
/// - `agriculture` costs 10 knowledge and takes 2 ticks
/// - one age, no upkeep, one villager
#[must_use]
pub fn hut_content() -> ContentData {
    hut_content_with_wood(100)
}

/// [`hut_content`] with a different starting amount of wood.
#[must_use]
pub fn hut_content_with_wood(wood: i32) -> ContentData {
    let mut hut = BuildingData::new("hut", "Hut");
    hut.cost = ResourceBundle::new().with("wood", fixed(50));
    hut.build_time = 3;

    let mut mill = BuildingData::new("mill", "Mill");
    mill.cost = ResourceBundle::new().with("wood", fixed(20));
    mill.build_time = 4;
    mill.production = ResourceBundle::new().with("food", fixed(1));
    mill.tech_required = Some("agriculture".into());

    let mut agriculture = TechData::new("agriculture", "Agriculture");
    agriculture.cost = ResourceBundle::new().with("knowledge", fixed(10));
    agriculture.research_time = 2;

    ContentData {
        name: "Hut".to_string(),
        resources: vec![
            ResourceData::new("food", "Food"),
            ResourceData::new("knowledge", "Knowledge").with_starting(fixed(100)),
            ResourceData::new("wood", "Wood").with_starting(fixed(wood)),
        ],
        buildings: vec![hut, mill],
        technologies: vec![agriculture],
        ages: vec![AgeData::new("dawn", "Dawn Age")],
        population: PopulationData::new("food"),
    }
}

/// Engine over [`hut_content`].
///
/// # Panics
///
/// Panics if the fixture content fails validation.
#[must_use]
pub fn hut_engine() -> GameEngine {
    engine_with(hut_content())
}

/// Engine over the built-in classic content.
///
/// # Panics
///
/// Panics if the classic content fails validation.
#[must_use]
pub fn classic_engine() -> GameEngine {
    engine_with(ContentData::classic())
}

/// Engine over arbitrary content.
///
/// # Panics
///
/// Panics if `content` fails validation.
#[must_use]
pub fn engine_with(content: ContentData) -> GameEngine {
    match GameEngine::new(content) {
        Ok(engine) => engine,
        Err(e) => panic!("fixture content is invalid: {e}"),
    }
}

/// Classic engine with its only villager gathering food.
///
/// # Panics
///
/// Panics if the classic content fails validation or the assignment is
/// rejected.
#[must_use]
pub fn busy_classic_engine() -> GameEngine {
    let mut engine = classic_engine();
    if let Err(e) = engine.submit_text("assign food 1") {
        panic!("fixture assignment rejected: {e}");
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hut_content_is_valid() {
        assert!(hut_content().validate().is_ok());
    }

    #[test]
    fn test_hut_engine_starting_amounts() {
        let engine = hut_engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.amount("wood"), fixed(100));
        assert_eq!(snapshot.amount("food"), Fixed::ZERO);
        assert_eq!(snapshot.population.total, 1);
    }

    #[test]
    fn test_busy_classic_engine() {
        let engine = busy_classic_engine();
        let population = &engine.snapshot().population;
        assert_eq!(population.total, 1);
        assert_eq!(population.idle, 0);
    }
}
