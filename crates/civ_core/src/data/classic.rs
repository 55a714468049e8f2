//! Built-in content: a settlement growing from the Stone Age to the
//! Modern Age.

use std::collections::BTreeMap;

use super::{
    AgeData, AgeRequirements, BuildingData, ContentData, PersonKindData, PopulationData,
    ResourceData, TechData, TechEffect,
};
use crate::ids::TechId;
use crate::math::Fixed;
use crate::resources::ResourceBundle;

fn n(value: i32) -> Fixed {
    Fixed::from_num(value)
}

/// Tenths, so content stays exact: `tenths(35)` is 3.5.
fn tenths(value: i32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(10)
}

fn bundle(entries: &[(&str, Fixed)]) -> ResourceBundle {
    entries.iter().map(|(k, v)| (*k, *v)).collect()
}

fn building(
    id: &str,
    name: &str,
    description: &str,
    cost: &[(&str, Fixed)],
    build_time: u32,
) -> BuildingData {
    let mut data = BuildingData::new(id, name);
    data.description = description.to_string();
    data.cost = bundle(cost);
    data.build_time = build_time;
    data
}

fn tech(
    id: &str,
    name: &str,
    description: &str,
    knowledge: i32,
    research_time: u32,
    effects: Vec<TechEffect>,
) -> TechData {
    let mut data = TechData::new(id, name);
    data.description = description.to_string();
    data.cost = bundle(&[("knowledge", n(knowledge))]);
    data.research_time = research_time;
    data.effects = effects;
    data
}

fn age(id: &str, name: &str, resources: &[(&str, Fixed)], buildings: &[(&str, u32)]) -> AgeData {
    AgeData {
        requirements: AgeRequirements {
            resources: bundle(resources),
            buildings: buildings
                .iter()
                .map(|(k, v)| ((*k).into(), *v))
                .collect::<BTreeMap<_, _>>(),
        },
        ..AgeData::new(id, name)
    }
}

fn production(resource: &str, percent: i32) -> TechEffect {
    TechEffect::ProductionPercent {
        resource: resource.into(),
        percent,
    }
}

fn gathering(resource: &str, percent: i32) -> TechEffect {
    TechEffect::GatherPercent {
        resource: resource.into(),
        percent,
    }
}

impl ContentData {
    /// The built-in content set.
    #[must_use]
    pub fn classic() -> Self {
        let resources = vec![
            ResourceData::new("food", "Food")
                .with_capacity(n(500))
                .with_starting(n(20)),
            ResourceData::new("wood", "Wood")
                .with_capacity(n(500))
                .with_starting(n(15)),
            ResourceData::new("stone", "Stone")
                .with_capacity(n(500))
                .with_gather_rate(tenths(5)),
            ResourceData::new("gold", "Gold")
                .with_capacity(n(300))
                .with_gather_rate(tenths(2)),
            ResourceData::new("knowledge", "Knowledge")
                .with_capacity(n(200))
                .with_gather_rate(tenths(1)),
            ResourceData::new("hunting", "Hunting")
                .with_capacity(n(300))
                .with_gather_rate(tenths(18))
                .with_side_yield("food", 40),
        ];

        let mut hut = building(
            "hut",
            "Hut",
            "A simple dwelling that houses two villagers.",
            &[("wood", n(20))],
            5,
        );
        hut.housing = 2;

        let mut farm = building(
            "farm",
            "Farm",
            "Cultivated fields that feed the settlement.",
            &[("wood", n(100)), ("stone", n(50)), ("food", n(100))],
            10,
        );
        farm.production = bundle(&[("food", tenths(35))]);
        farm.gather_bonus.insert("food".into(), 8);
        farm.tech_required = Some(TechId::from("agriculture"));

        let mut lumber_mill = building(
            "lumber_mill",
            "Lumber Mill",
            "Saws timber faster than any axe.",
            &[("wood", n(100)), ("stone", n(300))],
            12,
        );
        lumber_mill.production = bundle(&[("wood", n(2))]);
        lumber_mill.gather_bonus.insert("wood".into(), 10);
        lumber_mill.tech_required = Some(TechId::from("toolmaking"));

        let mut mine = building(
            "mine",
            "Mine",
            "Digs stone and the occasional vein of gold.",
            &[("wood", n(100)), ("stone", n(400))],
            15,
        );
        mine.production = bundle(&[("stone", n(1)), ("gold", tenths(2))]);
        mine.gather_bonus.insert("stone".into(), 5);
        mine.gather_bonus.insert("gold".into(), 5);
        mine.tech_required = Some(TechId::from("toolmaking"));

        let mut market = building(
            "market",
            "Market",
            "Traders turn surplus into gold.",
            &[("wood", n(200)), ("stone", n(200)), ("gold", n(100))],
            20,
        );
        market.production = bundle(&[("gold", tenths(5))]);
        market.gather_bonus.insert("gold".into(), 10);
        market.tech_required = Some(TechId::from("mathematics"));

        let mut library = building(
            "library",
            "Library",
            "Scholars record and extend what the settlement knows.",
            &[("wood", n(400)), ("stone", n(200)), ("knowledge", n(100))],
            25,
        );
        library.production = bundle(&[("knowledge", tenths(5))]);
        library.gather_bonus.insert("knowledge".into(), 15);
        library.tech_required = Some(TechId::from("writing"));

        let mut granary = building(
            "granary",
            "Granary",
            "Dry storage for food and timber.",
            &[("wood", n(60)), ("stone", n(20))],
            8,
        );
        granary.storage = bundle(&[("food", n(250)), ("wood", n(250))]);

        let mut foundry = building(
            "foundry",
            "Foundry",
            "Burns timber to smelt gold from ore.",
            &[("wood", n(150)), ("stone", n(250))],
            20,
        );
        foundry.production = bundle(&[("wood", n(-1)), ("gold", tenths(6))]);
        foundry.tech_required = Some(TechId::from("metallurgy"));

        let mut writing = tech(
            "writing",
            "Writing",
            "A writing system to record knowledge.",
            40,
            20,
            vec![production("knowledge", 20), gathering("knowledge", 20)],
        );
        writing.required_age = Some("bronze".into());

        let mut metallurgy = tech(
            "metallurgy",
            "Metallurgy",
            "Working metal opens the way to the foundry.",
            50,
            25,
            Vec::new(),
        );
        metallurgy.required_age = Some("bronze".into());

        let mut mathematics = tech(
            "mathematics",
            "Mathematics",
            "Numbers make trade and construction precise.",
            60,
            30,
            vec![production("gold", 10)],
        );
        mathematics.prerequisites.push("writing".into());
        mathematics.required_age = Some("iron".into());

        let mut masonry = tech(
            "masonry",
            "Masonry",
            "Cut stone for sturdier storage and homes.",
            30,
            20,
            vec![
                TechEffect::CapacityFlat {
                    resource: "stone".into(),
                    amount: n(250),
                },
                TechEffect::HousingFlat(2),
            ],
        );
        masonry.prerequisites.push("toolmaking".into());

        let technologies = vec![
            tech(
                "agriculture",
                "Agriculture",
                "Better methods of growing food.",
                20,
                10,
                vec![production("food", 20), gathering("food", 20)],
            ),
            tech(
                "toolmaking",
                "Toolmaking",
                "Better tools for gathering.",
                25,
                12,
                vec![
                    gathering("wood", 10),
                    gathering("stone", 10),
                    gathering("gold", 10),
                ],
            ),
            writing,
            metallurgy,
            mathematics,
            masonry,
        ];

        let ages = vec![
            AgeData::new("stone", "Stone Age"),
            age(
                "bronze",
                "Bronze Age",
                &[("stone", n(50)), ("food", n(100))],
                &[("hut", 3), ("farm", 2)],
            ),
            age(
                "iron",
                "Iron Age",
                &[("stone", n(100)), ("wood", n(150)), ("knowledge", n(20))],
                &[("mine", 2), ("lumber_mill", 2)],
            ),
            age(
                "medieval",
                "Medieval Age",
                &[
                    ("stone", n(200)),
                    ("wood", n(250)),
                    ("gold", n(50)),
                    ("knowledge", n(50)),
                ],
                &[("market", 1), ("library", 1)],
            ),
            age(
                "renaissance",
                "Renaissance",
                &[("gold", n(150)), ("knowledge", n(100))],
                &[("library", 3), ("market", 2)],
            ),
            age(
                "industrial",
                "Industrial Age",
                &[("gold", n(300)), ("knowledge", n(200))],
                &[("library", 5), ("market", 4)],
            ),
            age(
                "modern",
                "Modern Age",
                &[("gold", n(500)), ("knowledge", n(400))],
                &[("library", 8), ("market", 6)],
            ),
        ];

        let mut villager = PersonKindData::new("villager", "Villager")
            .with_starting(1)
            .with_upkeep(tenths(5));
        villager.recruit_cost = bundle(&[("food", n(10))]);
        villager.gather_percent.insert("knowledge".into(), 20);

        let mut scholar = PersonKindData::new("scholar", "Scholar").with_upkeep(n(3) / n(4));
        scholar.recruit_cost = bundle(&[("food", n(20)), ("gold", n(10))]);
        scholar.gathers = Some(vec!["knowledge".into()]);
        scholar.gather_percent.insert("knowledge".into(), 150);
        scholar.required_age = Some("medieval".into());

        let population = PopulationData {
            base_housing: 1,
            food_resource: "food".into(),
            kinds: vec![villager, scholar],
        };

        Self {
            name: "Classic".to_string(),
            resources,
            buildings: vec![
                hut,
                farm,
                lumber_mill,
                mine,
                market,
                library,
                granary,
                foundry,
            ],
            technologies,
            ages,
            population,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_is_valid() {
        ContentData::classic().validate().unwrap();
    }

    #[test]
    fn test_classic_starting_stock() {
        let content = ContentData::classic();
        assert_eq!(content.get_resource("food").unwrap().starting_amount, n(20));
        assert_eq!(content.get_resource("wood").unwrap().starting_amount, n(15));
        assert_eq!(content.population.starting_total(), 1);
        assert_eq!(content.first_age().map(|a| a.as_str()), Some("stone"));
    }

    #[test]
    fn test_classic_gates() {
        let content = ContentData::classic();
        assert_eq!(content.get_building("hut").unwrap().tech_required, None);
        assert_eq!(
            content.get_building("farm").unwrap().tech_required,
            Some(TechId::from("agriculture"))
        );
        assert!(content.get_technology("mathematics").unwrap().requires("writing"));
        assert_eq!(
            content.population.kind("scholar").unwrap().required_age,
            Some("medieval".into())
        );
    }
}
