//! Data structures for game content.
//!
//! Content (resource kinds, buildings, technologies, ages and population
//! rules) is plain data, designed to be deserialized from RON files. It is
//! validated once when loaded; the simulation never re-checks it.

mod age_data;
mod building_data;
mod classic;
mod population_data;
mod resource_data;
mod tech_data;

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use age_data::{AgeData, AgeRequirements};
pub use building_data::BuildingData;
pub use population_data::{PersonKindData, PopulationData};
pub use resource_data::ResourceData;
pub use tech_data::{TechData, TechEffect};

use crate::ids::{AgeId, BuildingId, ResourceKind, TechId};
use crate::math::Fixed;
use crate::tech::find_cycle;

/// Error type for content loading and validation.
#[derive(Error, Debug)]
pub enum ContentError {
    /// File not found.
    #[error("Content file not found: {0}")]
    FileNotFound(String),

    /// Failed to read file.
    #[error("Failed to read content file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse RON.
    #[error("Failed to parse content: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// A required list is empty.
    #[error("Content defines no {0}")]
    Empty(&'static str),

    /// The same id is defined twice.
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId {
        /// Kind of definition ("resource", "building", ...).
        kind: &'static str,
        /// Duplicated id.
        id: String,
    },

    /// A definition points at an id that does not exist.
    #[error("{owner} references unknown {kind} '{id}'")]
    UnknownReference {
        /// Definition holding the reference.
        owner: String,
        /// Kind of the missing target.
        kind: &'static str,
        /// Missing id.
        id: String,
    },

    /// A build or research time of zero ticks.
    #[error("{0} must take at least one tick")]
    ZeroDuration(String),

    /// A value outside its allowed range.
    #[error("Invalid value for {owner}: {reason}")]
    InvalidValue {
        /// Definition holding the value.
        owner: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Tech prerequisites form a cycle.
    #[error(
        "Cyclic tech prerequisites: {}",
        .0.iter().map(TechId::as_str).collect::<Vec<_>>().join(" -> ")
    )]
    CyclicPrerequisites(Vec<TechId>),

    /// Content could not be written back out.
    #[error("Game content is invalid: {0}")]
    Invalid(String),
}

/// Complete content definition for one game.
///
/// # Example RON
///
/// ```ron
/// ContentData(
///     name: "Classic",
///     resources: [...],
///     buildings: [...],
///     technologies: [...],
///     ages: [...],
///     population: PopulationData(food_resource: "food"),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentData {
    /// Name of the content set, shown in listings.
    #[serde(default = "default_name")]
    pub name: String,

    /// Every resource kind. This list is the complete, fixed set.
    pub resources: Vec<ResourceData>,

    /// Every building type.
    #[serde(default)]
    pub buildings: Vec<BuildingData>,

    /// Every technology.
    #[serde(default)]
    pub technologies: Vec<TechData>,

    /// Ages in order. The first is the starting age.
    pub ages: Vec<AgeData>,

    /// Population rules.
    pub population: PopulationData,
}

fn default_name() -> String {
    "Custom".to_string()
}

impl ContentData {
    /// Load content from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ContentError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ContentError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ContentError> {
        let content: ContentData = ron::from_str(ron)?;
        Ok(content)
    }

    /// Serialize as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ContentError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ContentError::Invalid(e.to_string()))
    }

    /// Find a resource by its ID.
    #[must_use]
    pub fn get_resource(&self, id: &str) -> Option<&ResourceData> {
        self.resources.iter().find(|r| r.id.as_str() == id)
    }

    /// Find a building by its ID.
    #[must_use]
    pub fn get_building(&self, id: &str) -> Option<&BuildingData> {
        self.buildings.iter().find(|b| b.id.as_str() == id)
    }

    /// Find a technology by its ID.
    #[must_use]
    pub fn get_technology(&self, id: &str) -> Option<&TechData> {
        self.technologies.iter().find(|t| t.id.as_str() == id)
    }

    /// Find an age by its ID.
    #[must_use]
    pub fn get_age(&self, id: &str) -> Option<&AgeData> {
        self.ages.iter().find(|a| a.id.as_str() == id)
    }

    /// Validate internal consistency.
    ///
    /// Checks for:
    /// - Ids that are not lowercase or contain whitespace
    /// - Duplicate ids
    /// - References to unknown resources, buildings, techs and ages
    /// - Zero build and research times
    /// - Negative capacities and starting amounts
    /// - Cycles in tech prerequisites
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.resources.is_empty() {
            return Err(ContentError::Empty("resources"));
        }
        if self.ages.is_empty() {
            return Err(ContentError::Empty("ages"));
        }

        let resources = unique_ids("resource", self.resources.iter().map(|r| r.id.as_str()))?;
        let buildings = unique_ids("building", self.buildings.iter().map(|b| b.id.as_str()))?;
        let techs = unique_ids("tech", self.technologies.iter().map(|t| t.id.as_str()))?;
        let ages = unique_ids("age", self.ages.iter().map(|a| a.id.as_str()))?;
        unique_ids(
            "person kind",
            self.population.kinds.iter().map(|k| k.id.as_str()),
        )?;

        for resource in &self.resources {
            let owner = format!("resource '{}'", resource.id);
            if resource.starting_amount < Fixed::ZERO {
                return Err(invalid(&owner, "starting amount is negative"));
            }
            if resource.gather_rate < Fixed::ZERO {
                return Err(invalid(&owner, "gather rate is negative"));
            }
            if resource.base_capacity.is_some_and(|cap| cap < Fixed::ZERO) {
                return Err(invalid(&owner, "base capacity is negative"));
            }
            for (target, percent) in &resource.side_yield {
                check_ref(&resources, &owner, "resource", target.as_str())?;
                if target == &resource.id {
                    return Err(invalid(&owner, "side yield into itself"));
                }
                if *percent < 0 {
                    return Err(invalid(&owner, "side yield is negative"));
                }
            }
        }

        for building in &self.buildings {
            let owner = format!("building '{}'", building.id);
            if building.build_time == 0 {
                return Err(ContentError::ZeroDuration(owner));
            }
            for kind in building.referenced_resources() {
                check_ref(&resources, &owner, "resource", kind.as_str())?;
            }
            if let Some(tech) = &building.tech_required {
                check_ref(&techs, &owner, "tech", tech.as_str())?;
            }
            if building.cost.iter().any(|(_, v)| *v < Fixed::ZERO) {
                return Err(invalid(&owner, "cost is negative"));
            }
            if building.storage.iter().any(|(_, v)| *v < Fixed::ZERO) {
                return Err(invalid(&owner, "storage is negative"));
            }
        }

        for tech in &self.technologies {
            let owner = format!("tech '{}'", tech.id);
            if tech.research_time == 0 {
                return Err(ContentError::ZeroDuration(owner));
            }
            for kind in tech.cost.kinds() {
                check_ref(&resources, &owner, "resource", kind.as_str())?;
            }
            if tech.cost.iter().any(|(_, v)| *v < Fixed::ZERO) {
                return Err(invalid(&owner, "cost is negative"));
            }
            for prereq in &tech.prerequisites {
                check_ref(&techs, &owner, "tech", prereq.as_str())?;
            }
            if let Some(age) = &tech.required_age {
                check_ref(&ages, &owner, "age", age.as_str())?;
            }
            for effect in &tech.effects {
                if let Some(kind) = effect.resource() {
                    check_ref(&resources, &owner, "resource", kind.as_str())?;
                }
                if let TechEffect::CapacityFlat { amount, .. } = effect {
                    if *amount < Fixed::ZERO {
                        return Err(invalid(&owner, "capacity bonus is negative"));
                    }
                }
            }
        }

        for age in &self.ages {
            let owner = format!("age '{}'", age.id);
            for kind in age.requirements.resources.kinds() {
                check_ref(&resources, &owner, "resource", kind.as_str())?;
            }
            for building in age.requirements.buildings.keys() {
                check_ref(&buildings, &owner, "building", building.as_str())?;
            }
        }

        let population = &self.population;
        check_ref(
            &resources,
            "population",
            "resource",
            population.food_resource.as_str(),
        )?;
        if population.kinds.is_empty() {
            return Err(ContentError::Empty("kinds of people"));
        }
        for kind in &population.kinds {
            let owner = format!("person kind '{}'", kind.id);
            for resource in kind.referenced_resources() {
                check_ref(&resources, &owner, "resource", resource.as_str())?;
            }
            if let Some(age) = &kind.required_age {
                check_ref(&ages, &owner, "age", age.as_str())?;
            }
            if kind.upkeep < Fixed::ZERO {
                return Err(invalid(&owner, "upkeep is negative"));
            }
            if kind.recruit_cost.iter().any(|(_, v)| *v < Fixed::ZERO) {
                return Err(invalid(&owner, "recruit cost is negative"));
            }
            if kind.gather_percent.values().any(|p| *p < 0) {
                return Err(invalid(&owner, "gather percent is negative"));
            }
        }

        if let Some(cycle) = find_cycle(&self.technologies) {
            return Err(ContentError::CyclicPrerequisites(cycle));
        }

        Ok(())
    }

    /// Ids of all defined resources, in lexicographic order.
    #[must_use]
    pub fn resource_ids(&self) -> Vec<ResourceKind> {
        let set: BTreeSet<_> = self.resources.iter().map(|r| r.id.clone()).collect();
        set.into_iter().collect()
    }

    /// Ids of all defined buildings, in lexicographic order.
    #[must_use]
    pub fn building_ids(&self) -> Vec<BuildingId> {
        let set: BTreeSet<_> = self.buildings.iter().map(|b| b.id.clone()).collect();
        set.into_iter().collect()
    }

    /// Ids of all defined techs, in lexicographic order.
    #[must_use]
    pub fn tech_ids(&self) -> Vec<TechId> {
        let set: BTreeSet<_> = self.technologies.iter().map(|t| t.id.clone()).collect();
        set.into_iter().collect()
    }

    /// Id of the starting age.
    #[must_use]
    pub fn first_age(&self) -> Option<&AgeId> {
        self.ages.first().map(|a| &a.id)
    }
}

fn unique_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<BTreeSet<&'a str>, ContentError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.is_empty() || id.chars().any(|c| c.is_uppercase() || c.is_whitespace()) {
            return Err(invalid(
                &format!("{kind} '{id}'"),
                "ids must be lowercase without spaces",
            ));
        }
        if !seen.insert(id) {
            return Err(ContentError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

fn check_ref(
    known: &BTreeSet<&str>,
    owner: &str,
    kind: &'static str,
    id: &str,
) -> Result<(), ContentError> {
    if known.contains(id) {
        Ok(())
    } else {
        Err(ContentError::UnknownReference {
            owner: owner.to_string(),
            kind,
            id: id.to_string(),
        })
    }
}

fn invalid(owner: &str, reason: &str) -> ContentError {
    ContentError::InvalidValue {
        owner: owner.to_string(),
        reason: reason.to_string(),
    }
}
