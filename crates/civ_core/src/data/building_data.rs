//! Building data structures for data-driven building definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{BuildingId, ResourceKind, TechId};
use crate::resources::ResourceBundle;

/// Data-driven building definition.
///
/// Production deltas apply per owned, completed unit. A negative delta is
/// consumption.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "farm",
///     name: "Farm",
///     description: "Cultivated fields that feed the settlement.",
///     cost: { "wood": 100, "stone": 50, "food": 100 },
///     build_time: 10,
///     production: { "food": "3.5" },
///     gather_bonus: { "food": 8 },
///     tech_required: Some("agriculture"),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique identifier for this building type.
    pub id: BuildingId,

    /// Display name.
    pub name: String,

    /// Flavour text shown in listings.
    #[serde(default)]
    pub description: String,

    /// Resources deducted when construction starts.
    #[serde(default)]
    pub cost: ResourceBundle,

    /// Construction time in ticks. Must be at least one.
    #[serde(default = "default_build_time")]
    pub build_time: u32,

    /// Per-tick resource deltas contributed by each completed unit.
    #[serde(default)]
    pub production: ResourceBundle,

    /// Extra population capacity per completed unit.
    #[serde(default)]
    pub housing: u32,

    /// Extra storage capacity per completed unit.
    #[serde(default)]
    pub storage: ResourceBundle,

    /// Percent bonus to worker gathering per completed unit.
    #[serde(default)]
    pub gather_bonus: BTreeMap<ResourceKind, i32>,

    /// Tech that must be unlocked before this building can be started.
    #[serde(default)]
    pub tech_required: Option<TechId>,
}

/// Default construction time.
const fn default_build_time() -> u32 {
    1
}

impl BuildingData {
    /// Create a building with no cost, effects or prerequisite.
    #[must_use]
    pub fn new(id: impl Into<BuildingId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            cost: ResourceBundle::new(),
            build_time: default_build_time(),
            production: ResourceBundle::new(),
            housing: 0,
            storage: ResourceBundle::new(),
            gather_bonus: BTreeMap::new(),
            tech_required: None,
        }
    }

    /// Every resource kind this definition mentions.
    pub fn referenced_resources(&self) -> impl Iterator<Item = &ResourceKind> {
        self.cost
            .kinds()
            .chain(self.production.kinds())
            .chain(self.storage.kinds())
            .chain(self.gather_bonus.keys())
    }

    /// Gather bonus percent for one resource.
    #[must_use]
    pub fn gather_bonus_for(&self, resource: &str) -> i32 {
        self.gather_bonus.get(resource).copied().unwrap_or(0)
    }
}
