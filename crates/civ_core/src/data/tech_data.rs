//! Tech tree data structures for data-driven technology definitions.

use serde::{Deserialize, Serialize};

use crate::ids::{AgeId, ResourceKind, TechId};
use crate::math::{decimal_serde, Amount};
use crate::resources::ResourceBundle;

/// Permanent effect granted once a technology is unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechEffect {
    /// Scale building production of a resource by a percentage.
    ProductionPercent {
        /// Affected resource.
        resource: ResourceKind,
        /// Percentage modifier (e.g., 20 for +20%).
        percent: i32,
    },

    /// Scale worker gathering of a resource by a percentage.
    GatherPercent {
        /// Affected resource.
        resource: ResourceKind,
        /// Percentage modifier.
        percent: i32,
    },

    /// Raise the storage capacity of a resource.
    CapacityFlat {
        /// Affected resource.
        resource: ResourceKind,
        /// Flat amount added to the capacity.
        #[serde(with = "decimal_serde")]
        amount: Amount,
    },

    /// Raise population housing.
    HousingFlat(u32),
}

impl TechEffect {
    /// Resource this effect targets, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&ResourceKind> {
        match self {
            Self::ProductionPercent { resource, .. }
            | Self::GatherPercent { resource, .. }
            | Self::CapacityFlat { resource, .. } => Some(resource),
            Self::HousingFlat(_) => None,
        }
    }
}

/// Data-driven technology definition.
///
/// # Example RON
///
/// ```ron
/// TechData(
///     id: "mathematics",
///     name: "Mathematics",
///     description: "Numbers make trade and construction precise.",
///     cost: { "knowledge": 60 },
///     research_time: 30,
///     prerequisites: ["writing"],
///     required_age: Some("iron"),
///     effects: [GatherPercent(resource: "gold", percent: 10)],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechData {
    /// Unique identifier for this technology.
    pub id: TechId,

    /// Display name.
    pub name: String,

    /// Flavour text shown in listings.
    #[serde(default)]
    pub description: String,

    /// Resources deducted when research starts.
    #[serde(default)]
    pub cost: ResourceBundle,

    /// Research time in ticks. Must be at least one.
    #[serde(default = "default_research_time")]
    pub research_time: u32,

    /// Technology IDs that must be unlocked first.
    #[serde(default)]
    pub prerequisites: Vec<TechId>,

    /// Age that must have been reached first.
    #[serde(default)]
    pub required_age: Option<AgeId>,

    /// Effects granted when research completes.
    #[serde(default)]
    pub effects: Vec<TechEffect>,
}

/// Default research time.
const fn default_research_time() -> u32 {
    1
}

impl TechData {
    /// Create a technology with no cost, prerequisites or effects.
    #[must_use]
    pub fn new(id: impl Into<TechId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            cost: ResourceBundle::new(),
            research_time: default_research_time(),
            prerequisites: Vec::new(),
            required_age: None,
            effects: Vec::new(),
        }
    }

    /// Check if this technology has a specific prerequisite.
    #[must_use]
    pub fn requires(&self, tech_id: &str) -> bool {
        self.prerequisites.iter().any(|t| t.as_str() == tech_id)
    }
}
