//! Age progression data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{AgeId, BuildingId};
use crate::resources::ResourceBundle;

/// What a settlement must hold to enter an age.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRequirements {
    /// Minimum stockpiles. Not consumed on advancement.
    #[serde(default)]
    pub resources: ResourceBundle,

    /// Minimum owned building counts.
    #[serde(default)]
    pub buildings: BTreeMap<BuildingId, u32>,
}

/// One step of the age track.
///
/// Ages are listed in order; the first one is the starting age and has no
/// requirements.
///
/// # Example RON
///
/// ```ron
/// AgeData(
///     id: "bronze",
///     name: "Bronze Age",
///     requirements: (
///         resources: { "stone": 50, "food": 100 },
///         buildings: { "hut": 3, "farm": 2 },
///     ),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeData {
    /// Unique identifier.
    pub id: AgeId,

    /// Display name.
    pub name: String,

    /// Requirements to advance into this age.
    #[serde(default)]
    pub requirements: AgeRequirements,
}

impl AgeData {
    /// Create an age with no requirements.
    #[must_use]
    pub fn new(id: impl Into<AgeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            requirements: AgeRequirements::default(),
        }
    }
}
