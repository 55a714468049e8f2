//! Resource kind definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ResourceKind;
use crate::math::{decimal_serde, option_decimal_serde, Amount, Fixed};

/// Data-driven definition of one resource kind.
///
/// # Example RON
///
/// ```ron
/// ResourceData(
///     id: "stone",
///     name: "Stone",
///     base_capacity: Some("500"),
///     gather_rate: "0.5",
/// )
/// ```
///
/// A resource may feed a second one while it is gathered. Hunting that
/// also brings in 40% of its base rate as food:
///
/// ```ron
/// ResourceData(
///     id: "hunting",
///     name: "Hunting",
///     gather_rate: "1.8",
///     side_yield: { "food": 40 },
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Unique identifier.
    pub id: ResourceKind,

    /// Display name.
    pub name: String,

    /// Storage limit before buildings and techs. `None` is unbounded.
    #[serde(default, with = "option_decimal_serde")]
    pub base_capacity: Option<Amount>,

    /// Amount one assigned worker gathers per tick.
    #[serde(default = "default_gather_rate", with = "decimal_serde")]
    pub gather_rate: Amount,

    /// Whether workers may be assigned to gather this resource.
    #[serde(default = "default_gatherable")]
    pub gatherable: bool,

    /// Stockpile at the start of a new game.
    #[serde(default = "default_starting_amount", with = "decimal_serde")]
    pub starting_amount: Amount,

    /// Percent of the base gather rate each worker on this resource also
    /// adds to another resource. Gather bonuses do not apply to it.
    #[serde(default)]
    pub side_yield: BTreeMap<ResourceKind, i32>,
}

const fn default_gather_rate() -> Amount {
    Fixed::ONE
}

const fn default_gatherable() -> bool {
    true
}

const fn default_starting_amount() -> Amount {
    Fixed::ZERO
}

impl ResourceData {
    /// Create a gatherable resource with a gather rate of one and no cap.
    #[must_use]
    pub fn new(id: impl Into<ResourceKind>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_capacity: None,
            gather_rate: default_gather_rate(),
            gatherable: default_gatherable(),
            starting_amount: default_starting_amount(),
            side_yield: BTreeMap::new(),
        }
    }

    /// Builder-style base capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: Amount) -> Self {
        self.base_capacity = Some(capacity);
        self
    }

    /// Builder-style gather rate.
    #[must_use]
    pub fn with_gather_rate(mut self, rate: Amount) -> Self {
        self.gather_rate = rate;
        self
    }

    /// Builder-style starting amount.
    #[must_use]
    pub fn with_starting(mut self, amount: Amount) -> Self {
        self.starting_amount = amount;
        self
    }

    /// Builder-style side yield into `resource`.
    #[must_use]
    pub fn with_side_yield(mut self, resource: impl Into<ResourceKind>, percent: i32) -> Self {
        self.side_yield.insert(resource.into(), percent);
        self
    }

    /// Mark the resource as not gatherable by workers.
    #[must_use]
    pub fn not_gatherable(mut self) -> Self {
        self.gatherable = false;
        self
    }
}
