//! Population parameters and kinds of people.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{AgeId, PersonKind, ResourceKind};
use crate::math::{decimal_serde, Amount};
use crate::resources::ResourceBundle;

/// Rules for the settlement's people.
///
/// The first kind listed is the default for `assign` and `recruit`
/// commands that name no kind.
///
/// # Example RON
///
/// ```ron
/// PopulationData(
///     base_housing: 1,
///     food_resource: "food",
///     kinds: [
///         PersonKindData(
///             id: "villager",
///             name: "Villager",
///             starting: 1,
///             upkeep: "0.5",
///             recruit_cost: { "food": 10 },
///             gather_percent: { "knowledge": 20 },
///         ),
///         PersonKindData(
///             id: "scholar",
///             name: "Scholar",
///             upkeep: "0.75",
///             gathers: Some(["knowledge"]),
///             gather_percent: { "knowledge": 150 },
///             required_age: Some("medieval"),
///         ),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationData {
    /// Housing available before any building.
    #[serde(default = "default_base_housing")]
    pub base_housing: u32,

    /// Resource eaten as upkeep. Running out of it starves people.
    pub food_resource: ResourceKind,

    /// Kinds of people, the default first.
    pub kinds: Vec<PersonKindData>,
}

const fn default_base_housing() -> u32 {
    1
}

impl PopulationData {
    /// Population rules with one free `villager` kind that eats nothing.
    #[must_use]
    pub fn new(food_resource: impl Into<ResourceKind>) -> Self {
        Self {
            base_housing: default_base_housing(),
            food_resource: food_resource.into(),
            kinds: vec![PersonKindData::new("villager", "Villager").with_starting(1)],
        }
    }

    /// The kind used when a command names none.
    #[must_use]
    pub fn default_kind(&self) -> Option<&PersonKindData> {
        self.kinds.first()
    }

    /// Find a kind by its ID.
    #[must_use]
    pub fn kind(&self, id: &str) -> Option<&PersonKindData> {
        self.kinds.iter().find(|k| k.id.as_str() == id)
    }

    /// Mutable access to a kind, for building content in code.
    pub fn kind_mut(&mut self, id: &str) -> Option<&mut PersonKindData> {
        self.kinds.iter_mut().find(|k| k.id.as_str() == id)
    }

    /// Head count of a new game.
    #[must_use]
    pub fn starting_total(&self) -> u32 {
        self.kinds
            .iter()
            .map(|k| k.starting)
            .fold(0, u32::saturating_add)
    }
}

/// One kind of person: what it eats, costs and may gather.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonKindData {
    /// Unique identifier.
    pub id: PersonKind,

    /// Display name.
    pub name: String,

    /// People of this kind at the start of a new game.
    #[serde(default)]
    pub starting: u32,

    /// Food eaten per person per tick.
    #[serde(default, with = "decimal_serde")]
    pub upkeep: Amount,

    /// Cost of recruiting one person.
    #[serde(default)]
    pub recruit_cost: ResourceBundle,

    /// Resources this kind may gather. `None` allows every gatherable one.
    #[serde(default)]
    pub gathers: Option<Vec<ResourceKind>>,

    /// Percent of a resource's gather rate this kind achieves. Resources
    /// not listed gather at 100.
    #[serde(default)]
    pub gather_percent: BTreeMap<ResourceKind, i32>,

    /// Age that must be reached before this kind can be recruited.
    #[serde(default)]
    pub required_age: Option<AgeId>,
}

impl PersonKindData {
    /// A kind that eats nothing, costs nothing and may gather anything.
    #[must_use]
    pub fn new(id: impl Into<PersonKind>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            starting: 0,
            upkeep: Amount::ZERO,
            recruit_cost: ResourceBundle::new(),
            gathers: None,
            gather_percent: BTreeMap::new(),
            required_age: None,
        }
    }

    /// Builder-style starting head count.
    #[must_use]
    pub fn with_starting(mut self, starting: u32) -> Self {
        self.starting = starting;
        self
    }

    /// Builder-style upkeep.
    #[must_use]
    pub fn with_upkeep(mut self, upkeep: Amount) -> Self {
        self.upkeep = upkeep;
        self
    }

    /// Whether this kind may be assigned to `resource`. Does not check that
    /// the resource itself is gatherable.
    #[must_use]
    pub fn can_gather(&self, resource: &str) -> bool {
        self.gathers
            .as_ref()
            .map_or(true, |list| list.iter().any(|r| r.as_str() == resource))
    }

    /// Percent of the base gather rate for `resource`.
    #[must_use]
    pub fn gather_percent_for(&self, resource: &str) -> i32 {
        self.gather_percent.get(resource).copied().unwrap_or(100)
    }

    /// Resources named anywhere in this kind.
    pub fn referenced_resources(&self) -> impl Iterator<Item = &ResourceKind> {
        self.recruit_cost
            .kinds()
            .chain(self.gathers.iter().flatten())
            .chain(self.gather_percent.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults_from_ron() {
        let data: PersonKindData = ron::from_str(r#"(id: "villager", name: "Villager")"#).unwrap();
        assert_eq!(data.starting, 0);
        assert_eq!(data.upkeep, Amount::ZERO);
        assert!(data.can_gather("wood"));
        assert_eq!(data.gather_percent_for("wood"), 100);
        assert_eq!(data.required_age, None);
    }

    #[test]
    fn test_restricted_kind() {
        let data: PersonKindData = ron::from_str(
            r#"(
                id: "scholar",
                name: "Scholar",
                upkeep: "0.75",
                gathers: Some(["knowledge"]),
                gather_percent: {"knowledge": 150},
                required_age: Some("medieval"),
            )"#,
        )
        .unwrap();
        assert!(data.can_gather("knowledge"));
        assert!(!data.can_gather("wood"));
        assert_eq!(data.gather_percent_for("knowledge"), 150);
        assert_eq!(data.upkeep, "0.75".parse::<Amount>().unwrap());
    }

    #[test]
    fn test_first_kind_is_default() {
        let mut population = PopulationData::new("food");
        population
            .kinds
            .push(PersonKindData::new("scholar", "Scholar").with_starting(2));

        assert_eq!(
            population.default_kind().map(|k| k.id.as_str()),
            Some("villager")
        );
        assert!(population.kind("scholar").is_some());
        assert!(population.kind("noble").is_none());
        assert_eq!(population.starting_total(), 3);
    }
}
