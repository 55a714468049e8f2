//! String identifiers for content-defined types.
//!
//! Every identifier orders lexicographically, which is the iteration order
//! the tick uses whenever it walks resources, buildings or techs.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! content_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

content_id!(
    /// Identifier of a resource kind (e.g. `food`, `wood`).
    ResourceKind
);

content_id!(
    /// Identifier of a building type (e.g. `hut`, `farm`).
    BuildingId
);

content_id!(
    /// Identifier of a technology (e.g. `agriculture`).
    TechId
);

content_id!(
    /// Identifier of an age (e.g. `stone_age`).
    AgeId
);

content_id!(
    /// Identifier of a kind of person (e.g. `villager`, `scholar`).
    PersonKind
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_ids_order_lexicographically() {
        let mut map = BTreeMap::new();
        map.insert(ResourceKind::from("wood"), 1);
        map.insert(ResourceKind::from("food"), 2);
        map.insert(ResourceKind::from("gold"), 3);

        let order: Vec<&str> = map.keys().map(ResourceKind::as_str).collect();
        assert_eq!(order, vec!["food", "gold", "wood"]);
    }

    #[test]
    fn test_borrow_lookup() {
        let mut map = BTreeMap::new();
        map.insert(BuildingId::from("hut"), 1);
        assert_eq!(map.get("hut"), Some(&1));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let text = ron::to_string(&TechId::from("writing")).unwrap();
        assert_eq!(text, "\"writing\"");
    }
}
