//! Validated, indexed game content.
//!
//! A [`Ruleset`] is built once from [`ContentData`] and is immutable for
//! the lifetime of an engine.

use std::collections::BTreeMap;

use crate::ages::AgeTrack;
use crate::buildings::BuildingRegistry;
use crate::data::{ContentData, ContentError, PopulationData, ResourceData};
use crate::ids::ResourceKind;
use crate::tech::TechGraph;

/// Content after validation.
#[derive(Debug, Clone)]
pub struct Ruleset {
    content: ContentData,
    resources: BTreeMap<ResourceKind, ResourceData>,
    buildings: BuildingRegistry,
    techs: TechGraph,
    ages: AgeTrack,
}

impl Ruleset {
    /// Validate content and index it.
    pub fn new(content: ContentData) -> Result<Self, ContentError> {
        content.validate()?;

        let resources = content
            .resources
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        let buildings = content.buildings.iter().cloned().collect();
        let techs = TechGraph::new(&content.technologies)?;
        let ages = AgeTrack::new(content.ages.clone());

        tracing::debug!(
            content = %content.name,
            resources = content.resources.len(),
            buildings = content.buildings.len(),
            techs = content.technologies.len(),
            ages = content.ages.len(),
            "ruleset built"
        );

        Ok(Self {
            content,
            resources,
            buildings,
            techs,
            ages,
        })
    }

    /// The built-in content set.
    pub fn classic() -> Result<Self, ContentError> {
        Self::new(ContentData::classic())
    }

    /// The content this ruleset was built from.
    #[must_use]
    pub fn content(&self) -> &ContentData {
        &self.content
    }

    /// Name of the content set.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.content.name
    }

    /// Get a resource definition by ID.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&ResourceData> {
        self.resources.get(id)
    }

    /// All resource definitions in lexicographic order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceData> {
        self.resources.values()
    }

    /// Building catalog.
    #[must_use]
    pub fn buildings(&self) -> &BuildingRegistry {
        &self.buildings
    }

    /// Tech graph.
    #[must_use]
    pub fn techs(&self) -> &TechGraph {
        &self.techs
    }

    /// Age track.
    #[must_use]
    pub fn ages(&self) -> &AgeTrack {
        &self.ages
    }

    /// Population rules.
    #[must_use]
    pub fn population(&self) -> &PopulationData {
        &self.content.population
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_ruleset() {
        let rules = Ruleset::classic().unwrap();
        assert_eq!(rules.name(), "Classic");
        assert!(rules.resource("food").is_some());
        assert!(rules.buildings().contains("hut"));
        assert!(rules.techs().contains("agriculture"));
        assert_eq!(rules.ages().first().map(|a| a.id.as_str()), Some("stone"));

        let ids: Vec<&str> = rules.resources().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["food", "gold", "hunting", "knowledge", "stone", "wood"]);
    }

    #[test]
    fn test_invalid_content_is_rejected() {
        let mut content = ContentData::classic();
        content.population.food_resource = "mana".into();
        assert!(Ruleset::new(content).is_err());
    }
}
