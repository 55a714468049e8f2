//! Content file validation.

use std::fmt;
use std::path::Path;

use civ_core::data::{ContentData, ContentError};
use civ_core::rules::Ruleset;

/// What a valid content file defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
    /// Content name.
    pub name: String,
    /// Number of resource kinds.
    pub resources: usize,
    /// Number of building types.
    pub buildings: usize,
    /// Number of technologies.
    pub technologies: usize,
    /// Number of ages.
    pub ages: usize,
}

impl ContentSummary {
    fn of(content: &ContentData) -> Self {
        Self {
            name: content.name.clone(),
            resources: content.resources.len(),
            buildings: content.buildings.len(),
            technologies: content.technologies.len(),
            ages: content.ages.len(),
        }
    }
}

impl fmt::Display for ContentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} resources, {} buildings, {} technologies, {} ages",
            self.name, self.resources, self.buildings, self.technologies, self.ages
        )
    }
}

/// Validate content, building the full ruleset so every check runs.
pub fn validate_content(content: ContentData) -> Result<ContentSummary, ContentError> {
    let summary = ContentSummary::of(&content);
    Ruleset::new(content)?;
    Ok(summary)
}

/// Load and validate a RON content file.
pub fn validate_content_file(path: &Path) -> Result<ContentSummary, ContentError> {
    validate_content(ContentData::load(path)?)
}
