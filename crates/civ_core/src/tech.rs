//! Technology graph and research.
//!
//! Techs form a directed acyclic graph through their prerequisites. The
//! graph is checked for cycles once, when content is loaded. A tech is
//! researchable when every prerequisite is unlocked and the required age
//! has been reached. Unlocking is permanent.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::{ContentError, TechData, TechEffect};
use crate::error::ValidationError;
use crate::ids::TechId;
use crate::jobs::{JobId, JobKind};
use crate::rules::Ruleset;
use crate::state::GameState;

/// Indexed tech definitions.
#[derive(Debug, Clone, Default)]
pub struct TechGraph {
    techs: BTreeMap<TechId, TechData>,
}

impl TechGraph {
    /// Build the graph, rejecting prerequisite cycles.
    pub fn new(techs: &[TechData]) -> Result<Self, ContentError> {
        if let Some(cycle) = find_cycle(techs) {
            return Err(ContentError::CyclicPrerequisites(cycle));
        }
        Ok(Self {
            techs: techs.iter().map(|t| (t.id.clone(), t.clone())).collect(),
        })
    }

    /// Get a tech by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TechData> {
        self.techs.get(id)
    }

    /// Check if a tech exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.techs.contains_key(id)
    }

    /// All techs in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &TechData> {
        self.techs.values()
    }

    /// Number of techs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.techs.len()
    }

    /// Check if the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.techs.is_empty()
    }

    /// Whether every prerequisite of `id` is unlocked.
    ///
    /// Ignores the age gate; see [`validate_research`] for the full check.
    #[must_use]
    pub fn is_researchable(&self, id: &str, unlocked: &BTreeSet<TechId>) -> bool {
        self.techs
            .get(id)
            .is_some_and(|tech| tech.prerequisites.iter().all(|p| unlocked.contains(p)))
    }

    /// Effects of every unlocked tech, in lexicographic tech order.
    pub fn unlocked_effects<'a>(
        &'a self,
        unlocked: &'a BTreeSet<TechId>,
    ) -> impl Iterator<Item = &'a TechEffect> + 'a {
        unlocked
            .iter()
            .filter_map(|id| self.techs.get(id))
            .flat_map(|tech| tech.effects.iter())
    }

    /// Techs in an order where every prerequisite comes before its
    /// dependents. Ties break lexicographically.
    #[must_use]
    pub fn research_order(&self) -> Vec<&TechId> {
        let mut placed: BTreeSet<&TechId> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.techs.len());

        while order.len() < self.techs.len() {
            let ready: Vec<&TechId> = self
                .techs
                .values()
                .filter(|t| !placed.contains(&t.id))
                .filter(|t| {
                    t.prerequisites
                        .iter()
                        .all(|p| placed.contains(p) || !self.techs.contains_key(p))
                })
                .map(|t| &t.id)
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                placed.insert(id);
                order.push(id);
            }
        }

        order
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Find one prerequisite cycle, if any.
///
/// The returned path starts and ends with the same tech, e.g.
/// `[a, b, a]`. Traversal is lexicographic so the reported cycle is
/// stable for the same content.
#[must_use]
pub fn find_cycle(techs: &[TechData]) -> Option<Vec<TechId>> {
    let graph: BTreeMap<&TechId, &[TechId]> = techs
        .iter()
        .map(|t| (&t.id, t.prerequisites.as_slice()))
        .collect();
    let mut marks = BTreeMap::new();
    let mut path = Vec::new();

    graph
        .keys()
        .find_map(|&id| visit(id, &graph, &mut marks, &mut path))
}

fn visit<'a>(
    id: &'a TechId,
    graph: &BTreeMap<&'a TechId, &'a [TechId]>,
    marks: &mut BTreeMap<&'a TechId, Mark>,
    path: &mut Vec<&'a TechId>,
) -> Option<Vec<TechId>> {
    match marks.get(id) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            let start = path.iter().position(|p| *p == id)?;
            let mut cycle: Vec<TechId> = path[start..].iter().map(|t| (*t).clone()).collect();
            cycle.push(id.clone());
            return Some(cycle);
        }
        None => {}
    }

    marks.insert(id, Mark::Visiting);
    path.push(id);
    if let Some(&prerequisites) = graph.get(id) {
        for prereq in prerequisites {
            if let Some(cycle) = visit(prereq, graph, marks, path) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    marks.insert(id, Mark::Done);
    None
}

/// Check whether research of `id` may start. Pure.
///
/// Checks, in order: the tech exists, it is not already unlocked, it is not
/// already being researched, prerequisites and age are met, and the cost is
/// affordable.
pub fn validate_research<'r>(
    state: &GameState,
    rules: &'r Ruleset,
    id: &str,
) -> Result<&'r TechData, ValidationError> {
    let tech = rules
        .techs()
        .get(id)
        .ok_or_else(|| ValidationError::UnknownType { id: id.to_string() })?;

    if state.unlocked.contains(id) {
        return Err(ValidationError::AlreadyUnlocked(tech.id.clone()));
    }
    if state.jobs.is_researching(id) {
        return Err(ValidationError::AlreadyResearching(tech.id.clone()));
    }

    let mut missing: Vec<String> = tech
        .prerequisites
        .iter()
        .filter(|p| !state.unlocked.contains(*p))
        .map(ToString::to_string)
        .collect();
    if let Some(age) = &tech.required_age {
        if !rules.ages().is_reached(age.as_str(), state.age.as_str()) {
            missing.push(age.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(ValidationError::PrerequisitesNotMet {
            tech: tech.id.clone(),
            missing,
        });
    }

    state.resources.check_affordable(&tech.cost)?;
    Ok(tech)
}

/// Deduct the cost of `id` and enqueue a research job.
///
/// All-or-nothing: on error nothing has changed.
pub fn start_research(
    state: &mut GameState,
    rules: &Ruleset,
    id: &str,
) -> Result<JobId, ValidationError> {
    let tech = validate_research(state, rules, id)?;
    state.resources.deduct(&tech.cost)?;
    let job = state
        .jobs
        .enqueue(JobKind::Research(tech.id.clone()), tech.research_time);
    tracing::debug!(tech = %tech.id, job, "research started");
    Ok(job)
}

/// Unlock a tech. Returns `false` if it was already unlocked.
pub fn unlock(state: &mut GameState, tech: &TechId) -> bool {
    state.unlocked.insert(tech.clone())
}
