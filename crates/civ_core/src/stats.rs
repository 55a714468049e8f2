//! Lifetime statistics and the event chronicle.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{BuildingId, ResourceKind};
use crate::math::{fixed_map_serde, Amount, Fixed};

/// Number of events kept in the chronicle.
pub const CHRONICLE_LEN: usize = 200;

/// Category of a chronicle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A construction job was started.
    ConstructionStarted,
    /// A building was completed.
    ConstructionCompleted,
    /// A research job was started.
    ResearchStarted,
    /// A technology was unlocked.
    TechUnlocked,
    /// The settlement entered a new age.
    AgeAdvanced,
    /// People were recruited.
    Recruited,
    /// Worker assignments changed.
    Assigned,
    /// A person was lost to starvation.
    Starvation,
}

/// One chronicle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick at which it happened.
    pub tick: u64,
    /// Category.
    pub kind: EventKind,
    /// Human-readable description.
    pub message: String,
}

/// Totals accumulated over the whole game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    /// Gross income per resource (production plus gathering).
    #[serde(with = "fixed_map_serde")]
    pub gathered: BTreeMap<ResourceKind, Amount>,
    /// Completed buildings per type.
    pub buildings_completed: BTreeMap<BuildingId, u32>,
    /// Techs unlocked.
    pub techs_researched: u32,
    /// People recruited.
    pub recruited: u32,
    /// People lost to starvation.
    pub starved: u32,
    /// Ages advanced through.
    pub ages_reached: u32,
    /// Most recent events, oldest first.
    pub chronicle: VecDeque<GameEvent>,
}

impl GameStats {
    /// Create empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, dropping the oldest past [`CHRONICLE_LEN`].
    pub fn record(&mut self, tick: u64, kind: EventKind, message: impl Into<String>) {
        if self.chronicle.len() == CHRONICLE_LEN {
            self.chronicle.pop_front();
        }
        self.chronicle.push_back(GameEvent {
            tick,
            kind,
            message: message.into(),
        });
    }

    /// Add one tick of gross income. Totals saturate at [`Fixed::MAX`].
    pub fn add_income(&mut self, income: &BTreeMap<ResourceKind, Fixed>) {
        for (resource, amount) in income {
            if *amount > Fixed::ZERO {
                let total = self.gathered.entry(resource.clone()).or_insert(Fixed::ZERO);
                *total = total.saturating_add(*amount);
            }
        }
    }

    /// Count a completed building.
    pub fn add_building(&mut self, building: &BuildingId) {
        let count = self.buildings_completed.entry(building.clone()).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Total buildings completed of every type.
    #[must_use]
    pub fn total_buildings(&self) -> u32 {
        self.buildings_completed.values().sum()
    }

    /// The latest `n` events, newest last.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &GameEvent> {
        self.chronicle.iter().skip(self.chronicle.len().saturating_sub(n))
    }
}
