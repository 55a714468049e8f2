//! The game engine: sole owner of the game state.
//!
//! All mutation goes through two entry points, [`GameEngine::tick`] and
//! [`GameEngine::submit`]. Each runs against a working copy of the state;
//! the copy replaces the committed state only after every invariant has
//! been re-checked. On any error the working copy is dropped and the
//! committed state is untouched.
//!
//! # Tick Order
//!
//! Each tick runs in this order:
//! 1. **Resources** - rates from buildings owned at the start of the tick,
//!    gathering and upkeep are applied and clamped
//! 2. **Starvation** - if food ran short, one person is lost
//! 3. **Jobs** - every job loses a tick; finished ones complete in
//!    enqueue order
//! 4. **Ages** - advance at most one age if requirements are met
//! 5. **Counter** - the tick counter increments
//!
//! # Example
//!
//! ```
//! use civ_core::data::ContentData;
//! use civ_core::engine::GameEngine;
//!
//! let mut engine = GameEngine::new(ContentData::classic()).unwrap();
//! engine.submit_text("assign food 1").unwrap();
//! engine.tick().unwrap();
//! assert_eq!(engine.snapshot().tick, 1);
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ages::check_advancement;
use crate::buildings::complete_construction;
use crate::clock::catch_up_ticks;
use crate::command::{apply_command, parse_command, Command, CommandError, CommandOutcome};
use crate::data::ContentData;
use crate::economy::rate_sheet;
use crate::error::{GameError, InvariantViolation, Result};
use crate::ids::{AgeId, BuildingId, ResourceKind, TechId};
use crate::jobs::JobKind;
use crate::population::Casualty;
use crate::rules::Ruleset;
use crate::save::{PersistenceError, SaveGame};
use crate::snapshot::Snapshot;
use crate::state::GameState;
use crate::stats::EventKind;
use crate::tech::unlock;

/// Events generated during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick counter after this tick.
    pub tick: u64,
    /// Buildings completed, in enqueue order.
    pub completed: Vec<BuildingId>,
    /// Techs unlocked, in enqueue order.
    pub unlocked: Vec<TechId>,
    /// New age, if the settlement advanced.
    pub age_advanced: Option<AgeId>,
    /// Person lost to starvation, if any.
    pub starvation: Option<Casualty>,
    /// Resources whose consumption exceeded the stockpile.
    pub shortages: Vec<ResourceKind>,
    /// Resources that hit their capacity and discarded the excess.
    pub overflow: Vec<ResourceKind>,
}

impl TickEvents {
    /// Whether anything noteworthy happened.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.completed.is_empty()
            && self.unlocked.is_empty()
            && self.age_advanced.is_none()
            && self.starvation.is_none()
    }
}

/// Summary of several ticks applied in a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Ticks that were due before any cap.
    pub due: u64,
    /// Ticks actually applied.
    pub applied: u64,
    /// Buildings completed across all ticks.
    pub completed: Vec<BuildingId>,
    /// Techs unlocked across all ticks.
    pub unlocked: Vec<TechId>,
    /// Ages entered across all ticks.
    pub ages: Vec<AgeId>,
    /// People lost to starvation.
    pub starved: u32,
}

impl CatchUpReport {
    fn absorb(&mut self, events: TickEvents) {
        self.applied += 1;
        self.completed.extend(events.completed);
        self.unlocked.extend(events.unlocked);
        self.ages.extend(events.age_advanced);
        if events.starvation.is_some() {
            self.starved += 1;
        }
    }
}

/// Result of [`GameEngine::load_or_fresh`].
#[derive(Debug)]
pub struct LoadOutcome {
    /// The engine, loaded or fresh.
    pub engine: GameEngine,
    /// When the loaded save was written. `None` for a fresh game.
    pub saved_at: Option<DateTime<Utc>>,
    /// Why loading failed, if it did.
    pub error: Option<GameError>,
}

/// Owner of the game state and the ruleset it is played under.
#[derive(Debug, Clone)]
pub struct GameEngine {
    rules: Arc<Ruleset>,
    state: GameState,
}

impl GameEngine {
    /// Validate content and start a new game.
    pub fn new(content: ContentData) -> Result<Self> {
        let rules = Ruleset::new(content)?;
        Ok(Self::with_rules(Arc::new(rules)))
    }

    /// Start a new game under an already validated ruleset.
    #[must_use]
    pub fn with_rules(rules: Arc<Ruleset>) -> Self {
        let state = GameState::new(&rules);
        Self { rules, state }
    }

    /// Resume from an existing state.
    ///
    /// Fails if the state references anything the ruleset does not define
    /// or breaks an invariant.
    pub fn from_state(rules: Arc<Ruleset>, state: GameState) -> Result<Self> {
        state
            .check_compatible(&rules)
            .map_err(PersistenceError::Incompatible)?;
        Ok(Self { rules, state })
    }

    /// The ruleset.
    #[must_use]
    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Shared handle to the ruleset.
    #[must_use]
    pub fn rules_handle(&self) -> Arc<Ruleset> {
        Arc::clone(&self.rules)
    }

    /// The content the ruleset was built from.
    #[must_use]
    pub fn content(&self) -> &ContentData {
        self.rules.content()
    }

    /// Read-only access to the committed state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Current tick number.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.state.tick
    }

    /// Immutable view for the presentation layer.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state, &self.rules)
    }

    /// Hash of the committed state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.state.state_hash()
    }

    /// Run `f` on a working copy and commit it if every invariant holds.
    fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut GameState, &Ruleset) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<InvariantViolation>,
    {
        let mut working = self.state.clone();
        let value = f(&mut working, &self.rules)?;

        let checked = working
            .check_invariants(&self.rules)
            .and_then(|()| working.check_monotonic(&self.state));
        if let Err(violation) = checked {
            tracing::error!(tick = self.state.tick, %violation, "invariant violated, change discarded");
            return Err(violation.into());
        }

        self.state = working;
        Ok(value)
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> Result<TickEvents> {
        let events = self.transaction(|state, rules| Ok::<_, GameError>(apply_tick(state, rules)))?;

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.state.tick, state_hash = hash, "Simulation state hash");
        }

        Ok(events)
    }

    /// Apply `ticks` ticks in order.
    ///
    /// Stops at the first failing tick; ticks before it stay committed.
    pub fn advance(&mut self, ticks: u64) -> Result<CatchUpReport> {
        let mut report = CatchUpReport {
            due: ticks,
            ..CatchUpReport::default()
        };
        for _ in 0..ticks {
            report.absorb(self.tick()?);
        }
        Ok(report)
    }

    /// Apply the ticks that elapsed between `since` and `now`.
    ///
    /// Uses exactly the same [`tick`](Self::tick) as live play, so a
    /// catch-up of K ticks equals K individual ticks.
    pub fn catch_up(
        &mut self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        tick_duration: Duration,
        cap: Option<u64>,
    ) -> Result<CatchUpReport> {
        let due = catch_up_ticks(since, now, tick_duration, None);
        let applied = cap.map_or(due, |cap| due.min(cap));
        if applied < due {
            tracing::warn!(due, applied, "offline progress capped");
        }

        let mut report = self.advance(applied)?;
        report.due = due;
        if report.applied > 0 {
            tracing::info!(
                ticks = report.applied,
                completed = report.completed.len(),
                unlocked = report.unlocked.len(),
                "caught up on offline progress"
            );
        }
        Ok(report)
    }

    /// Validate and apply a command.
    ///
    /// Queries never mutate. A rejected command leaves the state exactly as
    /// it was.
    pub fn submit(&mut self, command: &Command) -> std::result::Result<CommandOutcome, CommandError> {
        if !command.is_mutating() {
            return apply_command(&mut self.state.clone(), &self.rules, command)
                .map_err(CommandError::from);
        }

        let result = self.transaction(|state, rules| {
            apply_command(state, rules, command).map_err(CommandError::from)
        });
        match &result {
            Ok(outcome) => tracing::info!(command = command.name(), %outcome, "command applied"),
            Err(e) => tracing::warn!(command = command.name(), reason = %e, "command rejected"),
        }
        result
    }

    /// Parse and submit a line of command text.
    pub fn submit_text(&mut self, text: &str) -> std::result::Result<CommandOutcome, CommandError> {
        let command = parse_command(text).map_err(|e| {
            tracing::warn!(input = text, reason = %e, "unparseable command");
            CommandError::from(e)
        })?;
        self.submit(&command)
    }

    /// Save the committed state to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P, now: DateTime<Utc>) -> Result<()> {
        SaveGame::new(self.state.clone(), self.rules.name(), now).write(path)?;
        Ok(())
    }

    /// Load a save, returning the engine and when the save was written.
    pub fn load<P: AsRef<Path>>(rules: Arc<Ruleset>, path: P) -> Result<(Self, DateTime<Utc>)> {
        let path = path.as_ref();
        let save = SaveGame::read(path)?;
        if save.content != rules.name() {
            tracing::warn!(
                save = %save.content,
                loaded = %rules.name(),
                "save was written with different content"
            );
        }
        let saved_at = save.saved_at;
        let engine = Self::from_state(rules, save.state)?;
        tracing::info!(path = %path.display(), tick = engine.tick_count(), "game loaded");
        Ok((engine, saved_at))
    }

    /// Load a save, or start fresh if that fails.
    ///
    /// A failed load never leaves a half-restored state: the fresh game is
    /// built from scratch and the error is handed back for reporting.
    #[must_use]
    pub fn load_or_fresh<P: AsRef<Path>>(rules: Arc<Ruleset>, path: P) -> LoadOutcome {
        match Self::load(Arc::clone(&rules), path) {
            Ok((engine, saved_at)) => LoadOutcome {
                engine,
                saved_at: Some(saved_at),
                error: None,
            },
            Err(error) => {
                tracing::warn!(%error, "load failed, starting a new game");
                LoadOutcome {
                    engine: Self::with_rules(rules),
                    saved_at: None,
                    error: Some(error),
                }
            }
        }
    }
}

/// One tick of simulation on a working copy.
fn apply_tick(state: &mut GameState, rules: &Ruleset) -> TickEvents {
    let tick = state.tick + 1;
    let mut events = TickEvents {
        tick,
        ..TickEvents::default()
    };

    // 1. Resources
    let sheet = rate_sheet(state, rules);
    let report = state.resources.apply_tick(&sheet);
    state.stats.add_income(&sheet.gross);
    events.shortages = report.shortfalls.iter().map(|(k, _)| k.clone()).collect();
    events.overflow = report.discarded.iter().map(|(k, _)| k.clone()).collect();

    // 2. Starvation
    let food = &rules.population().food_resource;
    if report.ran_short(food.as_str()) {
        if let Some(casualty) = state.population.remove_one() {
            let population = state.population.total();
            state.stats.starved = state.stats.starved.saturating_add(1);
            state.stats.record(
                tick,
                EventKind::Starvation,
                format!("A {} starved, population is now {population}", casualty.kind()),
            );
            tracing::warn!(tick, kind = %casualty.kind(), population, "person starved");
            events.starvation = Some(casualty);
        }
    }

    // 3. Jobs
    for job in state.jobs.tick() {
        match job.kind {
            JobKind::Construction(building) => {
                let owned = complete_construction(state, &building);
                state.stats.add_building(&building);
                state.stats.record(
                    tick,
                    EventKind::ConstructionCompleted,
                    format!("Completed {building} (now {owned})"),
                );
                tracing::info!(tick, %building, owned, "construction complete");
                events.completed.push(building);
            }
            JobKind::Research(tech) => {
                if unlock(state, &tech) {
                    state.stats.techs_researched += 1;
                    state
                        .stats
                        .record(tick, EventKind::TechUnlocked, format!("Researched {tech}"));
                    tracing::info!(tick, %tech, "tech unlocked");
                    events.unlocked.push(tech);
                }
            }
        }
    }

    // 4. Ages
    if let Some(age) = check_advancement(state, rules.ages()) {
        let name = rules
            .ages()
            .get(age.as_str())
            .map_or_else(|| age.to_string(), |a| a.name.clone());
        state.stats.ages_reached += 1;
        state
            .stats
            .record(tick, EventKind::AgeAdvanced, format!("Entered the {name}"));
        tracing::info!(tick, %age, "age advanced");
        events.age_advanced = Some(age);
    }

    // 5. Counter
    state.tick = tick;
    events
}

/// A [`GameEngine`] shared between threads.
///
/// Ticks, commands and snapshots are serialized through one mutex, so at
/// most one mutation is in progress and readers only ever see committed
/// state.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<GameEngine>>,
}

impl SharedEngine {
    /// Wrap an engine.
    #[must_use]
    pub fn new(engine: GameEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine.
    ///
    /// A poisoned lock is recovered: the engine only ever replaces its
    /// state after a complete, checked transaction.
    pub fn lock(&self) -> MutexGuard<'_, GameEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut GameEngine) -> R) -> R {
        f(&mut self.lock())
    }

    /// Advance one tick.
    pub fn tick(&self) -> Result<TickEvents> {
        self.lock().tick()
    }

    /// Submit a command.
    pub fn submit(&self, command: &Command) -> std::result::Result<CommandOutcome, CommandError> {
        self.lock().submit(command)
    }

    /// Parse and submit command text.
    pub fn submit_text(&self, text: &str) -> std::result::Result<CommandOutcome, CommandError> {
        self.lock().submit_text(text)
    }

    /// Consistent snapshot of the committed state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Swap in another engine, e.g. after loading a save.
    pub fn replace(&self, engine: GameEngine) -> GameEngine {
        std::mem::replace(&mut *self.lock(), engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    fn engine() -> GameEngine {
        GameEngine::new(ContentData::classic()).unwrap()
    }

    #[test]
    fn test_tick_increments_counter() {
        let mut engine = engine();
        let events = engine.tick().unwrap();
        assert_eq!(events.tick, 1);
        assert_eq!(engine.tick_count(), 1);
    }

    #[test]
    fn test_upkeep_consumes_food() {
        let mut engine = engine();
        engine.tick().unwrap();
        assert_eq!(engine.snapshot().amount("food"), Fixed::from_num(19.5));
    }

    #[test]
    fn test_starvation_removes_one_villager() {
        let mut engine = engine();
        engine.state.resources.set_amount("food", Fixed::ZERO);

        let events = engine.tick().unwrap();
        assert_eq!(events.starvation, Some(Casualty::Idle("villager".into())));
        assert_eq!(engine.state().population.total(), 0);
        assert_eq!(engine.state().stats.starved, 1);

        let events = engine.tick().unwrap();
        assert_eq!(events.starvation, None);
        assert_eq!(engine.state().population.total(), 0);
    }

    #[test]
    fn test_query_does_not_mutate() {
        let mut engine = engine();
        let before = engine.state_hash();
        let outcome = engine.submit(&Command::Query).unwrap();
        assert!(matches!(outcome, CommandOutcome::Snapshot(_)));
        assert_eq!(engine.state_hash(), before);
    }

    #[test]
    fn test_parse_error_does_not_mutate() {
        let mut engine = engine();
        let before = engine.state_hash();
        let err = engine.submit_text("conquer world").unwrap_err();
        assert!(matches!(err, CommandError::Parse(_)));
        assert_eq!(engine.state_hash(), before);
    }

    #[test]
    fn test_invariant_violation_discards_working_copy() {
        let mut engine = engine();
        let before = engine.state().clone();

        let result = engine.transaction(|state, _| {
            if let Some(group) = state.population.groups.get_mut("villager") {
                group.assignments.insert("food".into(), 5);
            }
            Ok::<_, GameError>(())
        });
        assert!(matches!(result, Err(GameError::Invariant(_))));
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn test_construction_completes() {
        let mut engine = engine();
        engine.state.resources.set_amount("wood", Fixed::from_num(40));
        engine.submit_text("build hut").unwrap();
        assert_eq!(engine.snapshot().amount("wood"), Fixed::from_num(20));

        let report = engine.advance(5).unwrap();
        assert_eq!(report.applied, 5);
        assert_eq!(report.completed, vec![BuildingId::from("hut")]);
        assert_eq!(engine.snapshot().owned("hut"), 1);
        assert_eq!(engine.snapshot().population.housing, 3);
    }

    #[test]
    fn test_shared_engine() {
        let shared = SharedEngine::new(engine());
        let clone = shared.clone();
        let handle = std::thread::spawn(move || {
            for _ in 0..10 {
                clone.tick().unwrap();
            }
        });
        handle.join().unwrap();
        assert_eq!(shared.snapshot().tick, 10);

        let old = shared.replace(engine());
        assert_eq!(old.tick_count(), 10);
        assert_eq!(shared.with(|e| e.tick_count()), 0);
    }
}
