//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the engine produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Offline catch-up replays elapsed time as ordinary ticks, so the engine
//! must be 100% deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`civ_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   State uses `BTreeMap`/`BTreeSet` so iteration is lexicographic.
//!
//! - **Wall-clock reads**: The core never reads the clock; callers pass
//!   timestamps in.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual subsystem determinism
//! 2. **Property tests**: Random command scripts must still replay identically
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N engines in parallel all match

use std::thread;

use civ_core::command::Command;
use civ_core::engine::GameEngine;
use civ_core::state::GameState;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Engine is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// A command submitted just before a given tick is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    /// Tick count at which the command is submitted.
    pub tick: u64,
    /// The command.
    pub command: Command,
}

impl ScheduledCommand {
    /// Schedule `command` at `tick`.
    #[must_use]
    pub fn new(tick: u64, command: Command) -> Self {
        Self { tick, command }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use civ_test_utils::determinism::verify_determinism;
/// use civ_test_utils::fixtures::classic_engine;
///
/// let result = verify_determinism(
///     3,   // Run 3 times
///     100, // 100 ticks each
///     classic_engine,
///     |engine| { engine.tick().unwrap(); },
///     |engine| engine.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Submit every command scheduled at the engine's current tick, then tick.
///
/// Rejected commands are ignored; they never change state.
///
/// # Panics
///
/// Panics if a tick reports an invariant violation.
pub fn step_with_script(engine: &mut GameEngine, script: &[ScheduledCommand]) {
    let now = engine.tick_count();
    for scheduled in script.iter().filter(|s| s.tick == now) {
        let _ = engine.submit(&scheduled.command);
    }
    if let Err(e) = engine.tick() {
        panic!("tick {now} failed: {e}");
    }
}

/// Run `script` against a fresh engine for `ticks` ticks.
pub fn run_script<F>(setup_fn: F, script: &[ScheduledCommand], ticks: u64) -> GameEngine
where
    F: Fn() -> GameEngine,
{
    let mut engine = setup_fn();
    for _ in 0..ticks {
        step_with_script(&mut engine, script);
    }
    engine
}

/// Run the same script twice and verify the final state hashes match.
pub fn verify_engine_determinism<F>(setup_fn: F, script: &[ScheduledCommand], ticks: u64) -> bool
where
    F: Fn() -> GameEngine,
{
    verify_determinism(
        2,
        ticks,
        &setup_fn,
        |engine| step_with_script(engine, script),
        GameEngine::state_hash,
    )
    .is_deterministic
}

/// Run N engines in parallel on scoped threads and collect final hashes.
///
/// Useful for catching non-determinism that only shows up under thread
/// scheduling variations.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_engines<F>(
    setup_fn: F,
    script: &[ScheduledCommand],
    num_engines: usize,
    num_ticks: u64,
) -> DeterminismResult
where
    F: Fn() -> GameEngine + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_engines)
            .map(|_| s.spawn(|| run_script(&setup_fn, script, num_ticks).state_hash()))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("engine thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` if they diverge at that tick.
pub fn find_first_divergence<F>(setup_fn: F, script: &[ScheduledCommand], num_ticks: u64) -> Option<u64>
where
    F: Fn() -> GameEngine,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    // Check initial state
    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        step_with_script(&mut first, script);
        step_with_script(&mut second, script);

        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that the byte encoding round-trip preserves state exactly.
pub fn verify_serialization_determinism<F>(setup_fn: F, script: &[ScheduledCommand], num_ticks: u64) -> bool
where
    F: Fn() -> GameEngine,
{
    let engine = run_script(setup_fn, script, num_ticks);
    let hash_before = engine.state_hash();

    let Ok(bytes) = engine.state().to_bytes() else {
        return false;
    };
    let Ok(restored) = GameState::from_bytes(&bytes) else {
        return false;
    };

    hash_before == restored.state_hash() && &restored == engine.state()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible command scripts
/// against the classic content.
pub mod strategies {
    use std::collections::BTreeMap;

    use civ_core::command::Command;
    use civ_core::ids::{PersonKind, ResourceKind};
    use proptest::prelude::*;

    use super::ScheduledCommand;

    const RESOURCES: &[&str] = &["food", "gold", "hunting", "knowledge", "stone", "wood"];
    const KINDS: &[&str] = &["scholar", "villager"];
    const BUILDINGS: &[&str] = &[
        "farm",
        "foundry",
        "granary",
        "hut",
        "library",
        "lumber_mill",
        "market",
        "mine",
    ];
    const TECHS: &[&str] = &[
        "agriculture",
        "masonry",
        "mathematics",
        "metallurgy",
        "toolmaking",
        "writing",
    ];

    /// Generate a classic resource id, occasionally an unknown one.
    pub fn arb_resource() -> impl Strategy<Value = ResourceKind> {
        prop_oneof![
            9 => proptest::sample::select(RESOURCES).prop_map(ResourceKind::from),
            1 => Just(ResourceKind::from("mana")),
        ]
    }

    /// Generate an optional kind of person: mostly the default, sometimes a
    /// named classic kind, occasionally an unknown one.
    pub fn arb_kind() -> impl Strategy<Value = Option<PersonKind>> {
        prop_oneof![
            6 => Just(None),
            3 => proptest::sample::select(KINDS).prop_map(|k| Some(PersonKind::from(k))),
            1 => Just(Some(PersonKind::from("noble"))),
        ]
    }

    /// Generate a Build command, occasionally for an unknown building.
    pub fn arb_build_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            9 => proptest::sample::select(BUILDINGS).prop_map(|b| Command::Build { building: b.into() }),
            1 => Just(Command::Build { building: "castle".into() }),
        ]
    }

    /// Generate a Research command.
    pub fn arb_research_command() -> impl Strategy<Value = Command> {
        proptest::sample::select(TECHS).prop_map(|t| Command::Research { tech: t.into() })
    }

    /// Generate an allocation of up to three resources.
    pub fn arb_allocation() -> impl Strategy<Value = BTreeMap<ResourceKind, u32>> {
        proptest::collection::btree_map(arb_resource(), 0u32..4, 0..3)
    }

    /// Generate an Assign command.
    pub fn arb_assign_command() -> impl Strategy<Value = Command> {
        (arb_kind(), arb_allocation())
            .prop_map(|(kind, allocation)| Command::Assign { kind, allocation })
    }

    /// Generate a Recruit command (count 0 is rejected by the engine).
    pub fn arb_recruit_command() -> impl Strategy<Value = Command> {
        (arb_kind(), 0u32..3).prop_map(|(kind, count)| Command::Recruit { kind, count })
    }

    /// Generate any command.
    pub fn arb_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            3 => arb_build_command(),
            2 => arb_research_command(),
            3 => arb_assign_command(),
            1 => arb_recruit_command(),
            1 => Just(Command::Query),
        ]
    }

    /// Generate command text, including some that does not parse.
    pub fn arb_command_text() -> impl Strategy<Value = String> {
        prop_oneof![
            proptest::sample::select(BUILDINGS).prop_map(|b| format!("build {b}")),
            proptest::sample::select(TECHS).prop_map(|t| format!("research {t}")),
            (proptest::sample::select(RESOURCES), 0u32..4)
                .prop_map(|(r, n)| format!("assign {r} {n}")),
            (0u32..3).prop_map(|n| format!("recruit {n}")),
            (proptest::sample::select(KINDS), 1u32..3)
                .prop_map(|(k, n)| format!("recruit {k} {n}")),
            Just("status".to_string()),
            "[a-z ]{0,12}",
        ]
    }

    /// Generate a script of commands spread over `max_tick` ticks.
    pub fn arb_script(max_len: usize, max_tick: u64) -> impl Strategy<Value = Vec<ScheduledCommand>> {
        proptest::collection::vec((0..max_tick, arb_command()), 0..max_len).prop_map(|mut entries| {
            entries.sort_by_key(|(tick, _)| *tick);
            entries
                .into_iter()
                .map(|(tick, command)| ScheduledCommand::new(tick, command))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{busy_classic_engine, classic_engine, hut_engine};
    use proptest::prelude::*;

    fn sample_script() -> Vec<ScheduledCommand> {
        vec![
            ScheduledCommand::new(0, Command::Assign {
                kind: None,
                allocation: [("wood".into(), 1)].into_iter().collect(),
            }),
            ScheduledCommand::new(5, Command::Build { building: "hut".into() }),
            ScheduledCommand::new(12, Command::Query),
        ]
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_idle_engine_determinism() {
        assert!(verify_engine_determinism(classic_engine, &[], 200));
    }

    #[test]
    fn test_scripted_engine_determinism() {
        assert!(verify_engine_determinism(classic_engine, &sample_script(), 100));
    }

    #[test]
    fn test_find_divergence_on_deterministic_engine() {
        let divergence = find_first_divergence(busy_classic_engine, &sample_script(), 100);
        assert!(divergence.is_none(), "Expected no divergence");
    }

    #[test]
    fn test_parallel_engines_agree() {
        run_parallel_engines(classic_engine, &sample_script(), 4, 100).assert_deterministic();
    }

    #[test]
    fn test_serialization_preserves_state() {
        assert!(verify_serialization_determinism(hut_engine, &[], 0));
        assert!(verify_serialization_determinism(
            classic_engine,
            &sample_script(),
            50
        ));
    }

    #[test]
    fn test_run_script_applies_commands() {
        let script = vec![ScheduledCommand::new(
            0,
            Command::Build {
                building: "hut".into(),
            },
        )];
        let engine = run_script(hut_engine, &script, 3);
        assert_eq!(engine.snapshot().owned("hut"), 1);
    }

    proptest! {
        /// Any random script replays to the same state.
        #[test]
        fn prop_random_scripts_are_deterministic(script in arb_script(20, 60)) {
            prop_assert!(verify_engine_determinism(classic_engine, &script, 60));
        }

        /// Any command text either parses or is rejected without touching state.
        #[test]
        fn prop_command_text_never_corrupts_state(text in arb_command_text()) {
            let mut engine = classic_engine();
            let before = engine.state().clone();
            if engine.submit_text(&text).is_err() {
                prop_assert_eq!(engine.state(), &before);
            }
        }
    }
}
