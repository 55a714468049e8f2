//! Headless deterministic runs driven by a script file.
//!
//! A script is plain text, one step per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! assign wood 1
//! tick 20
//! build hut
//! wait 5
//! ```
//!
//! `tick [n]` and `wait [n]` advance time; every other line is submitted
//! as command text. Rejected commands are recorded and the run goes on.

use serde::Serialize;

use civ_core::engine::GameEngine;
use civ_core::error::GameError;
use civ_core::snapshot::Snapshot;

use crate::error::CliError;

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Advance this many ticks.
    Tick(u64),
    /// Submit command text.
    Command(String),
}

/// A script step with its 1-based source line.
pub type ScriptLine = (usize, ScriptStep);

/// A command from the script that the engine did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRejection {
    /// 1-based line number.
    pub line: usize,
    /// The command text.
    pub text: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of a headless run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Final state.
    pub snapshot: Snapshot,
    /// Final state hash.
    pub hash: u64,
    /// Commands that were not applied.
    pub rejected: Vec<ScriptRejection>,
}

/// Parse script text.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>, CliError> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut words = trimmed.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let step = if verb == "tick" || verb == "wait" {
            let count = match words.next() {
                None => 1,
                Some(n) => n.parse::<u64>().map_err(|_| CliError::Script {
                    line,
                    message: format!("'{n}' is not a tick count"),
                })?,
            };
            if let Some(extra) = words.next() {
                return Err(CliError::Script {
                    line,
                    message: format!("unexpected '{extra}'"),
                });
            }
            ScriptStep::Tick(count)
        } else {
            ScriptStep::Command(trimmed.to_string())
        };
        steps.push((line, step));
    }
    Ok(steps)
}

/// Play `script`, then advance a further `ticks` ticks.
pub fn run_simulation(
    engine: &mut GameEngine,
    script: &[ScriptLine],
    ticks: u64,
) -> Result<SimulationReport, GameError> {
    let mut rejected = Vec::new();

    for (line, step) in script {
        match step {
            ScriptStep::Tick(count) => {
                engine.advance(*count)?;
            }
            ScriptStep::Command(text) => {
                if let Err(e) = engine.submit_text(text) {
                    if e.is_fatal() {
                        return Err(GameError::InvalidState(e.reason()));
                    }
                    rejected.push(ScriptRejection {
                        line: *line,
                        text: text.clone(),
                        reason: e.reason(),
                    });
                }
            }
        }
    }

    engine.advance(ticks)?;
    tracing::info!(
        tick = engine.tick_count(),
        rejected = rejected.len(),
        "simulation finished"
    );

    Ok(SimulationReport {
        snapshot: engine.snapshot(),
        hash: engine.state_hash(),
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use civ_test_utils::fixtures::hut_engine;

    #[test]
    fn test_parse_script() {
        let steps = parse_script("# opening\n\nbuild hut\ntick 3\nwait\n").unwrap();
        assert_eq!(
            steps,
            vec![
                (3, ScriptStep::Command("build hut".to_string())),
                (4, ScriptStep::Tick(3)),
                (5, ScriptStep::Tick(1)),
            ]
        );
    }

    #[test]
    fn test_bad_tick_count() {
        let err = parse_script("tick soon").unwrap_err();
        assert!(matches!(err, CliError::Script { line: 1, .. }));
    }

    #[test]
    fn test_run_simulation() {
        let script = parse_script("build hut\ntick 3\nbuild hut\nbuild hut\n").unwrap();
        let mut engine = hut_engine();
        let report = run_simulation(&mut engine, &script, 10).unwrap();

        assert_eq!(report.snapshot.tick, 13);
        assert_eq!(report.snapshot.owned("hut"), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 4);
        assert_eq!(report.hash, engine.state_hash());
    }

    #[test]
    fn test_runs_are_reproducible() {
        let script = parse_script("build hut\ntick 7\nresearch agriculture\n").unwrap();
        let first = run_simulation(&mut hut_engine(), &script, 20).unwrap();
        let second = run_simulation(&mut hut_engine(), &script, 20).unwrap();
        assert_eq!(first, second);
    }
}
