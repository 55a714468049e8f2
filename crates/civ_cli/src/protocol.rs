//! JSON-lines protocol for scripted and AI control.
//!
//! The controller drives time explicitly, so a protocol session is fully
//! deterministic: no wall clock is read except to stamp save files.
//!
//! **Input (stdin):** one request per line
//! **Output (stdout):** one response per line
//! **Logs (stderr):** human-readable
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"assign","allocation":{"wood":1}}
//! <- {"type":"ack","cmd":"assign","message":"Workers (villager): 1 on wood, 0 idle"}
//! -> {"cmd":"recruit","kind":"scholar","count":1}
//! <- {"type":"rejected","cmd":"recruit","reason":"scholar cannot be recruited before the medieval age"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ticked","tick":60,"events":[]}
//! -> {"cmd":"build","building":"hut"}
//! <- {"type":"rejected","cmd":"build","reason":"Insufficient resources: need 20 wood, have 15"}
//! -> {"cmd":"query"}
//! <- {"type":"state","snapshot":{...},"hash":1234}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use civ_core::command::{Command, CommandOutcome};
use civ_core::engine::GameEngine;
use civ_core::save::save_path;
use civ_core::snapshot::Snapshot;

use crate::display::describe_events;

/// Protocol version announced in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Requests (controller -> runner)
// ============================================================================

/// Requests handled by the runner itself rather than the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Control {
    /// Advance by N ticks (default: 1).
    Tick {
        /// Number of ticks.
        #[serde(default = "default_tick_count")]
        count: u64,
    },

    /// Submit a command in its text form, e.g. `"build hut"`.
    Text {
        /// Command text.
        line: String,
    },

    /// Report the state hash (for determinism verification).
    Hash,

    /// Save the game to a slot.
    Save {
        /// Slot name.
        name: String,
    },

    /// End the session.
    Quit,
}

fn default_tick_count() -> u64 {
    1
}

/// Anything the controller can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Runner control.
    Control(Control),
    /// An engine command.
    Game(Command),
}

impl Request {
    /// Parse from a JSON line.
    ///
    /// Runner controls are tried first; anything else must be an engine
    /// command, and that parse error is the one reported.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Control>(json)
            .map(Self::Control)
            .or_else(|_| serde_json::from_str::<Command>(json).map(Self::Game))
    }
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept requests.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// A command was applied.
    Ack {
        /// Command name.
        cmd: String,
        /// Human-readable outcome.
        message: String,
    },

    /// A command was rejected; the state is unchanged.
    Rejected {
        /// Command name, if the request parsed.
        cmd: Option<String>,
        /// Why.
        reason: String,
    },

    /// The request could not be handled at all.
    Error {
        /// What went wrong.
        message: String,
    },

    /// Ticks were applied.
    Ticked {
        /// Tick after the last one applied.
        tick: u64,
        /// Noteworthy events, oldest first.
        events: Vec<String>,
    },

    /// Current state.
    State {
        /// Read-only view.
        snapshot: Box<Snapshot>,
        /// State hash.
        hash: u64,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash.
        hash: u64,
    },

    /// The game was saved.
    Saved {
        /// Path written.
        path: String,
    },

    /// Goodbye message before shutdown.
    Bye,
}

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Serves the protocol over any reader/writer pair.
#[derive(Debug)]
pub struct ProtocolRunner {
    engine: GameEngine,
    save_dir: PathBuf,
}

impl ProtocolRunner {
    /// Serve `engine`, writing saves under `save_dir`.
    #[must_use]
    pub fn new(engine: GameEngine, save_dir: PathBuf) -> Self {
        Self { engine, save_dir }
    }

    /// The engine being served.
    #[must_use]
    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// Handle one request. The flag is `true` when the session should end.
    pub fn handle(&mut self, request: Request) -> (Response, bool) {
        match request {
            Request::Control(Control::Tick { count }) => {
                let mut events = Vec::new();
                for _ in 0..count {
                    match self.engine.tick() {
                        Ok(tick) => events.extend(describe_events(&tick)),
                        Err(e) => return (Response::error(e.to_string()), true),
                    }
                }
                let tick = self.engine.tick_count();
                (Response::Ticked { tick, events }, false)
            }
            Request::Control(Control::Text { line }) => {
                let response = match self.engine.submit_text(&line) {
                    Ok(outcome) => self.outcome_response("text", outcome),
                    Err(e) => Response::Rejected {
                        cmd: None,
                        reason: e.reason(),
                    },
                };
                (response, false)
            }
            Request::Control(Control::Hash) => (
                Response::StateHash {
                    tick: self.engine.tick_count(),
                    hash: self.engine.state_hash(),
                },
                false,
            ),
            Request::Control(Control::Save { name }) => {
                let result = save_path(&self.save_dir, &name)
                    .map_err(civ_core::error::GameError::from)
                    .and_then(|path| self.engine.save(&path, Utc::now()).map(|()| path));
                let response = match result {
                    Ok(path) => Response::Saved {
                        path: path.display().to_string(),
                    },
                    Err(e) => Response::error(e.to_string()),
                };
                (response, false)
            }
            Request::Control(Control::Quit) => (Response::Bye, true),
            Request::Game(command) => {
                let response = match self.engine.submit(&command) {
                    Ok(outcome) => self.outcome_response(command.name(), outcome),
                    Err(e) => Response::Rejected {
                        cmd: Some(command.name().to_string()),
                        reason: e.reason(),
                    },
                };
                (response, false)
            }
        }
    }

    fn outcome_response(&self, cmd: &str, outcome: CommandOutcome) -> Response {
        match outcome {
            CommandOutcome::Snapshot(snapshot) => Response::State {
                snapshot,
                hash: self.engine.state_hash(),
            },
            other => Response::Ack {
                cmd: cmd.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Serve requests until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(Response::ready(self.engine.tick_count()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (response, quit) = match Request::from_json(line) {
                Ok(request) => self.handle(request),
                Err(e) => {
                    tracing::warn!(input = line, error = %e, "unparseable request");
                    (Response::error(format!("Parse error: {e}")), false)
                }
            };
            output.write_all(response.to_json_line().as_bytes())?;
            output.flush()?;
            if quit {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civ_test_utils::fixtures::{classic_engine, hut_engine};

    fn run(engine: GameEngine, input: &str) -> Vec<serde_json::Value> {
        let mut runner = ProtocolRunner::new(engine, std::env::temp_dir());
        let mut output = Vec::new();
        runner.run(input.as_bytes(), &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_control_and_game_requests() {
        let request = Request::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert_eq!(request, Request::Control(Control::Tick { count: 60 }));

        let request = Request::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert_eq!(request, Request::Control(Control::Tick { count: 1 }));

        let request = Request::from_json(r#"{"cmd":"build","building":"hut"}"#).unwrap();
        assert_eq!(
            request,
            Request::Game(Command::Build {
                building: "hut".into()
            })
        );

        assert!(Request::from_json(r#"{"cmd":"fly"}"#).is_err());
    }

    #[test]
    fn test_session_flow() {
        let responses = run(
            hut_engine(),
            concat!(
                "{\"cmd\":\"build\",\"building\":\"hut\"}\n",
                "{\"cmd\":\"tick\",\"count\":3}\n",
                "{\"cmd\":\"text\",\"line\":\"build hut\"}\n",
                "{\"cmd\":\"text\",\"line\":\"build hut\"}\n",
                "{\"cmd\":\"quit\"}\n",
                "{\"cmd\":\"hash\"}\n",
            ),
        );

        assert_eq!(responses.len(), 6);
        assert_eq!(responses[0]["type"], "ready");
        assert_eq!(responses[1]["type"], "ack");
        assert_eq!(responses[2]["type"], "ticked");
        assert_eq!(responses[2]["tick"], 3);
        assert_eq!(responses[2]["events"][0], "Construction of hut complete.");
        assert_eq!(responses[3]["type"], "ack");
        assert_eq!(responses[4]["type"], "rejected");
        assert_eq!(
            responses[4]["reason"],
            "Insufficient resources: need 50 wood, have 0"
        );
        assert_eq!(responses[5]["type"], "bye");
    }

    #[test]
    fn test_query_returns_state() {
        let responses = run(classic_engine(), "{\"cmd\":\"query\"}\n");
        assert_eq!(responses[1]["type"], "state");
        assert_eq!(responses[1]["snapshot"]["tick"], 0);
        assert!(responses[1]["hash"].is_u64());
    }

    #[test]
    fn test_bad_json_reports_error_and_continues() {
        let responses = run(classic_engine(), "not json\n{\"cmd\":\"hash\"}\n");
        assert_eq!(responses[1]["type"], "error");
        assert_eq!(responses[2]["type"], "state_hash");
    }

    #[test]
    fn test_recruit_names_a_kind() {
        let responses = run(
            classic_engine(),
            "{\"cmd\":\"recruit\",\"kind\":\"scholar\",\"count\":1}\n",
        );
        assert_eq!(responses[1]["type"], "rejected");
        assert_eq!(
            responses[1]["reason"],
            "scholar cannot be recruited before the medieval age"
        );
    }

    #[test]
    fn test_same_requests_same_hash() {
        let input = "{\"cmd\":\"assign\",\"allocation\":{\"wood\":1}}\n{\"cmd\":\"tick\",\"count\":50}\n{\"cmd\":\"hash\"}\n";
        let first = run(classic_engine(), input);
        let second = run(classic_engine(), input);
        assert_eq!(first[3]["hash"], second[3]["hash"]);
    }
}
