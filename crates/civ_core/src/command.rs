//! Player commands: parsing, validation and application.
//!
//! A command goes `Received -> Validated -> Applied` or
//! `Received -> Rejected`. Parsing text into a [`Command`] is pure and
//! never touches state. Validation reads the state only. Application is
//! the single path that mutates, and only ever runs on the engine's
//! working copy.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buildings::start_construction;
use crate::error::{InvariantViolation, ValidationError};
use crate::ids::{BuildingId, PersonKind, ResourceKind, TechId};
use crate::jobs::{JobId, JobKind};
use crate::population::{assign, recruit, Allocation};
use crate::rules::Ruleset;
use crate::snapshot::Snapshot;
use crate::state::GameState;
use crate::stats::EventKind;
use crate::tech::start_research;

/// A player command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Start constructing one building.
    Build {
        /// Building type.
        building: BuildingId,
    },

    /// Start researching a tech.
    Research {
        /// Tech to research.
        tech: TechId,
    },

    /// Change worker assignments of one kind of person. Listed resources
    /// are replaced, others are kept.
    Assign {
        /// Kind of person; `None` is the content's default kind.
        #[serde(default)]
        kind: Option<PersonKind>,
        /// Worker count per resource; zero unassigns.
        allocation: Allocation,
    },

    /// Recruit new people.
    Recruit {
        /// Kind of person; `None` is the content's default kind.
        #[serde(default)]
        kind: Option<PersonKind>,
        /// How many.
        #[serde(default = "default_recruit_count")]
        count: u32,
    },

    /// Read the current state. Always succeeds.
    Query,
}

fn default_recruit_count() -> u32 {
    1
}

impl Command {
    /// Short name used in logs and protocol acknowledgements.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Build { .. } => "build",
            Self::Research { .. } => "research",
            Self::Assign { .. } => "assign",
            Self::Recruit { .. } => "recruit",
            Self::Query => "query",
        }
    }

    /// Whether the command can change state.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// Command text could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing was entered.
    #[error("Empty command")]
    Empty,

    /// The first word is not a known command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A required argument is missing.
    #[error("{command}: missing {argument}")]
    MissingArgument {
        /// Command word.
        command: &'static str,
        /// Name of the missing argument.
        argument: &'static str,
    },

    /// An argument that should be a positive number is not.
    #[error("{command}: '{value}' is not a valid count")]
    InvalidNumber {
        /// Command word.
        command: &'static str,
        /// Offending text.
        value: String,
    },

    /// More arguments than the command takes.
    #[error("{command}: unexpected argument '{value}'")]
    UnexpectedArgument {
        /// Command word.
        command: &'static str,
        /// First extra argument.
        value: String,
    },
}

/// Parse one line of command text.
///
/// Words are separated by whitespace and matched case-insensitively.
/// Content ids are always lowercase, so lowercasing the whole line is safe.
///
/// | Text | Command |
/// |------|---------|
/// | `build <building>` | [`Command::Build`] |
/// | `research <tech>` | [`Command::Research`] |
/// | `assign [kind] <resource> <count> [<resource> <count> ...]` | [`Command::Assign`] |
/// | `unassign [kind] <resource>` | [`Command::Assign`] with a zero count |
/// | `recruit [kind] [count]` | [`Command::Recruit`] |
/// | `status` or `query` | [`Command::Query`] |
///
/// An `assign` with an odd number of arguments names the kind first.
///
/// # Example
///
/// ```
/// use civ_core::command::{parse_command, Command};
///
/// let command = parse_command("build hut").unwrap();
/// assert_eq!(command, Command::Build { building: "hut".into() });
/// ```
pub fn parse_command(text: &str) -> Result<Command, ParseError> {
    let lowered = text.trim().to_lowercase();
    let mut words = lowered.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ParseError::Empty);
    };
    let rest: Vec<&str> = words.collect();

    match verb {
        "build" | "construct" => {
            let building = single_argument("build", "building", &rest)?;
            Ok(Command::Build {
                building: building.into(),
            })
        }
        "research" => {
            let tech = single_argument("research", "tech", &rest)?;
            Ok(Command::Research { tech: tech.into() })
        }
        "assign" => {
            let (kind, pairs) = match rest.as_slice() {
                [] => {
                    return Err(ParseError::MissingArgument {
                        command: "assign",
                        argument: "resource",
                    })
                }
                [kind, pairs @ ..] if rest.len() % 2 == 1 && !pairs.is_empty() => {
                    (Some(PersonKind::from(*kind)), pairs)
                }
                pairs => (None, pairs),
            };
            let mut allocation = BTreeMap::new();
            for pair in pairs.chunks(2) {
                let [resource, count] = pair else {
                    return Err(ParseError::MissingArgument {
                        command: "assign",
                        argument: "count",
                    });
                };
                let count = count.parse::<u32>().map_err(|_| ParseError::InvalidNumber {
                    command: "assign",
                    value: (*count).to_string(),
                })?;
                allocation.insert(ResourceKind::from(*resource), count);
            }
            Ok(Command::Assign { kind, allocation })
        }
        "unassign" => {
            let (kind, resource) = match rest.as_slice() {
                [kind, resource] => (Some(PersonKind::from(*kind)), *resource),
                _ => (None, single_argument("unassign", "resource", &rest)?),
            };
            let mut allocation = BTreeMap::new();
            allocation.insert(ResourceKind::from(resource), 0);
            Ok(Command::Assign { kind, allocation })
        }
        "recruit" => {
            let (kind, count) = match rest.as_slice() {
                [] => (None, 1),
                [value] if looks_numeric(value) => (None, recruit_count(value)?),
                [kind] => (Some(PersonKind::from(*kind)), 1),
                [kind, value] => (Some(PersonKind::from(*kind)), recruit_count(value)?),
                [_, _, extra, ..] => {
                    return Err(ParseError::UnexpectedArgument {
                        command: "recruit",
                        value: (*extra).to_string(),
                    })
                }
            };
            Ok(Command::Recruit { kind, count })
        }
        "status" | "query" => match rest.first() {
            None => Ok(Command::Query),
            Some(extra) => Err(ParseError::UnexpectedArgument {
                command: "status",
                value: (*extra).to_string(),
            }),
        },
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn looks_numeric(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+')
}

fn recruit_count(value: &str) -> Result<u32, ParseError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ParseError::InvalidNumber {
            command: "recruit",
            value: value.to_string(),
        })
}

fn single_argument<'a>(
    command: &'static str,
    argument: &'static str,
    rest: &[&'a str],
) -> Result<&'a str, ParseError> {
    match rest {
        [] => Err(ParseError::MissingArgument { command, argument }),
        [value] => Ok(*value),
        [_, extra, ..] => Err(ParseError::UnexpectedArgument {
            command,
            value: (*extra).to_string(),
        }),
    }
}

/// What an accepted command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// A construction or research job was enqueued.
    Started {
        /// New job id.
        job: JobId,
        /// What it will produce.
        kind: JobKind,
        /// Ticks until completion.
        ticks: u32,
    },

    /// Assignments were replaced.
    Assigned {
        /// Kind whose assignments changed.
        kind: PersonKind,
        /// Assignments of that kind after the change.
        assignments: BTreeMap<ResourceKind, u32>,
        /// Idle people of that kind after the change.
        idle: u32,
    },

    /// People were recruited.
    Recruited {
        /// Kind that joined.
        kind: PersonKind,
        /// How many joined.
        count: u32,
        /// Population afterwards.
        total: u32,
    },

    /// Read-only query result.
    Snapshot(Box<Snapshot>),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { kind, ticks, .. } => match kind {
                JobKind::Construction(id) => {
                    write!(f, "Started building {id} ({ticks} ticks)")
                }
                JobKind::Research(id) => write!(f, "Started researching {id} ({ticks} ticks)"),
            },
            Self::Assigned {
                kind,
                assignments,
                idle,
            } => {
                let parts: Vec<String> = assignments
                    .iter()
                    .map(|(resource, count)| format!("{count} on {resource}"))
                    .collect();
                if parts.is_empty() {
                    write!(f, "No {kind} assigned, {idle} idle")
                } else {
                    write!(f, "Workers ({kind}): {}, {idle} idle", parts.join(", "))
                }
            }
            Self::Recruited { kind, count, total } => {
                write!(f, "Recruited {count} {kind}, population is now {total}")
            }
            Self::Snapshot(snapshot) => write!(f, "Tick {}", snapshot.tick),
        }
    }
}

/// Why a submitted command was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The text was not a command.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The command was valid but not allowed now.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// Applying the command would have broken an engine invariant. The
    /// state is unchanged.
    #[error("Internal invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl CommandError {
    /// User-facing explanation.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Whether the error indicates a bug rather than a player mistake.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// Validate and apply a mutating command to `state`.
///
/// On error `state` is unchanged. Queries are answered without mutation.
pub fn apply_command(
    state: &mut GameState,
    rules: &Ruleset,
    command: &Command,
) -> Result<CommandOutcome, ValidationError> {
    let tick = state.tick;
    match command {
        Command::Build { building } => {
            let job = start_construction(state, rules, building.as_str())?;
            let ticks = state.jobs.get(job).map_or(0, |j| j.total);
            state.stats.record(
                tick,
                EventKind::ConstructionStarted,
                format!("Started building {building}"),
            );
            Ok(CommandOutcome::Started {
                job,
                kind: JobKind::Construction(building.clone()),
                ticks,
            })
        }
        Command::Research { tech } => {
            let job = start_research(state, rules, tech.as_str())?;
            let ticks = state.jobs.get(job).map_or(0, |j| j.total);
            state.stats.record(
                tick,
                EventKind::ResearchStarted,
                format!("Started researching {tech}"),
            );
            Ok(CommandOutcome::Started {
                job,
                kind: JobKind::Research(tech.clone()),
                ticks,
            })
        }
        Command::Assign { kind, allocation } => {
            let kind = assign(state, rules, kind.as_ref().map(PersonKind::as_str), allocation)?;
            let group = state.population.group(kind.as_str());
            let outcome = CommandOutcome::Assigned {
                assignments: group.map(|g| g.assignments.clone()).unwrap_or_default(),
                idle: group.map_or(0, |g| g.idle()),
                kind,
            };
            state
                .stats
                .record(tick, EventKind::Assigned, outcome.to_string());
            Ok(outcome)
        }
        Command::Recruit { kind, count } => {
            let kind = recruit(state, rules, kind.as_ref().map(PersonKind::as_str), *count)?;
            state.stats.recruited = state.stats.recruited.saturating_add(*count);
            state.stats.record(
                tick,
                EventKind::Recruited,
                format!("{count} {kind} joined the settlement"),
            );
            Ok(CommandOutcome::Recruited {
                kind,
                count: *count,
                total: state.population.total(),
            })
        }
        Command::Query => Ok(CommandOutcome::Snapshot(Box::new(Snapshot::capture(
            state, rules,
        )))),
    }
}
