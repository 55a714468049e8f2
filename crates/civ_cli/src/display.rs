//! Plain-text presentation of engine output.
//!
//! The session talks to a [`DisplaySink`] and never formats anything
//! itself, so the same session can drive a terminal or a test buffer.

use std::io::{self, Write};

use civ_core::command::{CommandError, CommandOutcome};
use civ_core::engine::{CatchUpReport, TickEvents};
use civ_core::math::Fixed;
use civ_core::population::Casualty;
use civ_core::save::SaveSummary;
use civ_core::snapshot::Snapshot;
use civ_core::stats::GameStats;

/// Where the session sends everything the player should see.
pub trait DisplaySink: Send {
    /// Greeting shown once at startup.
    fn banner(&mut self, content: &str) -> io::Result<()>;
    /// Full status view.
    fn snapshot(&mut self, snapshot: &Snapshot) -> io::Result<()>;
    /// Noteworthy things from one tick.
    fn events(&mut self, events: &TickEvents) -> io::Result<()>;
    /// A command was applied.
    fn outcome(&mut self, outcome: &CommandOutcome) -> io::Result<()>;
    /// A command was not applied.
    fn rejected(&mut self, error: &CommandError) -> io::Result<()>;
    /// Offline progress was replayed.
    fn catch_up(&mut self, report: &CatchUpReport) -> io::Result<()>;
    /// Lifetime statistics.
    fn stats(&mut self, stats: &GameStats) -> io::Result<()>;
    /// Save slots on disk.
    fn saves(&mut self, saves: &[SaveSummary]) -> io::Result<()>;
    /// Free-form text.
    fn message(&mut self, text: &str) -> io::Result<()>;
}

/// Render a fixed-point amount with one decimal place.
#[must_use]
pub fn format_amount(value: Fixed) -> String {
    format!("{value:.1}")
}

/// Render a per-tick rate with an explicit sign.
#[must_use]
pub fn format_rate(value: Fixed) -> String {
    if value >= Fixed::ZERO {
        format!("+{value:.1}/t")
    } else {
        format!("{value:.1}/t")
    }
}

/// One line per noteworthy tick event.
#[must_use]
pub fn describe_events(events: &TickEvents) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(casualty) = &events.starvation {
        lines.push(match casualty {
            Casualty::Idle(kind) => format!("An idle {kind} starved."),
            Casualty::Worker { kind, resource } => {
                format!("A {kind} gathering {resource} starved.")
            }
        });
    }
    for building in &events.completed {
        lines.push(format!("Construction of {building} complete."));
    }
    for tech in &events.unlocked {
        lines.push(format!("Research of {tech} complete."));
    }
    if let Some(age) = &events.age_advanced {
        lines.push(format!("Your people have entered the {age} age!"));
    }
    lines
}

/// Text output to any writer.
#[derive(Debug)]
pub struct TextDisplay<W: Write + Send> {
    out: W,
}

impl TextDisplay<io::Stdout> {
    /// Display on standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TextDisplay<W> {
    /// Display on `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySink for TextDisplay<W> {
    fn banner(&mut self, content: &str) -> io::Result<()> {
        writeln!(self.out, "=== Civilization: {content} ===")?;
        writeln!(self.out, "Type 'help' for a list of commands.")?;
        self.out.flush()
    }

    fn snapshot(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        writeln!(self.out, "== Tick {} | {} ==", snapshot.tick, snapshot.age_name)?;

        writeln!(self.out, "Resources:")?;
        for view in snapshot.resources.values() {
            let capacity = view
                .capacity
                .map_or_else(String::new, |cap| format!(" / {}", format_amount(cap)));
            writeln!(
                self.out,
                "  {:<12}{:>10}{capacity}  ({})",
                view.name,
                format_amount(view.amount),
                format_rate(view.rate)
            )?;
        }

        if !snapshot.buildings.is_empty() {
            writeln!(self.out, "Buildings:")?;
            for view in snapshot.buildings.values() {
                if view.in_progress.is_empty() {
                    writeln!(self.out, "  {:<12}{:>4}", view.name, view.owned)?;
                } else {
                    let remaining: Vec<String> =
                        view.in_progress.iter().map(|r| format!("{r}t")).collect();
                    writeln!(
                        self.out,
                        "  {:<12}{:>4}  (building: {})",
                        view.name,
                        view.owned,
                        remaining.join(", ")
                    )?;
                }
            }
        }

        let research: Vec<String> = snapshot
            .jobs
            .iter()
            .filter(|job| matches!(job.kind, civ_core::jobs::JobKind::Research(_)))
            .map(|job| format!("{} ({}t left)", job.kind, job.remaining))
            .collect();
        if !research.is_empty() {
            writeln!(self.out, "Researching: {}", research.join(", "))?;
        }

        let population = &snapshot.population;
        writeln!(
            self.out,
            "Population: {} / {} housing, {} idle",
            population.total, population.housing, population.idle,
        )?;
        for group in population.kinds.values() {
            let workers: Vec<String> = group
                .assignments
                .iter()
                .map(|(resource, count)| format!("{count} {resource}"))
                .collect();
            writeln!(
                self.out,
                "  {}: {}, {} idle{}",
                group.name,
                group.total,
                group.idle,
                if workers.is_empty() {
                    String::new()
                } else {
                    format!(", working: {}", workers.join(", "))
                }
            )?;
        }

        if !snapshot.unlocked.is_empty() {
            let unlocked: Vec<&str> = snapshot.unlocked.iter().map(|t| t.as_str()).collect();
            writeln!(self.out, "Known: {}", unlocked.join(", "))?;
        }
        if !snapshot.researchable.is_empty() {
            let available: Vec<&str> = snapshot.researchable.iter().map(|t| t.as_str()).collect();
            writeln!(self.out, "Can research: {}", available.join(", "))?;
        }
        self.out.flush()
    }

    fn events(&mut self, events: &TickEvents) -> io::Result<()> {
        for line in describe_events(events) {
            writeln!(self.out, "[tick {}] {line}", events.tick)?;
        }
        self.out.flush()
    }

    fn outcome(&mut self, outcome: &CommandOutcome) -> io::Result<()> {
        match outcome {
            CommandOutcome::Snapshot(snapshot) => self.snapshot(snapshot),
            other => {
                writeln!(self.out, "{other}")?;
                self.out.flush()
            }
        }
    }

    fn rejected(&mut self, error: &CommandError) -> io::Result<()> {
        writeln!(self.out, "Cannot do that: {}", error.reason())?;
        self.out.flush()
    }

    fn catch_up(&mut self, report: &CatchUpReport) -> io::Result<()> {
        if report.applied == 0 {
            return Ok(());
        }
        writeln!(self.out, "While you were away, {} ticks passed.", report.applied)?;
        if report.applied < report.due {
            writeln!(
                self.out,
                "({} more were skipped: offline progress is capped.)",
                report.due - report.applied
            )?;
        }
        if !report.completed.is_empty() {
            writeln!(self.out, "  Buildings completed: {}", report.completed.len())?;
        }
        for tech in &report.unlocked {
            writeln!(self.out, "  Researched {tech}")?;
        }
        for age in &report.ages {
            writeln!(self.out, "  Entered the {age} age")?;
        }
        if report.starved > 0 {
            writeln!(self.out, "  {} people starved", report.starved)?;
        }
        self.out.flush()
    }

    fn stats(&mut self, stats: &GameStats) -> io::Result<()> {
        writeln!(self.out, "Statistics:")?;
        for (resource, amount) in &stats.gathered {
            writeln!(self.out, "  {resource:<12}{:>12} gathered", format_amount(*amount))?;
        }
        writeln!(self.out, "  Buildings completed: {}", stats.total_buildings())?;
        writeln!(self.out, "  Techs researched:    {}", stats.techs_researched)?;
        writeln!(self.out, "  Ages advanced:       {}", stats.ages_reached)?;
        writeln!(self.out, "  People recruited:    {}", stats.recruited)?;
        writeln!(self.out, "  People starved:      {}", stats.starved)?;

        let recent: Vec<_> = stats.recent(5).collect();
        if !recent.is_empty() {
            writeln!(self.out, "Recent events:")?;
            for event in recent {
                writeln!(self.out, "  [tick {}] {}", event.tick, event.message)?;
            }
        }
        self.out.flush()
    }

    fn saves(&mut self, saves: &[SaveSummary]) -> io::Result<()> {
        if saves.is_empty() {
            writeln!(self.out, "No saves yet.")?;
        }
        for save in saves {
            writeln!(
                self.out,
                "  {:<16} tick {:>8}  {}  pop {}  ({})",
                save.name,
                save.tick,
                save.age,
                save.population,
                save.saved_at.format("%Y-%m-%d %H:%M")
            )?;
        }
        self.out.flush()
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civ_core::ids::{BuildingId, TechId};
    use civ_test_utils::fixtures::classic_engine;

    fn render(f: impl FnOnce(&mut TextDisplay<Vec<u8>>) -> io::Result<()>) -> String {
        let mut display = TextDisplay::new(Vec::new());
        f(&mut display).unwrap();
        String::from_utf8(display.into_inner()).unwrap()
    }

    #[test]
    fn test_format_rate_sign() {
        assert_eq!(format_rate(Fixed::from_num(2)), "+2.0/t");
        assert_eq!(format_rate(Fixed::from_num(-0.5)), "-0.5/t");
    }

    #[test]
    fn test_snapshot_lists_resources_and_population() {
        let snapshot = classic_engine().snapshot();
        let text = render(|d| d.snapshot(&snapshot));
        assert!(text.contains("Tick 0 | Stone Age"));
        assert!(text.contains("Food"));
        assert!(text.contains("Population: 1 / 1 housing, 1 idle"));
        assert!(text.contains("  Villager: 1, 1 idle"));
        assert!(text.contains("Can research: agriculture"));
    }

    #[test]
    fn test_quiet_tick_prints_nothing() {
        let text = render(|d| d.events(&TickEvents::default()));
        assert!(text.is_empty());
    }

    #[test]
    fn test_starvation_names_the_kind() {
        let events = TickEvents {
            tick: 3,
            starvation: Some(Casualty::Worker {
                kind: "scholar".into(),
                resource: "knowledge".into(),
            }),
            ..TickEvents::default()
        };
        let lines = describe_events(&events);
        assert_eq!(lines, vec!["A scholar gathering knowledge starved.".to_string()]);
    }

    #[test]
    fn test_event_lines() {
        let events = TickEvents {
            tick: 12,
            completed: vec![BuildingId::from("hut")],
            unlocked: vec![TechId::from("writing")],
            ..TickEvents::default()
        };
        let text = render(|d| d.events(&events));
        assert!(text.contains("[tick 12] Construction of hut complete."));
        assert!(text.contains("[tick 12] Research of writing complete."));
    }
}
