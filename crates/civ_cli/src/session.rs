//! Interactive terminal session.
//!
//! A background ticker advances the engine in real time while the
//! foreground reads player input. Both go through [`SharedEngine`], so a
//! tick and a command never overlap.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};

use civ_core::clock::Clock;
use civ_core::command::CommandOutcome;
use civ_core::engine::{CatchUpReport, GameEngine, SharedEngine};
use civ_core::rules::Ruleset;
use civ_core::save::{list_saves, save_path};

use crate::config::CliConfig;
use crate::display::DisplaySink;
use crate::error::CliError;

/// Help text for the session.
pub const HELP: &str = "\
Commands:
  build <building>              start constructing a building
  research <tech>               start researching a technology
  assign [kind] <resource> <n> [...]
                                put people to work gathering
  unassign [kind] <resource>    send a resource's workers idle
  recruit [kind] [n]            recruit people (needs housing and food)
  status                        show the settlement
Session:
  stats                         lifetime statistics
  save [name]                   save the game
  load <name>                   load a saved game
  saves                         list saved games
  help                          this text
  quit                          save and exit";

/// Longest the ticker sleeps between clock checks.
const MAX_POLL: Duration = Duration::from_millis(250);

/// Whether the input loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Leave the session.
    Quit,
}

type SharedDisplay = Arc<Mutex<Box<dyn DisplaySink>>>;

fn lock_display(display: &SharedDisplay) -> MutexGuard<'_, Box<dyn DisplaySink>> {
    display.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One play session.
pub struct Session {
    engine: SharedEngine,
    rules: Arc<Ruleset>,
    config: CliConfig,
    display: SharedDisplay,
    slot: Arc<Mutex<String>>,
    clock: Arc<Mutex<Clock>>,
}

impl Session {
    /// Build the ruleset, resume `slot` (or the autosave) if it exists and
    /// replay offline progress up to `now`.
    pub fn start(
        config: CliConfig,
        slot: Option<String>,
        display: Box<dyn DisplaySink>,
        now: DateTime<Utc>,
    ) -> Result<Self, CliError> {
        let rules = Arc::new(Ruleset::new(config.load_content()?)?);
        let slot = slot.unwrap_or_else(|| config.autosave.clone());
        let clock = Arc::new(Mutex::new(Clock::new(config.tick_duration(), now)));

        let session = Self {
            engine: SharedEngine::new(GameEngine::with_rules(Arc::clone(&rules))),
            rules,
            config,
            display: Arc::new(Mutex::new(display)),
            slot: Arc::new(Mutex::new(slot)),
            clock,
        };
        session.show(|d| d.banner(session.rules.name()));

        let path = save_path(&session.config.save_dir, &session.slot())?;
        if path.exists() {
            session.resume(&path, now)?;
        } else {
            tracing::info!(slot = %session.slot(), "starting a new game");
        }

        let snapshot = session.engine.snapshot();
        session.show(|d| d.snapshot(&snapshot));
        Ok(session)
    }

    /// The engine shared with the ticker.
    #[must_use]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Slot the game is saved to on quit and by autosave.
    #[must_use]
    pub fn slot(&self) -> String {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn show(&self, f: impl FnOnce(&mut dyn DisplaySink) -> std::io::Result<()>) {
        let mut display = lock_display(&self.display);
        if let Err(e) = f(display.as_mut()) {
            tracing::warn!(error = %e, "display write failed");
        }
    }

    fn slot_path(&self, name: &str) -> Result<PathBuf, CliError> {
        Ok(save_path(&self.config.save_dir, name)?)
    }

    /// Load a save into the running session, falling back to a fresh game.
    fn resume(&self, path: &std::path::Path, now: DateTime<Utc>) -> Result<(), CliError> {
        let outcome = GameEngine::load_or_fresh(Arc::clone(&self.rules), path);
        if let Some(error) = &outcome.error {
            self.show(|d| d.message(&format!("Could not load save ({error}); starting a new game.")));
        }

        let mut engine = outcome.engine;
        if let Some(saved_at) = outcome.saved_at {
            let report = engine.catch_up(
                saved_at,
                now,
                self.config.tick_duration(),
                self.config.max_catch_up_ticks,
            )?;
            self.show(|d| d.catch_up(&report));
        }

        self.engine.replace(engine);
        self.clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset(now);
        Ok(())
    }

    /// Save the current game to slot `name`.
    pub fn save(&self, name: &str, now: DateTime<Utc>) -> Result<PathBuf, CliError> {
        let path = self.slot_path(name)?;
        self.engine.lock().save(&path, now)?;
        Ok(path)
    }

    /// Handle one line of player input.
    pub fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let argument = words.next();

        match verb.as_str() {
            "help" | "?" => self.show(|d| d.message(HELP)),
            "quit" | "exit" => return Flow::Quit,
            "stats" => {
                let stats = self.engine.lock().state().stats.clone();
                self.show(|d| d.stats(&stats));
            }
            "saves" => match list_saves(&self.config.save_dir) {
                Ok(saves) => self.show(|d| d.saves(&saves)),
                Err(e) => self.show(|d| d.message(&format!("Could not list saves: {e}"))),
            },
            "save" => {
                let name = argument.map_or_else(|| self.slot(), str::to_string);
                match self.save(&name, now) {
                    Ok(path) => {
                        self.show(|d| d.message(&format!("Saved to {}", path.display())));
                    }
                    Err(e) => self.show(|d| d.message(&format!("Save failed: {e}"))),
                }
            }
            "load" => match argument {
                None => self.show(|d| d.message("Usage: load <name>")),
                Some(name) => self.load(name, now),
            },
            _ => self.submit(line),
        }
        Flow::Continue
    }

    fn load(&mut self, name: &str, now: DateTime<Utc>) {
        let path = match self.slot_path(name) {
            Ok(path) if path.exists() => path,
            Ok(_) => {
                self.show(|d| d.message(&format!("No save named '{name}'.")));
                return;
            }
            Err(e) => {
                self.show(|d| d.message(&format!("Load failed: {e}")));
                return;
            }
        };

        match GameEngine::load(Arc::clone(&self.rules), &path) {
            Ok((mut engine, saved_at)) => {
                let caught_up = engine.catch_up(
                    saved_at,
                    now,
                    self.config.tick_duration(),
                    self.config.max_catch_up_ticks,
                );
                self.report_catch_up(&caught_up);
                self.engine.replace(engine);
                *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = name.to_string();
                self.clock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reset(now);
                let snapshot = self.engine.snapshot();
                self.show(|d| d.snapshot(&snapshot));
            }
            // The running game is left untouched.
            Err(e) => self.show(|d| d.message(&format!("Load failed: {e}"))),
        }
    }

    /// Show offline progress after a load. A failed catch-up keeps the ticks
    /// that did run, so the player is told where it stopped.
    fn report_catch_up(&self, caught_up: &civ_core::error::Result<CatchUpReport>) {
        match caught_up {
            Ok(report) => self.show(|d| d.catch_up(report)),
            Err(e) => {
                tracing::error!(error = %e, "catch-up after load failed");
                self.show(|d| d.message(&format!("Catch-up after load failed: {e}")));
            }
        }
    }

    fn submit(&self, line: &str) {
        match self.engine.submit_text(line) {
            Ok(CommandOutcome::Snapshot(snapshot)) => self.show(|d| d.snapshot(&snapshot)),
            Ok(outcome) => self.show(|d| d.outcome(&outcome)),
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(error = %e, "command aborted on invariant violation");
                }
                self.show(|d| d.rejected(&e));
            }
        }
    }

    /// Apply every tick due at `now`. Returns how many ran.
    pub fn run_due_ticks(&self, now: DateTime<Utc>) -> Result<u64, CliError> {
        run_due_ticks(&self.engine, &self.clock, &self.display, &self.config, &self.slot, now)
    }

    /// Run the session until the player quits or input ends.
    ///
    /// The game is saved to the current slot on the way out.
    pub fn run<R: BufRead>(mut self, input: R) -> Result<(), CliError> {
        let running = Arc::new(AtomicBool::new(true));
        let ticker = self.spawn_ticker(Arc::clone(&running));

        for line in input.lines() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if self.handle_line(&line?, Utc::now()) == Flow::Quit {
                break;
            }
        }

        running.store(false, Ordering::SeqCst);
        let halted = ticker.join().unwrap_or_else(|_| Some("ticker thread panicked".to_string()));

        let slot = self.slot();
        match self.save(&slot, Utc::now()) {
            Ok(path) => self.show(|d| d.message(&format!("Game saved to {}. Farewell.", path.display()))),
            Err(e) => {
                tracing::error!(error = %e, "final save failed");
                self.show(|d| d.message(&format!("Could not save: {e}")));
            }
        }

        match halted {
            Some(reason) => Err(CliError::Halted(reason)),
            None => Ok(()),
        }
    }

    fn spawn_ticker(&self, running: Arc<AtomicBool>) -> JoinHandle<Option<String>> {
        let engine = self.engine.clone();
        let clock = Arc::clone(&self.clock);
        let display = Arc::clone(&self.display);
        let config = self.config.clone();
        let slot = Arc::clone(&self.slot);
        let poll = config.tick_duration().min(MAX_POLL);

        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(poll);
                if let Err(e) = run_due_ticks(&engine, &clock, &display, &config, &slot, Utc::now()) {
                    tracing::error!(error = %e, "simulation halted");
                    running.store(false, Ordering::SeqCst);
                    return Some(e.to_string());
                }
            }
            None
        })
    }
}

fn run_due_ticks(
    engine: &SharedEngine,
    clock: &Mutex<Clock>,
    display: &SharedDisplay,
    config: &CliConfig,
    slot: &Mutex<String>,
    now: DateTime<Utc>,
) -> Result<u64, CliError> {
    let due = clock
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .due_ticks(now, None);

    for _ in 0..due {
        let events = engine.tick()?;
        if !events.is_quiet() {
            if let Err(e) = lock_display(display).events(&events) {
                tracing::warn!(error = %e, "display write failed");
            }
        }
        if config.autosave_interval > 0 && events.tick % config.autosave_interval == 0 {
            let slot = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
            let path = save_path(&config.save_dir, &slot)?;
            if let Err(e) = engine.lock().save(&path, now) {
                tracing::warn!(error = %e, "autosave failed");
            }
        }
    }
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::TextDisplay;
    use chrono::TimeZone;
    use civ_core::error::GameError;

    /// A display that writes into a buffer the test can read back.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap() + chrono::TimeDelta::seconds(secs.into())
    }

    fn session(dir: &std::path::Path) -> (Session, Captured) {
        let captured = Captured::default();
        let config = CliConfig {
            save_dir: dir.to_path_buf(),
            autosave_interval: 0,
            ..CliConfig::default()
        };
        let session = Session::start(
            config,
            None,
            Box::new(TextDisplay::new(captured.clone())),
            at(0),
        )
        .unwrap();
        (session, captured)
    }

    #[test]
    fn test_start_shows_banner_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let (_, out) = session(dir.path());
        let text = out.text();
        assert!(text.contains("=== Civilization: Classic ==="));
        assert!(text.contains("Tick 0"));
    }

    #[test]
    fn test_commands_and_meta_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, out) = session(dir.path());

        assert_eq!(session.handle_line("assign food 1", at(0)), Flow::Continue);
        assert_eq!(session.handle_line("build castle", at(0)), Flow::Continue);
        assert_eq!(session.handle_line("help", at(0)), Flow::Continue);
        assert_eq!(session.handle_line("QUIT", at(0)), Flow::Quit);

        let text = out.text();
        assert!(text.contains("Workers (villager): 1 on food, 0 idle"));
        assert!(text.contains("Cannot do that: Unknown type: castle"));
        assert!(text.contains("unassign [kind] <resource>"));
    }

    #[test]
    fn test_ticks_follow_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(dir.path());

        assert_eq!(session.run_due_ticks(at(5)).unwrap(), 5);
        assert_eq!(session.run_due_ticks(at(5)).unwrap(), 0);
        assert_eq!(session.engine().snapshot().tick, 5);
    }

    #[test]
    fn test_save_then_resume_catches_up() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut session, _) = session(dir.path());
            session.handle_line("assign wood 1", at(0));
            session.run_due_ticks(at(10)).unwrap();
            session.handle_line("save", at(10));
        }

        let captured = Captured::default();
        let config = CliConfig {
            save_dir: dir.path().to_path_buf(),
            autosave_interval: 0,
            ..CliConfig::default()
        };
        let resumed = Session::start(
            config,
            None,
            Box::new(TextDisplay::new(captured.clone())),
            at(70),
        )
        .unwrap();

        assert_eq!(resumed.engine().snapshot().tick, 70);
        assert!(captured.text().contains("While you were away, 60 ticks passed."));
    }

    #[test]
    fn test_corrupt_autosave_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("autosave.ron"), "garbage").unwrap();

        let (session, out) = session(dir.path());
        assert_eq!(session.engine().snapshot().tick, 0);
        assert!(out.text().contains("Could not load save"));
    }

    #[test]
    fn test_load_missing_slot_keeps_game() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, out) = session(dir.path());
        session.run_due_ticks(at(3)).unwrap();

        session.handle_line("load nowhere", at(3));
        assert_eq!(session.engine().snapshot().tick, 3);
        assert!(out.text().contains("No save named 'nowhere'."));
    }

    #[test]
    fn test_autosave_follows_loaded_slot() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            save_dir: dir.path().to_path_buf(),
            autosave_interval: 5,
            ..CliConfig::default()
        };
        let display = Box::new(TextDisplay::new(Captured::default()));
        let mut session = Session::start(config, None, display, at(0)).unwrap();

        session.handle_line("save b", at(0));
        session.run_due_ticks(at(3)).unwrap();
        session.handle_line("load b", at(3));
        assert_eq!(session.slot(), "b");

        session.run_due_ticks(at(10)).unwrap();
        assert!(!dir.path().join("autosave.ron").exists());
        let (saved, _) = GameEngine::load(Arc::clone(&session.rules), &dir.path().join("b.ron")).unwrap();
        assert!(saved.state().tick > 3);
    }

    #[test]
    fn test_failed_catch_up_is_shown() {
        let dir = tempfile::tempdir().unwrap();
        let (session, out) = session(dir.path());

        session.report_catch_up(&Err(GameError::InvalidState("tick 4 failed".to_string())));
        assert!(out
            .text()
            .contains("Catch-up after load failed: Invalid game state: tick 4 failed"));
    }

    #[test]
    fn test_run_saves_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            save_dir: dir.path().to_path_buf(),
            ..CliConfig::default()
        };
        let display = Box::new(TextDisplay::new(Captured::default()));
        let session = Session::start(config, None, display, Utc::now()).unwrap();

        session.run(std::io::Cursor::new("status\nquit\n")).unwrap();
        assert!(dir.path().join("autosave.ron").exists());
    }
}
