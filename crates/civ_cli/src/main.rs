//! Civilization idle game for the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Play, resuming the autosave if there is one
//! cargo run -p civ_cli --bin civ -- play
//!
//! # Drive the game with JSON lines on stdin/stdout
//! cargo run -p civ_cli --bin civ -- play --json
//!
//! # Deterministic headless run
//! cargo run -p civ_cli --bin civ -- simulate --ticks 1000 --script opening.txt
//!
//! # Check a content file
//! cargo run -p civ_cli --bin civ -- validate data/content/hamlet.ron
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use civ_cli::{
    parse_script, run_simulation, validate_content, validate_content_file, CliConfig, CliError,
    DisplaySink, Overrides, ProtocolRunner, Session, TextDisplay,
};
use civ_core::data::ContentData;
use civ_core::engine::GameEngine;
use civ_core::rules::Ruleset;
use civ_core::save::save_path;

#[derive(Parser)]
#[command(name = "civ")]
#[command(about = "Grow a civilization from the Stone Age, one tick at a time")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game
    Play {
        /// Save slot to resume (default: the autosave slot)
        #[arg(short, long)]
        load: Option<String>,

        /// Configuration file (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Content file to play instead of the built-in content
        #[arg(long)]
        content: Option<PathBuf>,

        /// Real-time length of one tick in milliseconds
        #[arg(long)]
        tick_millis: Option<u64>,

        /// Directory for save files
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Speak the JSON-lines protocol instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a content file (default: the built-in content)
    Validate {
        /// Path to a RON content file
        path: Option<PathBuf>,
    },

    /// Run a deterministic headless game and print the result
    Simulate {
        /// Ticks to run after the script
        #[arg(short, long, default_value = "100")]
        ticks: u64,

        /// Script of commands and waits
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Content file to use instead of the built-in content
        #[arg(long)]
        content: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for the game)
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let result = match cli.command {
        Some(Commands::Play {
            load,
            config,
            content,
            tick_millis,
            save_dir,
            json,
        }) => cmd_play(
            load,
            config,
            Overrides {
                tick_millis,
                content_path: content,
                save_dir,
            },
            json,
        ),
        Some(Commands::Validate { path }) => cmd_validate(path),
        Some(Commands::Simulate {
            ticks,
            script,
            content,
            json,
        }) => cmd_simulate(ticks, script, content, json),
        None => cmd_play(None, None, Overrides::default(), false),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Play interactively or over the JSON protocol.
fn cmd_play(
    load: Option<String>,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    json: bool,
) -> Result<(), CliError> {
    let config = CliConfig::load_or_default(config_path.as_deref())?.with_overrides(overrides);

    if json {
        let rules = Arc::new(Ruleset::new(config.load_content()?)?);
        let engine = match load {
            Some(name) => GameEngine::load(rules, save_path(&config.save_dir, &name)?)?.0,
            None => GameEngine::with_rules(rules),
        };
        let mut runner = ProtocolRunner::new(engine, config.save_dir.clone());
        runner.run(io::stdin().lock(), io::stdout().lock())?;
        return Ok(());
    }

    tracing::info!(tick_millis = config.tick_millis, "starting interactive session");
    let session = Session::start(config, load, Box::new(TextDisplay::stdout()), Utc::now())?;
    session.run(io::stdin().lock())
}

/// Validate a content file.
fn cmd_validate(path: Option<PathBuf>) -> Result<(), CliError> {
    let summary = match &path {
        Some(path) => {
            tracing::info!("Validating content file: {}", path.display());
            validate_content_file(path)?
        }
        None => validate_content(ContentData::classic())?,
    };
    println!("OK {summary}");
    Ok(())
}

/// Run a headless game.
fn cmd_simulate(
    ticks: u64,
    script: Option<PathBuf>,
    content: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let content = match content {
        Some(path) => ContentData::load(path)?,
        None => ContentData::classic(),
    };
    let steps = match script {
        Some(path) => parse_script(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let mut engine = GameEngine::new(content)?;
    let report = run_simulation(&mut engine, &steps, ticks)?;

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
        println!("{text}");
    } else {
        let mut display = TextDisplay::stdout();
        display.snapshot(&report.snapshot)?;
        for rejection in &report.rejected {
            println!(
                "line {}: '{}' rejected: {}",
                rejection.line, rejection.text, rejection.reason
            );
        }
        println!("State hash: {:016x}", report.hash);
    }
    Ok(())
}
