//! Save files.
//!
//! A save is a pretty-printed RON document holding the full [`GameState`]
//! and the wall-clock time it was written, which drives the offline
//! catch-up pass on resume. Writes go to a temporary file that is renamed
//! into place, so a crash mid-write never leaves a truncated save.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::GameState;

/// Save file format version for compatibility.
pub const SAVE_VERSION: u32 = 1;

/// File extension of save files.
pub const SAVE_EXTENSION: &str = "ron";

/// Error type for saving and loading.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure.
    #[error("Failed to access {path}: {source}")]
    Io {
        /// File or directory involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The state could not be encoded.
    #[error("Failed to serialize save: {0}")]
    Serialize(String),

    /// The file is not a valid save.
    #[error("Failed to parse save file: {0}")]
    Deserialize(String),

    /// The save was written by an incompatible version.
    #[error("Save version mismatch: expected {expected}, got {found}")]
    VersionMismatch {
        /// Version this build reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// The save references ids the loaded content does not define.
    #[error("Save does not match the loaded content: {0}")]
    Incompatible(String),

    /// The save name contains characters that are not allowed.
    #[error("Invalid save name '{0}': use letters, digits, '-' and '_'")]
    InvalidName(String),
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Contents of a save file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveGame {
    /// Format version.
    pub version: u32,
    /// Name of the content set the state was played with.
    pub content: String,
    /// When the save was written.
    pub saved_at: DateTime<Utc>,
    /// The full game state.
    pub state: GameState,
}

impl SaveGame {
    /// Wrap a state for saving.
    #[must_use]
    pub fn new(state: GameState, content: impl Into<String>, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SAVE_VERSION,
            content: content.into(),
            saved_at,
            state,
        }
    }

    /// Encode as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, PersistenceError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| PersistenceError::Serialize(e.to_string()))
    }

    /// Decode from RON and check the version.
    pub fn from_ron_str(text: &str) -> Result<Self, PersistenceError> {
        let save: Self =
            ron::from_str(text).map_err(|e| PersistenceError::Deserialize(e.to_string()))?;
        if save.version != SAVE_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: SAVE_VERSION,
                found: save.version,
            });
        }
        Ok(save)
    }

    /// Write atomically to `path`, creating parent directories.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let text = self.to_ron_string()?;
        let temp = path.with_extension(format!("{SAVE_EXTENSION}.tmp"));
        fs::write(&temp, text).map_err(|e| PersistenceError::io(&temp, e))?;
        fs::rename(&temp, path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            PersistenceError::io(path, e)
        })?;

        tracing::info!(path = %path.display(), tick = self.state.tick, "game saved");
        Ok(())
    }

    /// Read and version-check a save file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        Self::from_ron_str(&text)
    }
}

/// Path of the save called `name` inside `dir`.
///
/// Names are restricted to letters, digits, `-` and `_` so a save name can
/// never escape the save directory.
pub fn save_path<P: AsRef<Path>>(dir: P, name: &str) -> Result<PathBuf, PersistenceError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(PersistenceError::InvalidName(name.to_string()));
    }
    Ok(dir.as_ref().join(format!("{name}.{SAVE_EXTENSION}")))
}

/// Summary of one save for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSummary {
    /// Save name (file stem).
    pub name: String,
    /// When it was written.
    pub saved_at: DateTime<Utc>,
    /// Tick of the saved state.
    pub tick: u64,
    /// Age of the saved state.
    pub age: String,
    /// Population of the saved state.
    pub population: u32,
}

/// List the saves in `dir`, newest first.
///
/// A missing directory is an empty list. Files that fail to parse are
/// skipped with a warning.
pub fn list_saves<P: AsRef<Path>>(dir: P) -> Result<Vec<SaveSummary>, PersistenceError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| PersistenceError::io(dir, e))?;
    let mut saves = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PersistenceError::io(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SAVE_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match SaveGame::read(&path) {
            Ok(save) => saves.push(SaveSummary {
                name: name.to_string(),
                saved_at: save.saved_at,
                tick: save.state.tick,
                age: save.state.age.to_string(),
                population: save.state.population.total(),
            }),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable save"),
        }
    }

    saves.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.name.cmp(&b.name)));
    Ok(saves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Ruleset;
    use chrono::TimeZone;

    fn sample() -> SaveGame {
        let rules = Ruleset::classic().unwrap();
        let mut state = GameState::new(&rules);
        state.tick = 42;
        state.unlocked.insert("agriculture".into());
        let saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        SaveGame::new(state, "Classic", saved_at)
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(dir.path(), "slot1").unwrap();
        let save = sample();

        save.write(&path).unwrap();
        let loaded = SaveGame::read(&path).unwrap();
        assert_eq!(loaded, save);
        assert!(!path.with_extension("ron.tmp").exists());
    }

    #[test]
    fn test_version_mismatch() {
        let mut save = sample();
        save.version = SAVE_VERSION + 1;
        let text = save.to_ron_string().unwrap();
        assert!(matches!(
            SaveGame::from_ron_str(&text),
            Err(PersistenceError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_garbage_is_deserialize_error() {
        assert!(matches!(
            SaveGame::from_ron_str("not a save"),
            Err(PersistenceError::Deserialize(_))
        ));
    }

    #[test]
    fn test_save_names() {
        assert!(save_path("saves", "auto_save-2").is_ok());
        assert!(save_path("saves", "../escape").is_err());
        assert!(save_path("saves", "").is_err());
    }

    #[test]
    fn test_list_saves() {
        let dir = tempfile::tempdir().unwrap();
        let older = sample();
        let mut newer = sample();
        newer.saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();

        older.write(save_path(dir.path(), "older").unwrap()).unwrap();
        newer.write(save_path(dir.path(), "newer").unwrap()).unwrap();
        fs::write(dir.path().join("broken.ron"), "nonsense").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let saves = list_saves(dir.path()).unwrap();
        let names: Vec<&str> = saves.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["newer", "older"]);
        assert_eq!(saves[0].tick, 42);
    }

    #[test]
    fn test_list_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_saves(dir.path().join("nope")).unwrap().is_empty());
    }
}
