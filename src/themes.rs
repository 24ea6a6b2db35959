//! Theme catalog: named scores, bundled with the crate or loaded from disk.
//!
//! A theme is a `.bpscore` file: a score document in JSON. Malformed theme
//! files are skipped with a warning so one bad file does not hide the rest.

use crate::score::{Score, ScoreError};
use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extension of theme documents.
pub const THEME_EXTENSION: &str = "bpscore";

const BUNDLED: [(&str, &str); 3] = [
    ("still_water", include_str!("../scores/still_water.bpscore")),
    ("night_rain", include_str!("../scores/night_rain.bpscore")),
    ("glass_garden", include_str!("../scores/glass_garden.bpscore")),
];

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme I/O: {0}")]
    Io(#[from] io::Error),
    #[error("theme {path:?}: {source}")]
    Score {
        path: PathBuf,
        #[source]
        source: ScoreError,
    },
    #[error("no theme named {0:?}")]
    NotFound(String),
}

/// Ordered collection of scores, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct ThemeCatalog {
    scores: Vec<Score>,
}

impl ThemeCatalog {
    pub fn new() -> Self {
        Self { scores: Vec::new() }
    }

    /// The themes compiled into the crate. "Still Water" comes first.
    pub fn bundled() -> Self {
        let mut catalog = Self::new();
        for (file, text) in BUNDLED {
            match Score::from_json_str(text) {
                Ok(score) => catalog.insert(score),
                Err(e) => warn!("Bundled theme {} is invalid: {}", file, e),
            }
        }
        catalog
    }

    /// Load every `.bpscore` file in `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Self, ThemeError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == THEME_EXTENSION))
            .collect();
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            match load_file(&path) {
                Ok(score) => catalog.insert(score),
                Err(e) => warn!("Skipping {}", e),
            }
        }
        info!("Loaded {} theme(s) from {:?}", catalog.len(), dir);
        Ok(catalog)
    }

    /// Add a score, replacing any theme with the same name.
    pub fn insert(&mut self, score: Score) {
        match self
            .scores
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(&score.name))
        {
            Some(existing) => *existing = score,
            None => self.scores.push(score),
        }
    }

    /// Fold another catalog into this one; its themes win on name clashes.
    pub fn merge(&mut self, other: ThemeCatalog) {
        for score in other.scores {
            self.insert(score);
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Result<&Score, ThemeError> {
        self.scores
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ThemeError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scores.iter().map(|s| s.name.as_str())
    }

    pub fn default_score(&self) -> Option<&Score> {
        self.scores.first()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Read and load a single score file.
pub fn load_file(path: &Path) -> Result<Score, ThemeError> {
    let text = fs::read_to_string(path)?;
    Score::from_json_str(&text).map_err(|source| ThemeError::Score {
        path: path.to_path_buf(),
        source,
    })
}
