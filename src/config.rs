use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::session::SessionTiming;

/// User-tunable settings, stored as JSON in the platform config dir
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoachConfig {
    /// Rest before moving on to the next exercise
    pub transition_rest_secs: u32,
    /// Delay between choosing a rating and saving the session
    pub settle_delay_ms: u64,
    /// Rows shown by `history`
    pub history_limit: usize,
    /// Overrides the default database location
    pub db_path: Option<PathBuf>,
    /// Display language tag, kept for the presentation layer
    pub language: String,
}

impl Default for CoachConfig {
    fn default() -> Self {
        let timing = SessionTiming::default();
        Self {
            transition_rest_secs: timing.rest_before_next_exercise_s,
            settle_delay_ms: timing.settle_delay.as_millis() as u64,
            history_limit: 20,
            db_path: None,
            language: "en".to_string(),
        }
    }
}

impl CoachConfig {
    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            rest_before_next_exercise_s: self.transition_rest_secs,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ..SessionTiming::default()
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("repcoach.db"))
    }
}

pub trait ConfigStore {
    fn load(&self) -> CoachConfig;
    fn save(&self, cfg: &CoachConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> CoachConfig {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<CoachConfig>(&bytes).unwrap_or_else(|err| {
                tracing::warn!(path = %self.path.display(), %err, "ignoring unreadable config");
                CoachConfig::default()
            }),
            Err(_) => CoachConfig::default(),
        }
    }

    fn save(&self, cfg: &CoachConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
