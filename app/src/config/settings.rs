//! Settings asset

use std::any::Any;
use std::path::PathBuf;
use std::rc::Rc;

use plinth::{service, AssetLoader, TypeKey};
use serde::Deserialize;
use tracing::{info, warn};

/// Shared game settings, loaded from disk rather than constructed
#[service(asset, order = -100)]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub volume: f32,
    pub target_score: u32,
    pub points_per_hit: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            target_score: 100,
            points_per_hit: 5,
        }
    }
}

/// Loads [`GameSettings`] from a JSON file, falling back to defaults
pub struct SettingsLoader {
    path: PathBuf,
}

impl SettingsLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> GameSettings {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => {
                info!(path = %self.path.display(), "no settings file, using defaults");
                return GameSettings::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "invalid settings file, using defaults");
            GameSettings::default()
        })
    }
}

impl AssetLoader for SettingsLoader {
    fn load(&self, key: TypeKey) -> Option<Rc<dyn Any>> {
        if key != TypeKey::of::<GameSettings>() {
            return None;
        }
        Some(Rc::new(self.read()))
    }
}
