mod settings;

pub use settings::{GameSettings, SettingsLoader};

use plinth::config::env;

/// Game configuration
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// JSON file the settings asset is read from
    pub settings_path: String,
    /// Frame at which the audio mixer is swapped for a fresh one
    pub mixer_swap_frame: u64,
    /// A player scores every this many frames
    pub score_interval: u64,
}

impl GameConfig {
    /// Build config from environment variables
    pub fn from_env() -> Self {
        Self {
            settings_path: env("GAME_SETTINGS", "settings.json".to_string()),
            mixer_swap_frame: env("GAME_MIXER_SWAP_FRAME", 30),
            score_interval: env("GAME_SCORE_INTERVAL", 10),
        }
    }
}
