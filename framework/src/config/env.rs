//! Environment detection and `.env` loading

use std::path::Path;

/// The kind of host the registry runs in, from `PLINTH_ENV`
///
/// Selects which `.env.{suffix}` files are loaded and supplies the editor
/// mode default when `PLINTH_EDITOR` is not set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Running inside the authoring tool; editor-only services are created
    Editor,
    /// A shipped build
    Player,
    /// Automated tests
    Testing,
    Custom(String),
}

impl Environment {
    /// Detect environment from PLINTH_ENV or default to Player
    pub fn detect() -> Self {
        Self::parse(std::env::var("PLINTH_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("editor") => Self::Editor,
            Some("testing") => Self::Testing,
            Some("player") | Some("") | None => Self::Player,
            Some(other) => Self::Custom(other.to_string()),
        }
    }

    /// Get the .env file suffix for this environment
    pub fn env_file_suffix(&self) -> &str {
        match self {
            Self::Editor => "editor",
            Self::Player => "player",
            Self::Testing => "testing",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Whether editor mode is on unless configured otherwise
    pub fn is_editor(&self) -> bool {
        matches!(self, Self::Editor)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.env_file_suffix())
    }
}

/// Load environment variables from .env files with proper precedence
///
/// Precedence (later files override earlier):
/// 1. .env (base defaults)
/// 2. .env.local (local overrides, not committed)
/// 3. .env.{environment} (environment-specific)
/// 4. .env.{environment}.local (environment-specific local overrides)
/// 5. Actual system environment variables (highest priority)
pub fn load_dotenv(project_root: &Path) -> Environment {
    let env = Environment::detect();

    // dotenvy never overwrites, so the most specific file goes first
    let suffix = env.env_file_suffix();
    let _ = dotenvy::from_path(project_root.join(format!(".env.{}.local", suffix)));
    let _ = dotenvy::from_path(project_root.join(format!(".env.{}", suffix)));
    let _ = dotenvy::from_path(project_root.join(".env.local"));
    let _ = dotenvy::from_path(project_root.join(".env"));

    env
}

/// Get an environment variable with a default value
///
/// # Example
/// ```
/// use plinth::config::env;
///
/// let frames: u64 = env("PLINTH_FRAMES", 60);
/// let groups = env("PLINTH_GROUPS", String::new());
/// ```
pub fn env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get an optional environment variable
///
/// # Example
/// ```
/// use plinth::config::env_optional;
///
/// let editor: Option<bool> = env_optional("PLINTH_EDITOR");
/// ```
pub fn env_optional<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse a comma separated list, dropping empty items
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
