//! Configuration module
//!
//! - Automatic `.env` file loading with environment-based precedence
//! - [`LocatorConfig`], read from `PLINTH_*` variables or built explicitly
//!
//! # Example
//!
//! ```rust,no_run
//! use plinth::Config;
//!
//! let config = Config::init(std::path::Path::new("."));
//! println!("editor mode: {}", config.editor);
//! ```

pub mod env;
pub mod locator;

pub use env::{env, env_list, env_optional, load_dotenv, Environment};
pub use locator::{LocatorConfig, LocatorConfigBuilder};

use std::path::Path;

use tracing::debug;

/// Config facade
pub struct Config;

impl Config {
    /// Load `.env` files from `project_root` and read the locator settings
    ///
    /// Call once at startup, before building the registry.
    pub fn init(project_root: &Path) -> LocatorConfig {
        load_dotenv(project_root);
        let config = LocatorConfig::from_env();
        debug!(
            environment = %config.environment,
            editor = config.editor,
            groups = ?config.groups,
            "locator config loaded"
        );
        config
    }
}
