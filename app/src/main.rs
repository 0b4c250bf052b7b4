use std::rc::Rc;

use plinth::Application;
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod config;
mod services;

/// Initialize logging
///
/// `RUST_LOG` overrides the defaults; the registry's own debug output is
/// visible with `RUST_LOG=plinth=debug`.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("app=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
    Ok(())
}

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let game = config::GameConfig::from_env();

    Application::new()
        .assets(Rc::new(config::SettingsLoader::new(game.settings_path)))
        .bootstrap(bootstrap::register)
        .run();
}
