//! Application builder for plinth hosts
//!
//! Provides a fluent builder API to assemble the registry, run the
//! configuration pass and drive the update loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use plinth::Application;
//!
//! fn main() {
//!     Application::new()
//!         .bootstrap(bootstrap::register)
//!         .run();
//! }
//! ```

use std::path::Path;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{Config, LocatorConfig};
use crate::container::global::Locator;
use crate::container::host::{AssetLoader, Liveness, SceneQuery};
use crate::container::provider::{registration_table, ConfigureReport, Registration};
use crate::container::Registry;
use crate::debug::InjectionObserver;

/// CLI structure for plinth applications
#[derive(Parser)]
#[command(name = "app")]
#[command(about = "plinth application runner and utilities")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the registry and run the update loop (default command)
    Run {
        /// Number of update ticks to run
        #[arg(long, default_value = "60")]
        frames: u64,
    },
    /// List the registration table
    Services {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

type BootstrapFn = Box<dyn FnOnce(&Registry)>;

/// Application builder
///
/// Use this to plug host collaborators into the registry and start it.
pub struct Application {
    config: Option<LocatorConfig>,
    scene: Option<Rc<dyn SceneQuery>>,
    assets: Option<Rc<dyn AssetLoader>>,
    liveness: Option<Rc<dyn Liveness>>,
    observer: Option<Rc<dyn InjectionObserver>>,
    bootstrap_fn: Option<BootstrapFn>,
    registrations: Vec<Registration>,
    collected: bool,
}

impl Application {
    /// Create a new application builder
    pub fn new() -> Self {
        Application {
            config: None,
            scene: None,
            assets: None,
            liveness: None,
            observer: None,
            bootstrap_fn: None,
            registrations: Vec::new(),
            collected: true,
        }
    }

    /// Use `config` instead of loading `.env` files and `PLINTH_*` variables
    pub fn config(mut self, config: LocatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn scene(mut self, scene: Rc<dyn SceneQuery>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn assets(mut self, assets: Rc<dyn AssetLoader>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn liveness(mut self, liveness: Rc<dyn Liveness>) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn observer(mut self, observer: Rc<dyn InjectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register a bootstrap function
    ///
    /// Called after the configuration pass, with every eager service in place.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// Application::new()
    ///     .bootstrap(bootstrap::register)
    /// ```
    pub fn bootstrap<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Registry) + 'static,
    {
        self.bootstrap_fn = Some(Box::new(f));
        self
    }

    /// Add a registration on top of the `#[service]` table
    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Ignore the `#[service]` table; only explicit registrations are used
    pub fn without_collected(mut self) -> Self {
        self.collected = false;
        self
    }

    /// The registrations the configuration pass will see, sorted by order
    pub fn table(&self) -> Vec<Registration> {
        let mut table = if self.collected {
            registration_table()
        } else {
            Vec::new()
        };
        table.extend(self.registrations.iter().cloned());
        table.sort_by_key(|registration| registration.order_value());
        table
    }

    /// Build the registry, install it as the current one and configure it
    pub fn start(self) -> Runtime {
        let table = self.table();
        let Application {
            config,
            scene,
            assets,
            liveness,
            observer,
            bootstrap_fn,
            ..
        } = self;

        let config = config.unwrap_or_else(|| Config::init(Path::new(".")));
        let mut builder = Registry::builder().config(config);
        if let Some(scene) = scene {
            builder = builder.scene(scene);
        }
        if let Some(assets) = assets {
            builder = builder.assets(assets);
        }
        if let Some(liveness) = liveness {
            builder = builder.liveness(liveness);
        }
        if let Some(observer) = observer {
            builder = builder.observer(observer);
        }

        let registry = Rc::new(builder.build());
        let previous = Locator::install(registry.clone());
        let report = registry.configure(table);

        if let Some(bootstrap_fn) = bootstrap_fn {
            bootstrap_fn(&registry);
        }

        Runtime {
            registry,
            report,
            previous,
            frames: 0,
        }
    }

    /// Run the application
    ///
    /// This parses CLI arguments and executes the appropriate command:
    /// - `run` (default): configure and run the update loop
    /// - `services`: print the registration table
    pub fn run(self) {
        let cli = Cli::parse();

        match cli.command {
            None => self.start().frames(60),
            Some(Commands::Run { frames }) => self.start().frames(frames),
            Some(Commands::Services { json }) => {
                Self::list_services(&self.table(), json);
            }
        }
    }

    fn list_services(table: &[Registration], json: bool) {
        let infos: Vec<_> = table.iter().map(Registration::info).collect();
        if json {
            match serde_json::to_string_pretty(&infos) {
                Ok(out) => println!("{}", out),
                Err(e) => eprintln!("Failed to serialize registration table: {}", e),
            }
            return;
        }

        println!("Registered services:");
        println!();
        if infos.is_empty() {
            eprintln!("No services registered.");
            return;
        }
        for info in infos {
            let mut flags = Vec::new();
            if info.asset {
                flags.push("asset");
            }
            if info.lazy {
                flags.push("lazy");
            }
            if info.dynamic {
                flags.push("dynamic");
            }
            if info.editor_only {
                flags.push("editor-only");
            }
            println!(
                "  {:>5}  {:<48} {:<12} {}",
                info.order,
                info.name,
                info.group,
                flags.join(", ")
            );
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

/// A started application
pub struct Runtime {
    registry: Rc<Registry>,
    report: ConfigureReport,
    previous: Option<Rc<Registry>>,
    frames: u64,
}

impl Runtime {
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// Outcome of the configuration pass
    pub fn report(&self) -> &ConfigureReport {
        &self.report
    }

    /// Run one update tick; returns the number of tasks that ran
    pub fn tick(&mut self) -> usize {
        self.frames += 1;
        self.registry.tick()
    }

    /// Run `count` ticks
    pub fn frames(mut self, count: u64) {
        let mut tasks = 0;
        for _ in 0..count {
            tasks += self.tick();
        }
        info!(frames = count, tasks, "update loop finished");
    }

    /// Ticks run so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        Locator::restore(self.previous.take());
    }
}
