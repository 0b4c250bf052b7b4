//! plinth: a service locator with deferred field injection and a
//! reentrancy-safe typed event bus
//!
//! - [`Registry`] creates singletons from a registration table, fills their
//!   declared fields and rebinds them when dependencies come and go
//! - [`EventBus`] dispatches to listeners of an interface through
//!   [`Channel`]s that tolerate mutation during dispatch
//! - [`Schedule`] runs updatable services once per tick

extern crate self as plinth;

pub mod app;
pub mod config;
pub mod container;
pub mod debug;
pub mod error;
pub mod events;
pub mod key;
pub mod schedule;
pub mod subscription;
pub mod testing;
pub mod value;

pub use app::{Application, Runtime};
pub use config::{Config, Environment, LocatorConfig};
pub use container::global::Locator;
pub use container::host::{AlwaysAlive, AssetLoader, Liveness, NoAssets, NoScene, SceneQuery};
pub use container::inject::{
    Declaration, Declared, FieldBinding, FieldKind, FieldOptions, Inject, InjectFlags, InjectMany,
    Injectable,
};
pub use container::provider::{
    registration_table, ConfigureReport, Registration, RegistrationFlags, RegistrationInfo,
    ServiceEntry,
};
pub use container::{Registry, RegistryBuilder, Service};
pub use debug::{InjectionNode, InjectionObserver, InjectionTree};
pub use error::LocatorError;
pub use events::{Channel, EventBus, Handler, ListenerStatus, Next};
pub use key::TypeKey;
pub use schedule::{Schedule, TaskEntry, Update};
pub use subscription::Subscription;
pub use value::{Observable, ProvidesValue, ValueProvider};

// Re-export for macro-generated registrations
pub use inventory;
pub use plinth_macros::{service, Injectable};
