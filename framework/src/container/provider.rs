//! Registration table for services
//!
//! Every service the registry can create has a [`Registration`]. They are
//! collected at link time through `inventory`, from `#[service(...)]`
//! attributes:
//!
//! ```rust,ignore
//! use plinth::{service, Injectable};
//!
//! #[service(order = 10, dynamic)]
//! #[derive(Default, Injectable)]
//! pub struct AudioMixer {
//!     volume: std::cell::Cell<f32>,
//! }
//! ```
//!
//! or handed to [`Registry::configure`](super::Registry::configure) directly:
//!
//! ```rust
//! use plinth::{Injectable, Registration, Service};
//!
//! #[derive(Default)]
//! pub struct Clock;
//!
//! impl Injectable for Clock {}
//! impl Service for Clock {}
//!
//! let table = vec![Registration::of::<Clock>().order(-10)];
//! assert_eq!(table[0].order_value(), -10);
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use serde::Serialize;

use super::inject::Declared;
use super::{Registry, Service};
use crate::key::TypeKey;

bitflags! {
    /// Creation behavior of one registration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegistrationFlags: u8 {
        /// Skip during the configuration pass; create on first request
        const LAZY = 1 << 0;
        /// Only created when the locator runs in editor mode
        const EDITOR_ONLY = 1 << 1;
        /// The instance may be removed and replaced during the process lifetime
        const DYNAMIC = 1 << 2;
    }
}

/// Type-erased hooks of a constructible service
#[derive(Clone, Copy)]
pub(crate) struct Constructor {
    pub(crate) construct: fn() -> Rc<dyn Any>,
    pub(crate) initialize: fn(&Rc<dyn Any>, &Registry),
    pub(crate) auto_subscribe: fn(&Rc<dyn Any>) -> bool,
}

fn construct<T: Service>() -> Rc<dyn Any> {
    Rc::new(T::default())
}

fn initialize<T: Service>(instance: &Rc<dyn Any>, registry: &Registry) {
    if let Some(service) = instance.downcast_ref::<T>() {
        service.initialize(registry);
    }
}

fn auto_subscribe<T: Service>(instance: &Rc<dyn Any>) -> bool {
    instance
        .downcast_ref::<T>()
        .is_some_and(|service| service.auto_subscribe())
}

/// Where a registration gets its instance from
#[derive(Clone, Copy)]
pub(crate) enum Source {
    /// Default-construct, inject, initialize
    Construct(Constructor),
    /// Fetch the pre-existing instance from the asset loader
    Asset,
}

/// Registration descriptor of one service type
#[derive(Clone)]
pub struct Registration {
    key: TypeKey,
    order: i32,
    flags: RegistrationFlags,
    group: &'static str,
    pub(crate) source: Source,
    pub(crate) declare: fn() -> Declared,
}

impl Registration {
    /// A constructible service
    pub fn of<T: Service>() -> Self {
        let key = TypeKey::of::<T>();
        Self {
            key,
            order: 0,
            flags: RegistrationFlags::empty(),
            group: key.crate_name(),
            source: Source::Construct(Constructor {
                construct: construct::<T>,
                initialize: initialize::<T>,
                auto_subscribe: auto_subscribe::<T>,
            }),
            declare: Declared::of::<T>,
        }
    }

    /// A service fetched from the asset loader instead of constructed
    pub fn asset<T: 'static>() -> Self {
        let key = TypeKey::of::<T>();
        Self {
            key,
            order: 0,
            flags: RegistrationFlags::empty(),
            group: key.crate_name(),
            source: Source::Asset,
            declare: Declared::empty::<T>,
        }
    }

    /// Creation order during the configuration pass; lower runs first
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Mark the type as a dynamic singleton
    pub fn dynamic(mut self) -> Self {
        self.flags |= RegistrationFlags::DYNAMIC;
        self
    }

    /// Skip the type during the configuration pass
    pub fn lazy(mut self) -> Self {
        self.flags |= RegistrationFlags::LAZY;
        self
    }

    /// Only create the type in editor mode
    pub fn editor_only(mut self) -> Self {
        self.flags |= RegistrationFlags::EDITOR_ONLY;
        self
    }

    /// Override the group used by the group allow-list
    pub fn group(mut self, group: &'static str) -> Self {
        self.group = group;
        self
    }

    /// The registered type
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Creation order
    pub fn order_value(&self) -> i32 {
        self.order
    }

    /// Creation flags
    pub fn flags(&self) -> RegistrationFlags {
        self.flags
    }

    /// Group name (the defining crate unless overridden)
    pub fn group_name(&self) -> &'static str {
        self.group
    }

    /// Whether the instance comes from the asset loader
    pub fn is_asset(&self) -> bool {
        matches!(self.source, Source::Asset)
    }

    /// Serializable summary, used by the `services` command
    pub fn info(&self) -> RegistrationInfo {
        RegistrationInfo {
            name: self.key.name(),
            order: self.order,
            group: self.group,
            asset: self.is_asset(),
            lazy: self.flags.contains(RegistrationFlags::LAZY),
            dynamic: self.flags.contains(RegistrationFlags::DYNAMIC),
            editor_only: self.flags.contains(RegistrationFlags::EDITOR_ONLY),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("order", &self.order)
            .field("flags", &self.flags)
            .field("group", &self.group)
            .field("asset", &self.is_asset())
            .finish()
    }
}

/// Flat view of a [`Registration`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationInfo {
    pub name: &'static str,
    pub order: i32,
    pub group: &'static str,
    pub asset: bool,
    pub lazy: bool,
    pub dynamic: bool,
    pub editor_only: bool,
}

/// Entry for inventory-collected service registrations
///
/// Submitted by the `#[service(...)]` attribute.
pub struct ServiceEntry {
    /// Type name for debugging/logging
    pub name: &'static str,
    /// Builds the registration descriptor
    pub registration: fn() -> Registration,
}

inventory::collect!(ServiceEntry);

/// Every registration submitted through `#[service(...)]`, sorted by order
pub fn registration_table() -> Vec<Registration> {
    let mut table: Vec<Registration> = inventory::iter::<ServiceEntry>
        .into_iter()
        .map(|entry| (entry.registration)())
        .collect();
    table.sort_by_key(|registration| registration.order);
    table
}

/// Outcome of one configuration pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigureReport {
    /// Services constructed (or already present)
    pub services: Vec<&'static str>,
    /// Services fetched from the asset loader
    pub assets: Vec<&'static str>,
    /// Registrations recorded but not created (lazy or filtered out)
    pub skipped: Vec<&'static str>,
    /// Registrations whose creation failed
    pub failed: Vec<&'static str>,
}

impl ConfigureReport {
    /// Number of instances available after the pass
    pub fn created(&self) -> usize {
        self.services.len() + self.assets.len()
    }
}
