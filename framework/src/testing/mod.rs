//! Testing utilities for plinth
//!
//! - [`CallLog`] to record the order in which callbacks and listeners ran
//! - [`FakeScene`] and [`FakeAssets`] as in-memory host collaborators
//! - [`TestLocator`] to swap the installed registry for the duration of a test
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use plinth::testing::{CallLog, FakeAssets};
//! use plinth::{Registration, Registry};
//!
//! struct Settings {
//!     volume: u8,
//! }
//!
//! let assets = FakeAssets::new();
//! assets.insert(Settings { volume: 3 });
//! let registry = Registry::builder().assets(Rc::new(assets)).build();
//! registry.configure([Registration::asset::<Settings>()]);
//!
//! let log = CallLog::new();
//! log.push(format!("volume {}", registry.get::<Settings>().map_or(0, |s| s.volume)));
//! assert_eq!(log.entries(), vec!["volume 3"]);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::container::host::{AssetLoader, SceneQuery};
use crate::container::inject::InjectFlags;
use crate::events::EventBus;
use crate::key::TypeKey;

pub use crate::container::testing::{TestLocator, TestLocatorGuard};

/// Shared, ordered record of calls
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// A copy of everything recorded so far
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Everything recorded so far, clearing the log
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for CallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

fn address(owner: &dyn Any) -> *const () {
    owner as *const dyn Any as *const ()
}

struct Attached {
    key: TypeKey,
    value: Rc<dyn Any>,
    active: bool,
}

/// In-memory object hierarchy
///
/// Components are attached to owners by address; an owner may have a
/// parent whose components are searched when a field asks for
/// [`InjectFlags::SEARCH_PARENTS`].
#[derive(Default)]
pub struct FakeScene {
    components: RefCell<HashMap<*const (), Vec<Attached>>>,
    parents: RefCell<HashMap<*const (), *const ()>>,
    buses: RefCell<HashMap<*const (), Rc<EventBus>>>,
}

impl FakeScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an active component to `owner`
    pub fn attach<C: 'static>(&self, owner: &Rc<dyn Any>, component: C) -> Rc<C> {
        self.attach_with(owner, component, true)
    }

    /// Attach a component that is only found with [`InjectFlags::INCLUDE_INACTIVE`]
    pub fn attach_inactive<C: 'static>(&self, owner: &Rc<dyn Any>, component: C) -> Rc<C> {
        self.attach_with(owner, component, false)
    }

    fn attach_with<C: 'static>(&self, owner: &Rc<dyn Any>, component: C, active: bool) -> Rc<C> {
        let component = Rc::new(component);
        self.components
            .borrow_mut()
            .entry(address(&**owner))
            .or_default()
            .push(Attached {
                key: TypeKey::of::<C>(),
                value: component.clone(),
                active,
            });
        component
    }

    /// Make `parent` the parent of `child`
    pub fn set_parent(&self, child: &Rc<dyn Any>, parent: &Rc<dyn Any>) {
        self.parents
            .borrow_mut()
            .insert(address(&**child), address(&**parent));
    }

    /// Give `owner` its own event bus
    pub fn give_bus(&self, owner: &Rc<dyn Any>) -> Rc<EventBus> {
        self.buses
            .borrow_mut()
            .entry(address(&**owner))
            .or_default()
            .clone()
    }

    fn collect(&self, owner: &dyn Any, target: TypeKey, flags: InjectFlags, first_only: bool) -> Vec<Rc<dyn Any>> {
        let components = self.components.borrow();
        let parents = self.parents.borrow();
        let include_inactive = flags.contains(InjectFlags::INCLUDE_INACTIVE);

        let mut found = Vec::new();
        let mut current = Some(address(owner));
        while let Some(addr) = current {
            let matches = components
                .get(&addr)
                .into_iter()
                .flatten()
                .filter(|c| c.key == target && (c.active || include_inactive))
                .map(|c| c.value.clone());
            found.extend(matches);
            if first_only && !found.is_empty() {
                found.truncate(1);
                break;
            }
            if !flags.contains(InjectFlags::SEARCH_PARENTS) {
                break;
            }
            current = parents.get(&addr).copied();
        }
        found
    }
}

impl SceneQuery for FakeScene {
    fn find(&self, owner: &dyn Any, target: TypeKey, flags: InjectFlags) -> Option<Rc<dyn Any>> {
        self.collect(owner, target, flags, true).into_iter().next()
    }

    fn find_all(&self, owner: &dyn Any, target: TypeKey, flags: InjectFlags) -> Vec<Rc<dyn Any>> {
        self.collect(owner, target, flags, false)
    }

    fn local_bus(&self, owner: &dyn Any) -> Option<Rc<EventBus>> {
        self.buses.borrow().get(&address(owner)).cloned()
    }
}

/// In-memory asset store
#[derive(Default)]
pub struct FakeAssets {
    assets: RefCell<HashMap<TypeKey, Rc<dyn Any>>>,
}

impl FakeAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the shared instance of `T`
    pub fn insert<T: 'static>(&self, asset: T) -> Rc<T> {
        let asset = Rc::new(asset);
        self.assets
            .borrow_mut()
            .insert(TypeKey::of::<T>(), asset.clone());
        asset
    }
}

impl AssetLoader for FakeAssets {
    fn load(&self, key: TypeKey) -> Option<Rc<dyn Any>> {
        self.assets.borrow().get(&key).cloned()
    }
}
