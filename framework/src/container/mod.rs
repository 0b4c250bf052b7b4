//! Service registry with deferred field injection
//!
//! The [`Registry`] owns one instance per service type, creates services
//! lazily (or eagerly during a configuration pass), fills in their declared
//! dependency fields and keeps those fields up to date when a dependency is
//! registered later, removed, or replaced.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use plinth::{Declaration, Inject, Injectable, Registration, Registry, Service};
//!
//! #[derive(Default)]
//! pub struct Audio;
//!
//! impl Injectable for Audio {}
//! impl Service for Audio {}
//!
//! #[derive(Default)]
//! pub struct Player {
//!     audio: Inject<Audio>,
//! }
//!
//! impl Injectable for Player {
//!     fn declare(decl: &mut Declaration<Self>) {
//!         decl.service("audio", |player| &player.audio);
//!     }
//! }
//!
//! impl Service for Player {}
//!
//! let registry = Registry::new();
//! let report = registry.configure(vec![
//!     Registration::of::<Audio>(),
//!     Registration::of::<Player>().order(1),
//! ]);
//! assert_eq!(report.created(), 2);
//!
//! let player = registry.get::<Player>().expect("created by configure");
//! let audio = registry.get::<Audio>().expect("created by configure");
//! assert!(player.audio.holds(&audio));
//! ```

pub mod global;
pub mod host;
pub mod inject;
pub mod provider;
pub mod testing;
pub(crate) mod waiter;

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, debug_span, error, info, warn};

use crate::config::LocatorConfig;
use crate::debug::InjectionObserver;
use crate::error::LocatorError;
use crate::events::EventBus;
use crate::key::TypeKey;
use crate::schedule::Schedule;
use host::{AlwaysAlive, AssetLoader, Liveness, NoAssets, NoScene, SceneQuery};
use inject::{Declared, FieldBinding, FieldKind, InjectFlags, Injectable};
use provider::{ConfigureReport, Registration, RegistrationFlags, Source};
use waiter::{notify, Waiter, Waiters};

/// A registry-created singleton
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use plinth::{Injectable, Registry, Service};
///
/// #[derive(Default)]
/// pub struct Clock {
///     started: Cell<bool>,
/// }
///
/// impl Injectable for Clock {}
///
/// impl Service for Clock {
///     fn initialize(&self, _registry: &Registry) {
///         self.started.set(true);
///     }
/// }
/// ```
pub trait Service: Injectable + Default {
    /// Called once after the service is registered and injected
    fn initialize(&self, _registry: &Registry) {}

    /// Whether the registry subscribes the new instance to its declared interfaces
    fn auto_subscribe(&self) -> bool {
        true
    }
}

struct Slot {
    key: TypeKey,
    instance: Rc<dyn Any>,
}

/// Type-keyed store of singleton services
pub struct Registry {
    config: LocatorConfig,
    instances: RefCell<HashMap<TypeId, Slot>>,
    registrations: RefCell<HashMap<TypeId, Registration>>,
    dynamic: RefCell<HashSet<TypeId>>,
    declarations: RefCell<HashMap<TypeId, Rc<Declared>>>,
    constructing: RefCell<HashSet<TypeId>>,
    waiters: Waiters,
    bus: Rc<EventBus>,
    schedule: Schedule,
    scene: Rc<dyn SceneQuery>,
    assets: Rc<dyn AssetLoader>,
    liveness: Rc<dyn Liveness>,
    observer: Option<Rc<dyn InjectionObserver>>,
}

/// Builder for a [`Registry`] with host collaborators plugged in
pub struct RegistryBuilder {
    config: Option<LocatorConfig>,
    scene: Rc<dyn SceneQuery>,
    assets: Rc<dyn AssetLoader>,
    liveness: Rc<dyn Liveness>,
    observer: Option<Rc<dyn InjectionObserver>>,
    bus: Option<Rc<EventBus>>,
    registrations: Vec<Registration>,
}

impl RegistryBuilder {
    /// Use `config` instead of the default settings
    pub fn config(mut self, config: LocatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Structural lookups for component fields
    pub fn scene(mut self, scene: Rc<dyn SceneQuery>) -> Self {
        self.scene = scene;
        self
    }

    /// Loader for asset-backed registrations
    pub fn assets(mut self, assets: Rc<dyn AssetLoader>) -> Self {
        self.assets = assets;
        self
    }

    /// Liveness check consulted by waiter replay
    pub fn liveness(mut self, liveness: Rc<dyn Liveness>) -> Self {
        self.liveness = liveness;
        self
    }

    /// Observer called around every injection
    pub fn observer(mut self, observer: Rc<dyn InjectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Share an existing event bus
    pub fn bus(mut self, bus: Rc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Record registration descriptors without creating anything
    pub fn registrations(mut self, registrations: impl IntoIterator<Item = Registration>) -> Self {
        self.registrations.extend(registrations);
        self
    }

    pub fn build(self) -> Registry {
        let registry = Registry {
            config: self.config.unwrap_or_default(),
            instances: RefCell::new(HashMap::new()),
            registrations: RefCell::new(HashMap::new()),
            dynamic: RefCell::new(HashSet::new()),
            declarations: RefCell::new(HashMap::new()),
            constructing: RefCell::new(HashSet::new()),
            waiters: Waiters::new(),
            bus: self.bus.unwrap_or_default(),
            schedule: Schedule::new(),
            scene: self.scene,
            assets: self.assets,
            liveness: self.liveness,
            observer: self.observer,
        };
        for registration in self.registrations {
            registry.record(registration);
        }
        registry
    }
}

impl Registry {
    /// A registry with default settings and no host collaborators
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            config: None,
            scene: Rc::new(NoScene),
            assets: Rc::new(NoAssets),
            liveness: Rc::new(AlwaysAlive),
            observer: None,
            bus: None,
            registrations: Vec::new(),
        }
    }

    // ----- registration table -----

    /// Record a descriptor; returns `false` if the config filters it out
    ///
    /// The dynamic marker is applied either way.
    pub fn record(&self, registration: Registration) -> bool {
        let key = registration.key();
        if registration.flags().contains(RegistrationFlags::DYNAMIC) {
            self.dynamic.borrow_mut().insert(key.id());
        }
        if !self.config.admits(&registration) {
            debug!(service = key.name(), "registration filtered out by config");
            return false;
        }
        self.registrations.borrow_mut().insert(key.id(), registration);
        true
    }

    /// The recorded descriptor of `key`
    pub fn registration(&self, key: TypeKey) -> Option<Registration> {
        self.registrations.borrow().get(&key.id()).cloned()
    }

    /// Every recorded descriptor, sorted by order then name
    pub fn registrations(&self) -> Vec<Registration> {
        let mut all: Vec<_> = self.registrations.borrow().values().cloned().collect();
        all.sort_by(|a, b| {
            a.order_value()
                .cmp(&b.order_value())
                .then_with(|| a.key().name().cmp(b.key().name()))
        });
        all
    }

    /// Mark `T` as a dynamic singleton
    pub fn mark_dynamic<T: 'static>(&self) {
        self.dynamic.borrow_mut().insert(TypeId::of::<T>());
    }

    /// Whether `key` is a dynamic singleton
    pub fn is_dynamic(&self, key: TypeKey) -> bool {
        self.dynamic.borrow().contains(&key.id())
    }

    /// Record every descriptor of `table`, then eagerly create the admitted,
    /// non-lazy ones in ascending order
    ///
    /// Existing instances are kept. Entries with equal order are created in
    /// table order.
    pub fn configure(&self, table: impl IntoIterator<Item = Registration>) -> ConfigureReport {
        let mut report = ConfigureReport::default();
        let mut admitted = Vec::new();
        for registration in table {
            if self.record(registration.clone()) {
                admitted.push(registration);
            } else {
                report.skipped.push(registration.key().name());
            }
        }
        admitted.sort_by_key(|registration| registration.order_value());

        for registration in admitted {
            let key = registration.key();
            if registration.flags().contains(RegistrationFlags::LAZY) {
                report.skipped.push(key.name());
                continue;
            }
            let asset = registration.is_asset();
            match self.create_and_register_erased(key, Some(registration)) {
                Some(_) if asset => report.assets.push(key.name()),
                Some(_) => report.services.push(key.name()),
                None => report.failed.push(key.name()),
            }
        }

        info!(
            services = report.services.len(),
            assets = report.assets.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "configuration pass finished"
        );
        report
    }

    // ----- instances -----

    /// Store `instance` as the singleton of `T`
    ///
    /// Returns `false` (and changes nothing) if `T` already has an instance.
    /// On success every waiter on `T` receives the instance.
    pub fn register_instance<T: 'static>(&self, instance: Rc<T>) -> bool {
        self.register_erased(TypeKey::of::<T>(), instance)
    }

    /// Erased form of [`register_instance`](Registry::register_instance)
    pub fn register_erased(&self, key: TypeKey, instance: Rc<dyn Any>) -> bool {
        if (*instance).type_id() != key.id() {
            let err = LocatorError::TypeMismatch {
                type_name: key.name(),
            };
            warn!(service = key.name(), error = %err, "refusing to register instance");
            return false;
        }
        {
            let mut instances = self.instances.borrow_mut();
            if instances.contains_key(&key.id()) {
                return false;
            }
            instances.insert(
                key.id(),
                Slot {
                    key,
                    instance: instance.clone(),
                },
            );
        }
        debug!(service = key.name(), "registered instance");

        let dynamic = self.is_dynamic(key);
        self.waiters
            .replay(key, Some(instance), dynamic, &*self.liveness);
        true
    }

    /// Drop the singleton of `T`
    ///
    /// Waiters receive an absent value. Waiters on a non-dynamic type are
    /// discarded afterwards; waiters on a dynamic type stay for the next
    /// registration. The instance also leaves the event bus and the schedule.
    pub fn remove_instance<T: 'static>(&self) -> bool {
        self.remove_erased(TypeKey::of::<T>())
    }

    /// Erased form of [`remove_instance`](Registry::remove_instance)
    pub fn remove_erased(&self, key: TypeKey) -> bool {
        let Some(slot) = self.instances.borrow_mut().remove(&key.id()) else {
            return false;
        };
        debug!(service = key.name(), "removed instance");

        if let Some(declared) = self.cached_declaration(key) {
            self.bus.unsubscribe_declared(&declared, &slot.instance);
        }
        self.schedule
            .remove_address(Rc::as_ptr(&slot.instance) as *const ());

        let dynamic = self.is_dynamic(key);
        self.waiters.replay(key, None, dynamic, &*self.liveness);
        if !dynamic {
            self.waiters.discard(key);
        }
        true
    }

    /// The current instance of `T`; never creates
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        self.get_erased(TypeKey::of::<T>())?.downcast::<T>().ok()
    }

    /// Erased form of [`get`](Registry::get)
    pub fn get_erased(&self, key: TypeKey) -> Option<Rc<dyn Any>> {
        self.instances
            .borrow()
            .get(&key.id())
            .map(|slot| slot.instance.clone())
    }

    /// The current instance of `T`, created from its descriptor if absent
    pub fn try_get<T: 'static>(&self) -> Option<Rc<T>> {
        self.try_get_erased(TypeKey::of::<T>())?
            .downcast::<T>()
            .ok()
    }

    /// Erased form of [`try_get`](Registry::try_get)
    pub fn try_get_erased(&self, key: TypeKey) -> Option<Rc<dyn Any>> {
        self.get_erased(key)
            .or_else(|| self.create_and_register_erased(key, None))
    }

    /// Like [`try_get`](Registry::try_get), with the failure as an error
    pub fn resolve<T: 'static>(&self) -> Result<Rc<T>, LocatorError> {
        let key = TypeKey::of::<T>();
        if let Some(instance) = self.try_get::<T>() {
            return Ok(instance);
        }
        Err(match self.registration(key) {
            _ if self.constructing.borrow().contains(&key.id()) => LocatorError::circular::<T>(),
            Some(registration) if registration.is_asset() => LocatorError::asset_missing::<T>(),
            Some(_) => LocatorError::TypeMismatch {
                type_name: key.name(),
            },
            None => LocatorError::not_registered::<T>(),
        })
    }

    /// Create, register, inject and initialize `T`
    ///
    /// Uses `registration` when given, otherwise the recorded descriptor.
    /// Returns the existing instance if `T` is already registered.
    pub fn create_and_register<T: 'static>(&self, registration: Option<Registration>) -> Option<Rc<T>> {
        self.create_and_register_erased(TypeKey::of::<T>(), registration)?
            .downcast::<T>()
            .ok()
    }

    /// Erased form of [`create_and_register`](Registry::create_and_register)
    pub fn create_and_register_erased(
        &self,
        key: TypeKey,
        registration: Option<Registration>,
    ) -> Option<Rc<dyn Any>> {
        if let Some(existing) = self.get_erased(key) {
            return Some(existing);
        }
        let Some(registration) = registration.or_else(|| self.registration(key)) else {
            let err = LocatorError::NotRegistered {
                type_name: key.name(),
            };
            warn!(service = key.name(), error = %err, "cannot create service");
            return None;
        };
        if registration.flags().contains(RegistrationFlags::DYNAMIC) {
            self.dynamic.borrow_mut().insert(key.id());
        }
        if self.constructing.borrow().contains(&key.id()) {
            let err = LocatorError::CircularDependency {
                type_name: key.name(),
            };
            error!(service = key.name(), error = %err, "service requested while it is being constructed");
            return None;
        }

        match registration.source {
            Source::Asset => {
                let Some(instance) = self.assets.load(key) else {
                    let err = LocatorError::AssetMissing {
                        type_name: key.name(),
                    };
                    error!(service = key.name(), error = %err, "asset-backed service unavailable");
                    return None;
                };
                self.register_erased(key, instance.clone())
                    .then_some(instance)
            }
            Source::Construct(constructor) => {
                self.constructing.borrow_mut().insert(key.id());
                let instance = (constructor.construct)();
                self.constructing.borrow_mut().remove(&key.id());

                // register before injecting so dependents can see a cycle's head
                if !self.register_erased(key, instance.clone()) {
                    return self.get_erased(key);
                }
                debug!(service = key.name(), order = registration.order_value(), "created service");

                let declared = self.declaration(key, registration.declare);
                self.run_injection(&declared, &instance, true, false);
                (constructor.initialize)(&instance, self);
                if (constructor.auto_subscribe)(&instance) {
                    self.bus.subscribe_declared(&declared, &instance);
                }
                if let Some(update) = declared.update.and_then(|cast| cast(instance.clone())) {
                    self.schedule.add(key.name(), update);
                }
                Some(instance)
            }
        }
    }

    /// Whether `T` currently has an instance
    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_key(TypeKey::of::<T>())
    }

    /// Whether `key` currently has an instance
    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.instances.borrow().contains_key(&key.id())
    }

    /// Registered types, sorted by name
    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<_> = self.instances.borrow().values().map(|slot| slot.key).collect();
        keys.sort_by_key(|key| key.name());
        keys
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.instances.borrow().len()
    }

    /// Whether no instance is registered
    pub fn is_empty(&self) -> bool {
        self.instances.borrow().is_empty()
    }

    // ----- injection -----

    /// Fill in the declared fields of `instance`
    ///
    /// `force_create` asks for missing services to be reported as errors
    /// and `component_scoped` resolves structural and channel fields through
    /// the scene rather than the registry. Repeated calls are harmless.
    pub fn inject<T: Injectable>(&self, instance: &Rc<T>, force_create: bool, component_scoped: bool) {
        let declared = self.declaration_of::<T>();
        let erased: Rc<dyn Any> = instance.clone();
        self.run_injection(&declared, &erased, force_create, component_scoped);
    }

    /// Erased form of [`inject`](Registry::inject)
    ///
    /// Needs the type's declaration to be known already, either through a
    /// recorded descriptor or an earlier typed call.
    pub fn inject_erased(
        &self,
        key: TypeKey,
        instance: &Rc<dyn Any>,
        force_create: bool,
        component_scoped: bool,
    ) -> bool {
        let declared = match self.cached_declaration(key) {
            Some(declared) => declared,
            None => match self.registration(key) {
                Some(registration) => self.declaration(key, registration.declare),
                None => {
                    warn!(owner = key.name(), "no declaration known for erased injection");
                    return false;
                }
            },
        };
        self.run_injection(&declared, instance, force_create, component_scoped);
        true
    }

    /// Subscribe `instance` to every interface `T` declares
    pub fn subscribe<T: Injectable>(&self, instance: &Rc<T>) -> usize {
        let erased: Rc<dyn Any> = instance.clone();
        self.bus
            .subscribe_declared(&self.declaration_of::<T>(), &erased)
    }

    /// Remove `instance` from every interface `T` declares
    pub fn unsubscribe<T: Injectable>(&self, instance: &Rc<T>) -> usize {
        let erased: Rc<dyn Any> = instance.clone();
        self.bus
            .unsubscribe_declared(&self.declaration_of::<T>(), &erased)
    }

    fn run_injection(
        &self,
        declared: &Declared,
        instance: &Rc<dyn Any>,
        force_create: bool,
        component_scoped: bool,
    ) {
        let owner = declared.key();
        if let Some(observer) = &self.observer {
            observer.start_injection(owner);
        }
        let span = self
            .config
            .trace_injection
            .then(|| debug_span!("inject", owner = owner.name(), force_create, component_scoped));
        let _entered = span.as_ref().map(|span| span.enter());

        for field in declared.fields() {
            let global = !component_scoped || field.flags().contains(InjectFlags::USE_GLOBAL);
            match field.kind() {
                FieldKind::Service => self.resolve_service(instance, field, force_create),
                FieldKind::Component if global => self.resolve_service(instance, field, force_create),
                FieldKind::Component | FieldKind::Components => {
                    self.resolve_structural(instance, field, global)
                }
                FieldKind::Channel => self.resolve_channel(instance, field, global),
            }
        }

        if let Some(observer) = &self.observer {
            observer.end_injection(owner);
        }
    }

    fn resolve_service(&self, owner: &Rc<dyn Any>, field: &Rc<dyn FieldBinding>, force_create: bool) {
        let target = field.target();
        let dynamic = self.is_dynamic(target);

        let value = match self.get_erased(target) {
            Some(instance) => Some(instance),
            None if dynamic => None,
            None if self.registration(target).is_some() => {
                self.create_and_register_erased(target, None)
            }
            None => {
                if force_create || field.flags().contains(InjectFlags::USE_GLOBAL) {
                    let err = LocatorError::NotRegistered {
                        type_name: target.name(),
                    };
                    warn!(
                        owner = field.owner().name(),
                        field = field.name(),
                        error = %err,
                        "dependency unavailable, waiting for registration"
                    );
                }
                None
            }
        };

        if value.is_none() || dynamic {
            self.waiters.add(target, Waiter::new(owner, field.clone()));
        }
        if let Some(value) = value {
            if field.assign(&**owner, Some(value)) {
                notify(&**field, &**owner);
            }
        }
    }

    fn resolve_structural(&self, owner: &Rc<dyn Any>, field: &Rc<dyn FieldBinding>, global: bool) {
        let target = field.target();
        let found = if global {
            self.try_get_erased(target).into_iter().collect()
        } else if field.kind() == FieldKind::Components {
            self.scene.find_all(&**owner, target, field.flags())
        } else {
            self.scene
                .find(&**owner, target, field.flags())
                .into_iter()
                .collect::<Vec<_>>()
        };

        if found.is_empty() {
            let err = LocatorError::ComponentNotFound {
                type_name: target.name(),
                owner: field.owner().name(),
            };
            warn!(owner = field.owner().name(), field = field.name(), error = %err, "structural lookup failed");
            return;
        }
        if field.assign_many(&**owner, found) {
            notify(&**field, &**owner);
        }
    }

    fn resolve_channel(&self, owner: &Rc<dyn Any>, field: &Rc<dyn FieldBinding>, global: bool) {
        let bus = if global {
            Some(self.bus.clone())
        } else {
            self.scene.local_bus(&**owner)
        };
        let Some(channel) = bus.and_then(|bus| field.channel_in(&bus)) else {
            let err = LocatorError::NoLocalBus {
                interface: field.target().name(),
                owner: field.owner().name(),
            };
            warn!(owner = field.owner().name(), field = field.name(), error = %err, "channel unavailable");
            return;
        };
        if field.assign(&**owner, Some(channel)) {
            notify(&**field, &**owner);
        }
    }

    fn cached_declaration(&self, key: TypeKey) -> Option<Rc<Declared>> {
        self.declarations.borrow().get(&key.id()).cloned()
    }

    fn declaration(&self, key: TypeKey, declare: fn() -> Declared) -> Rc<Declared> {
        if let Some(declared) = self.cached_declaration(key) {
            return declared;
        }
        let declared = Rc::new(declare());
        self.declarations
            .borrow_mut()
            .insert(key.id(), declared.clone());
        declared
    }

    fn declaration_of<T: Injectable>(&self) -> Rc<Declared> {
        self.declaration(TypeKey::of::<T>(), Declared::of::<T>)
    }

    // ----- collaborators -----

    /// The registry's global event bus
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// The update schedule fed by registry-created services
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run one update tick
    pub fn tick(&self) -> usize {
        self.schedule.tick()
    }

    /// Settings this registry was built with
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Number of live waiters bound to `key`
    pub fn waiter_count(&self, key: TypeKey) -> usize {
        self.waiters.count(key)
    }

    /// Number of waiters across all dependency types
    pub fn total_waiters(&self) -> usize {
        self.waiters.total()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("instances", &self.keys())
            .field("registrations", &self.registrations.borrow().len())
            .field("waiters", &self.waiters.total())
            .field("bus", &self.bus)
            .field("schedule", &self.schedule)
            .finish()
    }
}
