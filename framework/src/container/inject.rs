//! Injectable fields and per-type declarations
//!
//! A type opts into injection by implementing [`Injectable`] and listing its
//! dependency fields in [`Injectable::declare`]. The registry builds the
//! declaration once per type and keeps the erased result ([`Declared`]) for
//! every later injection, waiter replay and event-bus subscription.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use plinth::{Declaration, Inject, InjectFlags, Injectable};
//!
//! #[derive(Default)]
//! pub struct Audio;
//!
//! #[derive(Default)]
//! pub struct Jukebox {
//!     audio: Inject<Audio>,
//! }
//!
//! impl Injectable for Jukebox {
//!     fn declare(decl: &mut Declaration<Self>) {
//!         decl.service("audio", |jukebox| &jukebox.audio)
//!             .flags(InjectFlags::USE_GLOBAL)
//!             .on_injected(|jukebox| {
//!                 let _ready = jukebox.audio.is_set();
//!             });
//!     }
//! }
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use bitflags::bitflags;

use crate::events::{Channel, EventBus, ListenerStatus};
use crate::key::TypeKey;
use crate::schedule::Update;

bitflags! {
    /// Behavior flags of one dependency field
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InjectFlags: u8 {
        /// Structural lookups also consider inactive objects
        const INCLUDE_INACTIVE = 1 << 0;
        /// Structural lookups search up the hierarchy instead of down
        const SEARCH_PARENTS = 1 << 1;
        /// Resolve through the registry even when injecting a scene object
        const USE_GLOBAL = 1 << 2;
    }
}

/// A deferred single-value dependency slot
///
/// Filled in by the registry, possibly later than construction, and possibly
/// cleared and refilled when the dependency is a dynamic singleton.
pub struct Inject<D: 'static> {
    slot: RefCell<Option<Rc<D>>>,
}

impl<D: 'static> Inject<D> {
    /// An empty slot
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    /// The current value, if bound
    pub fn get(&self) -> Option<Rc<D>> {
        self.slot.borrow().clone()
    }

    /// Whether the slot currently holds a value
    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Run `f` against the bound value
    pub fn with<R>(&self, f: impl FnOnce(&D) -> R) -> Option<R> {
        let value = self.get()?;
        Some(f(&value))
    }

    /// Whether the slot holds exactly `value`
    pub fn holds(&self, value: &Rc<D>) -> bool {
        self.slot
            .borrow()
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, value))
    }

    /// Store `value`; returns `false` when nothing changed
    pub(crate) fn replace(&self, value: Option<Rc<D>>) -> bool {
        let mut slot = self.slot.borrow_mut();
        let unchanged = match (slot.as_ref(), value.as_ref()) {
            (Some(current), Some(next)) => Rc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            *slot = value;
        }
        !unchanged
    }
}

impl<D: 'static> Default for Inject<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: 'static> fmt::Debug for Inject<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("target", &std::any::type_name::<D>())
            .field("set", &self.is_set())
            .finish()
    }
}

/// A structural slot that receives every matching object
pub struct InjectMany<C: 'static> {
    slot: RefCell<Vec<Rc<C>>>,
}

impl<C: 'static> InjectMany<C> {
    /// An empty slot
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the bound values
    pub fn get(&self) -> Vec<Rc<C>> {
        self.slot.borrow().clone()
    }

    /// Number of bound values
    pub fn len(&self) -> usize {
        self.slot.borrow().len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_empty()
    }

    pub(crate) fn replace(&self, values: Vec<Rc<C>>) -> bool {
        let mut slot = self.slot.borrow_mut();
        let unchanged = slot.len() == values.len()
            && slot.iter().zip(&values).all(|(a, b)| Rc::ptr_eq(a, b));
        if !unchanged {
            *slot = values;
        }
        !unchanged
    }
}

impl<C: 'static> Default for InjectMany<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> fmt::Debug for InjectMany<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectMany")
            .field("target", &std::any::type_name::<C>())
            .field("len", &self.len())
            .finish()
    }
}

/// How a field is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A singleton from the registry
    Service,
    /// The event-bus channel of a listener interface
    Channel,
    /// One structural reference found through the scene query
    Component,
    /// Every structural reference found through the scene query
    Components,
}

/// A declared dependency field with its owner type erased
pub trait FieldBinding {
    /// Field name, for diagnostics
    fn name(&self) -> &'static str;

    /// The owner type the field belongs to
    fn owner(&self) -> TypeKey;

    /// How the field is resolved
    fn kind(&self) -> FieldKind;

    /// The dependency type (the interface, for channel fields)
    fn target(&self) -> TypeKey;

    /// Behavior flags
    fn flags(&self) -> InjectFlags;

    /// Store a single value (or clear the slot); returns `true` if it changed
    fn assign(&self, owner: &dyn Any, value: Option<Rc<dyn Any>>) -> bool;

    /// Store a list of structural values; returns `true` if it changed
    fn assign_many(&self, owner: &dyn Any, values: Vec<Rc<dyn Any>>) -> bool {
        self.assign(owner, values.into_iter().next())
    }

    /// Whether the slot currently holds a value
    fn is_bound(&self, owner: &dyn Any) -> bool;

    /// Run the post-injection callback, if one was declared
    fn notify(&self, owner: &dyn Any);

    /// For channel fields, the erased `Channel<I>` of `bus`
    fn channel_in(&self, _bus: &EventBus) -> Option<Rc<dyn Any>> {
        None
    }
}

struct Options<T> {
    flags: Cell<InjectFlags>,
    callback: RefCell<Option<Rc<dyn Fn(&T)>>>,
}

impl<T> Options<T> {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            flags: Cell::new(InjectFlags::empty()),
            callback: RefCell::new(None),
        })
    }

    fn notify(&self, owner: &T) {
        let callback = self.callback.borrow().clone();
        if let Some(callback) = callback {
            callback(owner);
        }
    }
}

struct Field<T: 'static, D: 'static> {
    name: &'static str,
    kind: FieldKind,
    target: TypeKey,
    access: fn(&T) -> &Inject<D>,
    channel: Option<fn(&EventBus) -> Rc<dyn Any>>,
    options: Rc<Options<T>>,
}

impl<T: 'static, D: 'static> FieldBinding for Field<T, D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn owner(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn kind(&self) -> FieldKind {
        self.kind
    }

    fn target(&self) -> TypeKey {
        self.target
    }

    fn flags(&self) -> InjectFlags {
        self.options.flags.get()
    }

    fn assign(&self, owner: &dyn Any, value: Option<Rc<dyn Any>>) -> bool {
        let Some(owner) = owner.downcast_ref::<T>() else {
            return false;
        };
        let value = match value {
            Some(value) => match value.downcast::<D>() {
                Ok(value) => Some(value),
                Err(_) => return false,
            },
            None => None,
        };
        (self.access)(owner).replace(value)
    }

    fn is_bound(&self, owner: &dyn Any) -> bool {
        owner
            .downcast_ref::<T>()
            .is_some_and(|owner| (self.access)(owner).is_set())
    }

    fn notify(&self, owner: &dyn Any) {
        if let Some(owner) = owner.downcast_ref::<T>() {
            self.options.notify(owner);
        }
    }

    fn channel_in(&self, bus: &EventBus) -> Option<Rc<dyn Any>> {
        self.channel.map(|channel| channel(bus))
    }
}

struct ManyField<T: 'static, C: 'static> {
    name: &'static str,
    access: fn(&T) -> &InjectMany<C>,
    options: Rc<Options<T>>,
}

impl<T: 'static, C: 'static> FieldBinding for ManyField<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn owner(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn kind(&self) -> FieldKind {
        FieldKind::Components
    }

    fn target(&self) -> TypeKey {
        TypeKey::of::<C>()
    }

    fn flags(&self) -> InjectFlags {
        self.options.flags.get()
    }

    fn assign(&self, owner: &dyn Any, value: Option<Rc<dyn Any>>) -> bool {
        self.assign_many(owner, value.into_iter().collect())
    }

    fn assign_many(&self, owner: &dyn Any, values: Vec<Rc<dyn Any>>) -> bool {
        let Some(owner) = owner.downcast_ref::<T>() else {
            return false;
        };
        let values = values
            .into_iter()
            .filter_map(|value| value.downcast::<C>().ok())
            .collect();
        (self.access)(owner).replace(values)
    }

    fn is_bound(&self, owner: &dyn Any) -> bool {
        owner
            .downcast_ref::<T>()
            .is_some_and(|owner| !(self.access)(owner).is_empty())
    }

    fn notify(&self, owner: &dyn Any) {
        if let Some(owner) = owner.downcast_ref::<T>() {
            self.options.notify(owner);
        }
    }
}

/// A base type's field seen through the derived type that embeds it
struct Projected<T: 'static, B: 'static> {
    inner: Rc<dyn FieldBinding>,
    project: fn(&T) -> &B,
}

impl<T: 'static, B: 'static> Projected<T, B> {
    fn base<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let owner = owner.downcast_ref::<T>()?;
        Some((self.project)(owner) as &dyn Any)
    }
}

impl<T: 'static, B: 'static> FieldBinding for Projected<T, B> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn owner(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn kind(&self) -> FieldKind {
        self.inner.kind()
    }

    fn target(&self) -> TypeKey {
        self.inner.target()
    }

    fn flags(&self) -> InjectFlags {
        self.inner.flags()
    }

    fn assign(&self, owner: &dyn Any, value: Option<Rc<dyn Any>>) -> bool {
        self.base(owner)
            .is_some_and(|base| self.inner.assign(base, value))
    }

    fn assign_many(&self, owner: &dyn Any, values: Vec<Rc<dyn Any>>) -> bool {
        self.base(owner)
            .is_some_and(|base| self.inner.assign_many(base, values))
    }

    fn is_bound(&self, owner: &dyn Any) -> bool {
        self.base(owner).is_some_and(|base| self.inner.is_bound(base))
    }

    fn notify(&self, owner: &dyn Any) {
        if let Some(base) = self.base(owner) {
            self.inner.notify(base);
        }
    }

    fn channel_in(&self, bus: &EventBus) -> Option<Rc<dyn Any>> {
        self.inner.channel_in(bus)
    }
}

/// An interface that instances of a type listen to
pub(crate) trait ListenerBinding {
    fn interface(&self) -> TypeKey;
    fn subscribe(&self, bus: &EventBus, instance: &Rc<dyn Any>) -> bool;
    fn unsubscribe(&self, bus: &EventBus, instance: &Rc<dyn Any>) -> bool;
}

struct Listens<T: 'static, I: ?Sized + 'static> {
    cast: fn(Rc<T>) -> Rc<I>,
}

impl<T: 'static, I: ?Sized + 'static> Listens<T, I> {
    fn listener(&self, instance: &Rc<dyn Any>) -> Option<Rc<I>> {
        let instance = instance.clone().downcast::<T>().ok()?;
        Some((self.cast)(instance))
    }
}

impl<T: 'static, I: ?Sized + 'static> ListenerBinding for Listens<T, I> {
    fn interface(&self) -> TypeKey {
        TypeKey::of::<I>()
    }

    fn subscribe(&self, bus: &EventBus, instance: &Rc<dyn Any>) -> bool {
        let Some(listener) = self.listener(instance) else {
            return false;
        };
        matches!(
            bus.channel::<I>().register_listener(listener),
            ListenerStatus::Added | ListenerStatus::QueuedForAdd
        )
    }

    fn unsubscribe(&self, bus: &EventBus, instance: &Rc<dyn Any>) -> bool {
        let (Some(listener), Some(channel)) = (self.listener(instance), bus.get::<I>()) else {
            return false;
        };
        channel.remove_listener(&listener)
    }
}

pub(crate) type UpdateCast = fn(Rc<dyn Any>) -> Option<Rc<dyn Update>>;

fn update_of<T: Update + 'static>(instance: Rc<dyn Any>) -> Option<Rc<dyn Update>> {
    let instance = instance.downcast::<T>().ok()?;
    Some(instance as Rc<dyn Update>)
}

fn channel_of<I: ?Sized + 'static>(bus: &EventBus) -> Rc<dyn Any> {
    bus.channel::<I>()
}

/// Builder handed to [`Injectable::declare`]
pub struct Declaration<T: 'static> {
    fields: Vec<Rc<dyn FieldBinding>>,
    /// Leading entries of `fields` that came from `extend`
    inherited: usize,
    listens: Vec<Rc<dyn ListenerBinding>>,
    update: Option<UpdateCast>,
    _owner: PhantomData<fn(&T)>,
}

/// Per-field options returned by the [`Declaration`] field methods
pub struct FieldOptions<T: 'static> {
    options: Rc<Options<T>>,
}

impl<T: 'static> FieldOptions<T> {
    /// Replace the behavior flags
    pub fn flags(self, flags: InjectFlags) -> Self {
        self.options.flags.set(flags);
        self
    }

    /// Shorthand for adding [`InjectFlags::USE_GLOBAL`]
    pub fn global(self) -> Self {
        let flags = self.options.flags.get() | InjectFlags::USE_GLOBAL;
        self.flags(flags)
    }

    /// Run `callback` on the owner after every change to this field
    pub fn on_injected(self, callback: impl Fn(&T) + 'static) -> Self {
        *self.options.callback.borrow_mut() = Some(Rc::new(callback));
        self
    }
}

impl<T: 'static> Declaration<T> {
    pub(crate) fn new() -> Self {
        Self {
            fields: Vec::new(),
            inherited: 0,
            listens: Vec::new(),
            update: None,
            _owner: PhantomData,
        }
    }

    fn push_field<D: 'static>(
        &mut self,
        name: &'static str,
        kind: FieldKind,
        target: TypeKey,
        access: fn(&T) -> &Inject<D>,
        channel: Option<fn(&EventBus) -> Rc<dyn Any>>,
    ) -> FieldOptions<T> {
        let options = Options::new();
        self.fields.push(Rc::new(Field {
            name,
            kind,
            target,
            access,
            channel,
            options: options.clone(),
        }));
        FieldOptions { options }
    }

    /// A plain-service dependency resolved through the registry
    pub fn service<D: 'static>(
        &mut self,
        name: &'static str,
        access: fn(&T) -> &Inject<D>,
    ) -> FieldOptions<T> {
        self.push_field(name, FieldKind::Service, TypeKey::of::<D>(), access, None)
    }

    /// The event-bus channel of interface `I`
    pub fn channel<I: ?Sized + 'static>(
        &mut self,
        name: &'static str,
        access: fn(&T) -> &Inject<Channel<I>>,
    ) -> FieldOptions<T> {
        self.push_field(
            name,
            FieldKind::Channel,
            TypeKey::of::<I>(),
            access,
            Some(channel_of::<I>),
        )
    }

    /// One structural reference, found by the scene query
    pub fn component<C: 'static>(
        &mut self,
        name: &'static str,
        access: fn(&T) -> &Inject<C>,
    ) -> FieldOptions<T> {
        self.push_field(name, FieldKind::Component, TypeKey::of::<C>(), access, None)
    }

    /// Every matching structural reference, found by the scene query
    pub fn components<C: 'static>(
        &mut self,
        name: &'static str,
        access: fn(&T) -> &InjectMany<C>,
    ) -> FieldOptions<T> {
        let options = Options::new();
        self.fields.push(Rc::new(ManyField {
            name,
            access,
            options: options.clone(),
        }));
        FieldOptions { options }
    }

    /// Include the fields of an embedded base type, ahead of this type's own
    ///
    /// Bases keep the order they were extended in. Only fields are
    /// inherited; listener interfaces and the update hook belong to the
    /// outer type.
    pub fn extend<B: Injectable>(&mut self, project: fn(&T) -> &B) {
        let mut base = Declaration::<B>::new();
        B::declare(&mut base);
        let fields: Vec<Rc<dyn FieldBinding>> = base
            .fields
            .into_iter()
            .map(|inner| Rc::new(Projected { inner, project }) as Rc<dyn FieldBinding>)
            .collect();
        let own = self.fields.split_off(self.inherited);
        self.inherited += fields.len();
        self.fields.extend(fields);
        self.fields.extend(own);
    }

    /// Instances are listeners of interface `I`
    pub fn listen<I: ?Sized + 'static>(&mut self, cast: fn(Rc<T>) -> Rc<I>) {
        self.listens.push(Rc::new(Listens { cast }));
    }

    /// Instances join the update schedule when created by the registry
    pub fn updatable(&mut self)
    where
        T: Update,
    {
        self.update = Some(update_of::<T>);
    }

    /// Number of declared fields, inherited ones included
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// A type whose dependency fields the registry can fill in
pub trait Injectable: Sized + 'static {
    /// List the dependency fields, base types and capabilities of `Self`
    fn declare(_decl: &mut Declaration<Self>) {}
}

/// The erased, cached declaration of one type
pub struct Declared {
    key: TypeKey,
    pub(crate) fields: Vec<Rc<dyn FieldBinding>>,
    pub(crate) listens: Vec<Rc<dyn ListenerBinding>>,
    pub(crate) update: Option<UpdateCast>,
}

impl Declared {
    /// Build the declaration of `T`
    pub fn of<T: Injectable>() -> Self {
        let mut decl = Declaration::<T>::new();
        T::declare(&mut decl);
        Self {
            key: TypeKey::of::<T>(),
            fields: decl.fields,
            listens: decl.listens,
            update: decl.update,
        }
    }

    /// A declaration with no fields or capabilities
    pub fn empty<T: 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            fields: Vec::new(),
            listens: Vec::new(),
            update: None,
        }
    }

    /// The declared type
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// The dependency fields, base fields first
    pub fn fields(&self) -> &[Rc<dyn FieldBinding>] {
        &self.fields
    }

    /// The listener interfaces
    pub fn interfaces(&self) -> Vec<TypeKey> {
        self.listens.iter().map(|l| l.interface()).collect()
    }

    /// Whether instances join the update schedule
    pub fn is_updatable(&self) -> bool {
        self.update.is_some()
    }
}

impl fmt::Debug for Declared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.fields.iter().map(|field| field.name()).collect();
        f.debug_struct("Declared")
            .field("key", &self.key)
            .field("fields", &fields)
            .field("interfaces", &self.interfaces())
            .field("updatable", &self.is_updatable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CallLog;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Audio;

    #[derive(Default)]
    struct Base {
        audio: Inject<Audio>,
    }

    impl Injectable for Base {
        fn declare(decl: &mut Declaration<Self>) {
            decl.service("audio", |base| &base.audio);
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        extra: Inject<Audio>,
        log: CallLog,
    }

    impl Injectable for Derived {
        fn declare(decl: &mut Declaration<Self>) {
            decl.service("extra", |d| &d.extra)
                .global()
                .on_injected(|d| d.log.push("extra"));
            decl.extend(|d| &d.base);
        }
    }

    #[test]
    fn test_base_fields_come_first() {
        let declared = Declared::of::<Derived>();
        let names: Vec<_> = declared.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["audio", "extra"]);
        assert_eq!(declared.fields()[0].owner(), TypeKey::of::<Derived>());
        assert_eq!(declared.fields()[1].flags(), InjectFlags::USE_GLOBAL);
    }

    #[derive(Default)]
    struct Mixer;

    #[derive(Default)]
    struct Second {
        mixer: Inject<Mixer>,
    }

    impl Injectable for Second {
        fn declare(decl: &mut Declaration<Self>) {
            decl.service("mixer", |second| &second.mixer);
        }
    }

    #[derive(Default)]
    struct TwoBases {
        first: Base,
        second: Second,
        own: Inject<Audio>,
    }

    impl Injectable for TwoBases {
        fn declare(decl: &mut Declaration<Self>) {
            decl.extend(|t| &t.first);
            decl.service("own", |t| &t.own);
            decl.extend(|t| &t.second);
        }
    }

    #[test]
    fn test_bases_keep_extension_order() {
        let declared = Declared::of::<TwoBases>();
        let names: Vec<_> = declared.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["audio", "mixer", "own"]);
    }

    #[test]
    fn test_assign_through_projection() {
        let declared = Declared::of::<Derived>();
        let owner = Derived::default();
        let audio: Rc<dyn Any> = Rc::new(Audio);

        assert!(declared.fields()[0].assign(&owner, Some(audio.clone())));
        assert!(owner.base.audio.is_set());
        assert!(!declared.fields()[0].assign(&owner, Some(audio)));
        assert!(declared.fields()[0].assign(&owner, None));
        assert!(!owner.base.audio.is_set());
    }

    #[test]
    fn test_assign_rejects_wrong_types() {
        let declared = Declared::of::<Derived>();
        let owner = Derived::default();
        let wrong: Rc<dyn Any> = Rc::new(5_u32);
        assert!(!declared.fields()[1].assign(&owner, Some(wrong)));
        assert!(!declared.fields()[1].assign(&Audio, Some(Rc::new(Audio))));
    }

    #[test]
    fn test_notify_runs_callback() {
        let declared = Declared::of::<Derived>();
        let owner = Derived::default();
        declared.fields()[1].notify(&owner);
        assert_eq!(owner.log.entries(), vec!["extra"]);
    }

    #[test]
    fn test_inject_many_replace_detects_changes() {
        let many = InjectMany::<Audio>::new();
        let a = Rc::new(Audio);
        assert!(many.replace(vec![a.clone()]));
        assert!(!many.replace(vec![a]));
        assert_eq!(many.len(), 1);
    }
}
