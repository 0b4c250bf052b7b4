//! Typed event bus
//!
//! One [`Channel`] per listener interface, created on first request and
//! cached for the lifetime of the bus. Listener interfaces are plain traits;
//! a dispatch is a closure that calls the trait method on each listener.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use plinth::EventBus;
//!
//! pub trait ScoreEvents {
//!     fn scored(&self, points: u32);
//! }
//!
//! #[derive(Default)]
//! struct Total(Cell<u32>);
//!
//! impl ScoreEvents for Total {
//!     fn scored(&self, points: u32) {
//!         self.0.set(self.0.get() + points);
//!     }
//! }
//!
//! let bus = EventBus::new();
//! let total = Rc::new(Total::default());
//! bus.channel::<dyn ScoreEvents>().register_listener(total.clone());
//!
//! bus.emit::<dyn ScoreEvents>(|listener| listener.scored(5));
//! assert_eq!(total.0.get(), 5);
//! ```

pub mod channel;
pub mod handler;

pub use channel::{Channel, ListenerStatus};
pub use handler::{Handler, Next};

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::container::inject::{Declared, Injectable};
use crate::key::TypeKey;

/// Registry of per-interface channels
#[derive(Default)]
pub struct EventBus {
    channels: RefCell<HashMap<TypeId, (TypeKey, Rc<dyn Any>)>>,
}

impl EventBus {
    /// Create a bus with no channels
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel of interface `I`, created on first request
    pub fn channel<I: ?Sized + 'static>(&self) -> Rc<Channel<I>> {
        if let Some(channel) = self.get::<I>() {
            return channel;
        }
        let channel = Rc::new(Channel::<I>::new());
        let key = TypeKey::of::<I>();
        debug!(interface = key.name(), "created channel");
        self.channels
            .borrow_mut()
            .insert(key.id(), (key, channel.clone() as Rc<dyn Any>));
        channel
    }

    /// The channel of interface `I`, if one exists
    pub fn get<I: ?Sized + 'static>(&self) -> Option<Rc<Channel<I>>> {
        let erased = self
            .channels
            .borrow()
            .get(&TypeId::of::<I>())
            .map(|(_, channel)| channel.clone())?;
        erased.downcast::<Channel<I>>().ok()
    }

    /// Dispatch `action` to every listener of `I`
    pub fn emit<I: ?Sized + 'static>(&self, action: impl FnMut(&I)) {
        self.channel::<I>().invoke(action);
    }

    /// Interfaces that have a channel
    pub fn interfaces(&self) -> Vec<TypeKey> {
        let mut keys: Vec<_> = self.channels.borrow().values().map(|(key, _)| *key).collect();
        keys.sort_by_key(|key| key.name());
        keys
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.borrow().len()
    }

    /// Whether no channel has been created yet
    pub fn is_empty(&self) -> bool {
        self.channels.borrow().is_empty()
    }

    /// Register `instance` on every interface its type declares with `listen`
    ///
    /// Returns the number of channels the instance joined (or was queued for).
    pub fn subscribe_instance<T: Injectable>(&self, instance: &Rc<T>) -> usize {
        let erased: Rc<dyn Any> = instance.clone();
        self.subscribe_declared(&Declared::of::<T>(), &erased)
    }

    /// Remove `instance` from every interface its type declares with `listen`
    pub fn unsubscribe_instance<T: Injectable>(&self, instance: &Rc<T>) -> usize {
        let erased: Rc<dyn Any> = instance.clone();
        self.unsubscribe_declared(&Declared::of::<T>(), &erased)
    }

    pub(crate) fn subscribe_declared(&self, declared: &Declared, instance: &Rc<dyn Any>) -> usize {
        declared
            .listens
            .iter()
            .filter(|listens| listens.subscribe(self, instance))
            .count()
    }

    pub(crate) fn unsubscribe_declared(&self, declared: &Declared, instance: &Rc<dyn Any>) -> usize {
        declared
            .listens
            .iter()
            .filter(|listens| listens.unsubscribe(self, instance))
            .count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("interfaces", &self.interfaces())
            .finish()
    }
}
