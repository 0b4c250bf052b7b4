//! Observable values exposed by services
//!
//! A service that owns a piece of state other objects want to follow keeps
//! it in a [`ValueProvider`] and implements [`ProvidesValue`]. Observers
//! subscribe directly, or through [`Observable::subscribe`] when all they
//! know is the service type.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::container::Registry;
use crate::subscription::Subscription;

type Subscriber<T> = Rc<dyn Fn(&T)>;

struct Subscribers<T> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Subscriber<T>)>>,
}

/// A value that notifies subscribers when it changes
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use plinth::ValueProvider;
///
/// let health = ValueProvider::new(100_u32);
/// let seen = Rc::new(Cell::new(0));
/// let sink = seen.clone();
/// let _sub = health.subscribe(move |value| sink.set(*value));
/// assert_eq!(seen.get(), 100);
///
/// health.set(80);
/// assert_eq!(seen.get(), 80);
/// ```
pub struct ValueProvider<T> {
    value: RefCell<T>,
    subscribers: Rc<Subscribers<T>>,
}

impl<T: Clone + PartialEq + 'static> ValueProvider<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            subscribers: Rc::new(Subscribers {
                next_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A copy of the current value
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Store `value`; subscribers run only if it differs from the current one
    ///
    /// Returns `true` when the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        let subscribers: Vec<_> = self
            .subscribers
            .entries
            .borrow()
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(&value);
        }
        true
    }

    /// Apply `f` to a copy of the value and store the result
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.value.borrow());
        self.set(next)
    }

    /// Call `f` with the current value now and with every later change
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let f: Subscriber<T> = Rc::new(f);
        let id = self.subscribers.next_id.get();
        self.subscribers.next_id.set(id + 1);
        self.subscribers.entries.borrow_mut().push((id, f.clone()));

        f(&self.get());

        let subscribers: Weak<Subscribers<T>> = Rc::downgrade(&self.subscribers);
        Subscription::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Like [`subscribe`](ValueProvider::subscribe), but holds `owner` weakly
    ///
    /// Once the owner is dropped the callback is silently skipped.
    pub fn subscribe_for<O: 'static>(
        &self,
        owner: &Rc<O>,
        f: impl Fn(&O, &T) + 'static,
    ) -> Subscription {
        let owner = Rc::downgrade(owner);
        self.subscribe(move |value| {
            if let Some(owner) = owner.upgrade() {
                f(&owner, value);
            }
        })
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.entries.borrow().len()
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for ValueProvider<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueProvider")
            .field("value", &*self.value.borrow())
            .field("subscribers", &self.subscribers.entries.borrow().len())
            .finish()
    }
}

/// A service that exposes a [`ValueProvider`]
pub trait ProvidesValue<T> {
    fn provider(&self) -> &ValueProvider<T>;
}

/// Subscribe to a service's value knowing only the service type
pub struct Observable;

impl Observable {
    /// Find (or lazily create) `S` and subscribe `f` to its value
    ///
    /// Returns `None` when the registry cannot produce `S`.
    pub fn subscribe<S, T>(registry: &Registry, f: impl Fn(&T) + 'static) -> Option<Subscription>
    where
        S: ProvidesValue<T> + 'static,
        T: Clone + PartialEq + 'static,
    {
        let service = registry.try_get::<S>()?;
        Some(service.provider().subscribe(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CallLog;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_notifies_only_on_change() {
        let log = CallLog::new();
        let provider = ValueProvider::new(1);
        let sink = log.clone();
        let _sub = provider.subscribe(move |v| sink.push(v.to_string()));

        assert!(!provider.set(1));
        assert!(provider.set(2));
        assert!(provider.update(|v| v + 1));
        assert_eq!(log.entries(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_dropping_subscription_stops_delivery() {
        let log = CallLog::new();
        let provider = ValueProvider::new(0);
        let sink = log.clone();
        let sub = provider.subscribe(move |v| sink.push(v.to_string()));
        assert_eq!(provider.subscriber_count(), 1);

        drop(sub);
        provider.set(5);
        assert_eq!(log.entries(), vec!["0"]);
        assert_eq!(provider.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_for_skips_dropped_owner() {
        struct Hud {
            log: CallLog,
        }

        let log = CallLog::new();
        let hud = Rc::new(Hud { log: log.clone() });
        let provider = ValueProvider::new(10);
        let _sub = provider.subscribe_for(&hud, |hud, v| hud.log.push(v.to_string()));

        drop(hud);
        provider.set(20);
        assert_eq!(log.entries(), vec!["10"]);
    }

    #[test]
    fn test_subscriber_may_set_again() {
        let provider = Rc::new(ValueProvider::new(0));
        let inner = Rc::downgrade(&provider);
        let _sub = provider.subscribe(move |v| {
            if *v == 1 {
                if let Some(provider) = inner.upgrade() {
                    provider.set(2);
                }
            }
        });

        provider.set(1);
        assert_eq!(provider.get(), 2);
    }
}
