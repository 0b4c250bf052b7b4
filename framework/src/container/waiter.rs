//! Deferred field bindings waiting on a dependency type

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, error};

use super::host::Liveness;
use super::inject::FieldBinding;
use crate::error::{panic_message, LocatorError};
use crate::key::TypeKey;

/// One (owner, field) pair bound to a dependency type
pub(crate) struct Waiter {
    owner: Weak<dyn Any>,
    owner_addr: *const (),
    field: Rc<dyn FieldBinding>,
}

/// What a replay did to one waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The value was stored (or the slot was cleared)
    Delivered,
    /// The owner is gone; the waiter should be dropped
    Stale,
}

impl Waiter {
    pub(crate) fn new(owner: &Rc<dyn Any>, field: Rc<dyn FieldBinding>) -> Rc<Self> {
        Rc::new(Self {
            owner: Rc::downgrade(owner),
            owner_addr: Rc::as_ptr(owner) as *const (),
            field,
        })
    }

    fn same_binding(&self, other: &Waiter) -> bool {
        self.owner_addr == other.owner_addr && same_field(&self.field, &other.field)
    }

    /// Assign `value` to the bound field and run its callback
    pub(crate) fn update_reference(
        &self,
        value: Option<Rc<dyn Any>>,
        liveness: &dyn Liveness,
    ) -> Delivery {
        let Some(owner) = self.owner.upgrade() else {
            return Delivery::Stale;
        };
        if !liveness.is_alive(&*owner) {
            return Delivery::Stale;
        }

        if self.field.assign(&*owner, value) {
            notify(&*self.field, &*owner);
        }
        Delivery::Delivered
    }
}

/// Run a field's post-injection callback, logging a panic instead of unwinding
pub(crate) fn notify(field: &dyn FieldBinding, owner: &dyn Any) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| field.notify(owner))) {
        let err = LocatorError::CallbackFailed {
            owner: field.owner().name(),
            field: field.name(),
            message: panic_message(payload.as_ref()),
        };
        error!(owner = field.owner().name(), field = field.name(), error = %err, "injection callback failed");
    }
}

fn same_field(a: &Rc<dyn FieldBinding>, b: &Rc<dyn FieldBinding>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

#[derive(Default)]
struct WaiterList {
    waiters: Vec<Rc<Waiter>>,
    depth: usize,
    pending_add: Vec<Rc<Waiter>>,
    pending_remove: Vec<Rc<Waiter>>,
    discard: bool,
    generation: u64,
}

impl WaiterList {
    fn contains(&self, waiter: &Waiter) -> bool {
        self.waiters
            .iter()
            .any(|w| w.same_binding(waiter) && w.owner.strong_count() > 0)
    }

    fn apply_pending(&mut self) {
        for waiter in std::mem::take(&mut self.pending_remove) {
            self.waiters.retain(|w| !Rc::ptr_eq(w, &waiter));
        }
        if std::mem::take(&mut self.discard) {
            self.waiters.clear();
        }
        for waiter in std::mem::take(&mut self.pending_add) {
            if !self.contains(&waiter) {
                self.waiters.push(waiter);
            }
        }
    }
}

/// Waiters grouped by dependency type
///
/// Replays take a snapshot; structural changes made while a replay of the
/// same type is running are queued and applied when the outermost replay
/// ends, removals before additions. A replay started from inside another
/// replay of the same type supersedes it: the outer pass stops delivering
/// its older value.
#[derive(Default)]
pub(crate) struct Waiters {
    lists: RefCell<HashMap<TypeId, WaiterList>>,
}

impl Waiters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a waiter; a second request for the same live binding is a no-op
    pub(crate) fn add(&self, target: TypeKey, waiter: Rc<Waiter>) -> bool {
        let mut lists = self.lists.borrow_mut();
        let list = lists.entry(target.id()).or_default();

        if list.depth > 0 {
            let queued = list.pending_add.iter().any(|w| w.same_binding(&waiter));
            if queued || (list.contains(&waiter) && !list.discard) {
                return false;
            }
            list.pending_add.push(waiter);
            return true;
        }

        if list.contains(&waiter) {
            return false;
        }
        // a dropped owner's slot can be reused by a new allocation
        list.waiters.retain(|w| w.owner.strong_count() > 0);
        list.waiters.push(waiter);
        true
    }

    /// Deliver `value` to every waiter on `target`
    ///
    /// Waiters whose owner is gone are dropped. When `keep_resolved` is
    /// false, waiters that received a present value are dropped too.
    pub(crate) fn replay(
        &self,
        target: TypeKey,
        value: Option<Rc<dyn Any>>,
        keep_resolved: bool,
        liveness: &dyn Liveness,
    ) -> usize {
        let (snapshot, generation) = {
            let mut lists = self.lists.borrow_mut();
            let Some(list) = lists.get_mut(&target.id()) else {
                return 0;
            };
            list.depth += 1;
            list.generation += 1;
            let snapshot = list
                .waiters
                .iter()
                .filter(|w| !list.pending_remove.iter().any(|p| Rc::ptr_eq(p, w)))
                .cloned()
                .collect::<Vec<_>>();
            (snapshot, list.generation)
        };

        debug!(
            dependency = target.name(),
            waiters = snapshot.len(),
            present = value.is_some(),
            "replaying waiters"
        );

        let mut delivered = 0;
        for waiter in &snapshot {
            if self.generation(target) != generation {
                debug!(dependency = target.name(), "replay superseded by a nested one");
                break;
            }
            let outcome = waiter.update_reference(value.clone(), liveness);
            let drop_waiter = match outcome {
                Delivery::Stale => true,
                Delivery::Delivered => {
                    delivered += 1;
                    value.is_some() && !keep_resolved
                }
            };
            if drop_waiter {
                self.remove(target, waiter);
            }
        }

        let mut lists = self.lists.borrow_mut();
        if let Some(list) = lists.get_mut(&target.id()) {
            list.depth -= 1;
            if list.depth == 0 {
                list.apply_pending();
            }
        }
        delivered
    }

    fn generation(&self, target: TypeKey) -> u64 {
        self.lists
            .borrow()
            .get(&target.id())
            .map_or(0, |list| list.generation)
    }

    fn remove(&self, target: TypeKey, waiter: &Rc<Waiter>) {
        let mut lists = self.lists.borrow_mut();
        let Some(list) = lists.get_mut(&target.id()) else {
            return;
        };
        if list.depth > 0 {
            if !list.pending_remove.iter().any(|p| Rc::ptr_eq(p, waiter)) {
                list.pending_remove.push(waiter.clone());
            }
        } else {
            list.waiters.retain(|w| !Rc::ptr_eq(w, waiter));
        }
    }

    /// Forget every waiter on `target` (deferred while a replay is running)
    pub(crate) fn discard(&self, target: TypeKey) {
        let mut lists = self.lists.borrow_mut();
        let Some(list) = lists.get_mut(&target.id()) else {
            return;
        };
        if list.depth > 0 {
            list.discard = true;
            list.pending_add.clear();
        } else {
            lists.remove(&target.id());
        }
    }

    /// Number of waiters currently bound to `target`
    pub(crate) fn count(&self, target: TypeKey) -> usize {
        self.lists
            .borrow()
            .get(&target.id())
            .map_or(0, |list| list.waiters.len())
    }

    /// Total number of waiters
    pub(crate) fn total(&self) -> usize {
        self.lists.borrow().values().map(|list| list.waiters.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::host::AlwaysAlive;
    use crate::container::inject::{Declared, Inject, Injectable};
    use crate::testing::CallLog;
    use crate::Declaration;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Mixer;

    #[derive(Default)]
    struct Speaker {
        mixer: Inject<Mixer>,
        log: CallLog,
    }

    impl Injectable for Speaker {
        fn declare(decl: &mut Declaration<Self>) {
            decl.service("mixer", |s| &s.mixer).on_injected(|s| {
                let state = if s.mixer.is_set() { "set" } else { "cleared" };
                s.log.push(state);
            });
        }
    }

    fn speaker() -> (Rc<Speaker>, Rc<dyn Any>, Rc<dyn FieldBinding>) {
        let declared = Declared::of::<Speaker>();
        let speaker = Rc::new(Speaker::default());
        let owner: Rc<dyn Any> = speaker.clone();
        (speaker, owner, declared.fields()[0].clone())
    }

    fn key() -> TypeKey {
        TypeKey::of::<Mixer>()
    }

    #[test]
    fn test_add_is_idempotent() {
        let waiters = Waiters::new();
        let (_speaker, owner, field) = speaker();
        assert!(waiters.add(key(), Waiter::new(&owner, field.clone())));
        assert!(!waiters.add(key(), Waiter::new(&owner, field)));
        assert_eq!(waiters.count(key()), 1);
    }

    #[test]
    fn test_one_shot_waiter_is_dropped_after_resolution() {
        let waiters = Waiters::new();
        let (speaker, owner, field) = speaker();
        waiters.add(key(), Waiter::new(&owner, field));

        let mixer: Rc<dyn Any> = Rc::new(Mixer);
        assert_eq!(waiters.replay(key(), Some(mixer), false, &AlwaysAlive), 1);
        assert!(speaker.mixer.is_set());
        assert_eq!(speaker.log.entries(), vec!["set"]);
        assert_eq!(waiters.count(key()), 0);
    }

    #[test]
    fn test_dynamic_waiter_sees_clear_then_replacement() {
        let waiters = Waiters::new();
        let (speaker, owner, field) = speaker();
        waiters.add(key(), Waiter::new(&owner, field));

        waiters.replay(key(), Some(Rc::new(Mixer)), true, &AlwaysAlive);
        waiters.replay(key(), None, true, &AlwaysAlive);
        waiters.replay(key(), Some(Rc::new(Mixer)), true, &AlwaysAlive);

        assert_eq!(speaker.log.entries(), vec!["set", "cleared", "set"]);
        assert_eq!(waiters.count(key()), 1);
    }

    #[test]
    fn test_dropped_owner_is_deregistered() {
        let waiters = Waiters::new();
        let (speaker, owner, field) = speaker();
        waiters.add(key(), Waiter::new(&owner, field));
        drop(owner);
        drop(speaker);

        assert_eq!(waiters.replay(key(), Some(Rc::new(Mixer)), true, &AlwaysAlive), 0);
        assert_eq!(waiters.count(key()), 0);
    }

    #[test]
    fn test_discard_during_replay_is_deferred() {
        #[derive(Default)]
        struct Reentrant {
            mixer: Inject<Mixer>,
            waiters: RefCell<Option<Rc<Waiters>>>,
            seen: std::cell::Cell<usize>,
        }

        impl Injectable for Reentrant {
            fn declare(decl: &mut Declaration<Self>) {
                decl.service("mixer", |r| &r.mixer).on_injected(|r| {
                    r.seen.set(r.seen.get() + 1);
                    if let Some(waiters) = r.waiters.borrow().as_ref() {
                        waiters.discard(TypeKey::of::<Mixer>());
                    }
                });
            }
        }

        let waiters = Rc::new(Waiters::new());
        let field = Declared::of::<Reentrant>().fields()[0].clone();
        let first = Rc::new(Reentrant::default());
        let second = Rc::new(Reentrant::default());
        for owner in [&first, &second] {
            *owner.waiters.borrow_mut() = Some(waiters.clone());
            let erased: Rc<dyn Any> = owner.clone();
            waiters.add(key(), Waiter::new(&erased, field.clone()));
        }

        waiters.replay(key(), Some(Rc::new(Mixer)), true, &AlwaysAlive);
        assert_eq!(first.seen.get(), 1);
        assert_eq!(second.seen.get(), 1);
        assert_eq!(waiters.total(), 0);
    }

    #[test]
    fn test_panicking_callback_keeps_bookkeeping() {
        #[derive(Default)]
        struct Fragile {
            mixer: Inject<Mixer>,
        }

        impl Injectable for Fragile {
            fn declare(decl: &mut Declaration<Self>) {
                decl.service("mixer", |f| &f.mixer)
                    .on_injected(|_| panic!("callback exploded"));
            }
        }

        let waiters = Waiters::new();
        let fragile = Rc::new(Fragile::default());
        let owner: Rc<dyn Any> = fragile.clone();
        let field = Declared::of::<Fragile>().fields()[0].clone();
        waiters.add(key(), Waiter::new(&owner, field));

        assert_eq!(waiters.replay(key(), Some(Rc::new(Mixer)), false, &AlwaysAlive), 1);
        assert!(fragile.mixer.is_set());
        assert_eq!(waiters.count(key()), 0);
    }
}
