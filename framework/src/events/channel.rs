//! Per-interface listener registry with reentrancy-safe mutation

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::error;

use super::handler::{build_chain, same_handler, Chain, Handler};
use crate::error::{panic_message, LocatorError};
use crate::key::TypeKey;
use crate::subscription::Subscription;

/// Outcome of [`Channel::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    /// The listener is already in the live set
    AlreadyPresent,
    /// A dispatch is running and the listener is already queued
    AlreadyPendingAdd,
    /// A dispatch is running; the listener joins when it finishes
    QueuedForAdd,
    /// The listener joined the live set and the catchers ran
    Added,
}

type Catcher<I> = Rc<dyn Fn(&Rc<I>)>;

struct CatcherList<I: ?Sized> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Catcher<I>)>>,
}

impl<I: ?Sized + 'static> CatcherList<I> {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        })
    }

    fn add(self: &Rc<Self>, catcher: Catcher<I>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, catcher));

        let list: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(list) = list.upgrade() {
                list.entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    fn snapshot(&self) -> Vec<Catcher<I>> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, catcher)| catcher.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// The listener registry of one interface `I`
///
/// Listeners are kept in insertion order, which is the dispatch order.
/// While an [`invoke`](Channel::invoke) is running (at any nesting depth)
/// the live set is never touched: registrations and removals are queued
/// and applied when the outermost dispatch returns, removals first.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use plinth::{Channel, ListenerStatus};
///
/// pub trait Tick {
///     fn tick(&self);
/// }
///
/// struct Counter(std::cell::Cell<u32>);
///
/// impl Tick for Counter {
///     fn tick(&self) {
///         self.0.set(self.0.get() + 1);
///     }
/// }
///
/// let channel = Channel::<dyn Tick>::new();
/// let counter = Rc::new(Counter(Default::default()));
/// assert_eq!(channel.register_listener(counter.clone()), ListenerStatus::Added);
///
/// channel.invoke(|listener| listener.tick());
/// assert_eq!(counter.0.get(), 1);
/// ```
pub struct Channel<I: ?Sized + 'static> {
    key: TypeKey,
    listeners: RefCell<Vec<Rc<I>>>,
    pending_add: RefCell<VecDeque<Rc<I>>>,
    pending_remove: RefCell<VecDeque<Rc<I>>>,
    depth: Cell<usize>,
    catchers: Rc<CatcherList<I>>,
    remove_catchers: Rc<CatcherList<I>>,
    handlers: RefCell<Vec<Rc<dyn Handler<I>>>>,
    chain: RefCell<Option<Chain<I>>>,
}

impl<I: ?Sized + 'static> Channel<I> {
    /// Create an empty, standalone channel
    pub fn new() -> Self {
        Self {
            key: TypeKey::of::<I>(),
            listeners: RefCell::new(Vec::new()),
            pending_add: RefCell::new(VecDeque::new()),
            pending_remove: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
            catchers: CatcherList::new(),
            remove_catchers: CatcherList::new(),
            handlers: RefCell::new(Vec::new()),
            chain: RefCell::new(None),
        }
    }

    /// The interface this channel dispatches
    pub fn interface(&self) -> TypeKey {
        self.key
    }

    /// Number of listeners in the live set
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether the live set is empty
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Whether `listener` is in the live set
    pub fn contains(&self, listener: &Rc<I>) -> bool {
        self.listeners.borrow().iter().any(|l| same(l, listener))
    }

    /// Current dispatch nesting depth
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Number of queued registrations and removals
    pub fn pending(&self) -> (usize, usize) {
        (
            self.pending_add.borrow().len(),
            self.pending_remove.borrow().len(),
        )
    }

    /// Add a listener, or queue it if a dispatch is running
    pub fn register_listener(&self, listener: Rc<I>) -> ListenerStatus {
        if self.contains(&listener) && !queued(&self.pending_remove, &listener) {
            return ListenerStatus::AlreadyPresent;
        }

        if self.depth.get() >= 1 {
            if queued(&self.pending_add, &listener) {
                return ListenerStatus::AlreadyPendingAdd;
            }
            self.pending_add.borrow_mut().push_back(listener);
            return ListenerStatus::QueuedForAdd;
        }

        self.listeners.borrow_mut().push(listener.clone());
        self.fire(&self.catchers, &listener);
        ListenerStatus::Added
    }

    /// Remove a listener, or queue the removal if a dispatch is running
    ///
    /// Returns `true` when the listener left the live set (or will, once the
    /// running dispatch returns).
    pub fn remove_listener(&self, listener: &Rc<I>) -> bool {
        if self.depth.get() >= 1 {
            let was_pending = {
                let mut pending = self.pending_add.borrow_mut();
                let before = pending.len();
                pending.retain(|l| !same(l, listener));
                before != pending.len()
            };
            if !self.contains(listener) {
                return was_pending;
            }
            if !queued(&self.pending_remove, listener) {
                self.pending_remove.borrow_mut().push_back(listener.clone());
            }
            return true;
        }

        if !self.contains(listener) {
            return false;
        }
        self.fire(&self.remove_catchers, listener);
        self.listeners.borrow_mut().retain(|l| !same(l, listener));
        true
    }

    /// Call `action` on every listener, decorated, in insertion order
    ///
    /// A panicking listener is logged and skipped; the others still run.
    pub fn invoke(&self, mut action: impl FnMut(&I)) {
        self.dispatch(|listener| {
            action(listener);
            Ok(())
        });
    }

    /// Like [`invoke`](Channel::invoke) for fallible actions; errors are logged
    pub fn try_invoke<E: fmt::Display>(&self, mut action: impl FnMut(&I) -> Result<(), E>) {
        self.dispatch(|listener| action(listener).map_err(|err| err.to_string()));
    }

    fn dispatch(&self, mut action: impl FnMut(&I) -> Result<(), String>) {
        self.depth.set(self.depth.get() + 1);

        let mut index = 0;
        loop {
            let listener = match self.listeners.borrow().get(index) {
                Some(listener) => listener.clone(),
                None => break,
            };
            index += 1;

            let target = self.decorate(listener);
            let outcome = catch_unwind(AssertUnwindSafe(|| action(&*target)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(message)) => message,
                Err(payload) => panic_message(payload.as_ref()),
            };
            let err = LocatorError::ListenerFailed {
                interface: self.key.name(),
                message,
            };
            error!(interface = self.key.name(), error = %err, "listener failed during dispatch");
        }

        self.depth.set(self.depth.get() - 1);
        if self.depth.get() == 0 {
            self.flush();
        }
    }

    /// Apply queued removals, then queued registrations
    fn flush(&self) {
        loop {
            let next = self.pending_remove.borrow_mut().pop_front();
            match next {
                Some(listener) => {
                    self.remove_listener(&listener);
                }
                None => break,
            }
        }
        loop {
            let next = self.pending_add.borrow_mut().pop_front();
            match next {
                Some(listener) => {
                    self.register_listener(listener);
                }
                None => break,
            }
        }
        if let Some(chain) = self.chain.borrow().as_ref() {
            chain.innermost.next().unlink();
        }
    }

    /// Thread `listener` through the decorator chain
    fn decorate(&self, listener: Rc<I>) -> Rc<I> {
        match self.chain.borrow().as_ref() {
            Some(chain) => {
                chain.innermost.next().link(listener);
                chain.outermost.clone()
            }
            None => listener,
        }
    }

    /// Snapshot of the raw (undecorated) live set, in dispatch order
    pub fn listeners(&self) -> Vec<Rc<I>> {
        self.listeners.borrow().clone()
    }

    /// Call `f` on each decorated listener without entering a dispatch
    ///
    /// The decorated view is only valid inside `f`; the innermost link is
    /// restored once enumeration ends.
    pub fn for_each(&self, mut f: impl FnMut(&I)) {
        let chain = self
            .chain
            .borrow()
            .as_ref()
            .map(|chain| (chain.outermost.clone(), chain.innermost.clone()));
        let previous = chain.as_ref().and_then(|(_, innermost)| innermost.next().get());

        let mut index = 0;
        loop {
            let listener = match self.listeners.borrow().get(index) {
                Some(listener) => listener.clone(),
                None => break,
            };
            index += 1;

            match &chain {
                Some((outermost, innermost)) => {
                    innermost.next().link(listener);
                    f(&**outermost);
                }
                None => f(&*listener),
            }
        }

        if let Some((_, innermost)) = &chain {
            match previous {
                Some(previous) => innermost.next().link(previous),
                None => innermost.next().unlink(),
            }
        }
    }

    /// Add a decorator; returns `false` if it is already registered
    pub fn register_handler(&self, handler: Rc<dyn Handler<I>>) -> bool {
        {
            let mut handlers = self.handlers.borrow_mut();
            if handlers.iter().any(|h| same_handler(h, &handler)) {
                return false;
            }
            handlers.push(handler);
        }
        self.rebuild_chain();
        true
    }

    /// Remove a decorator; returns `false` if it was not registered
    pub fn remove_handler(&self, handler: &Rc<dyn Handler<I>>) -> bool {
        {
            let mut handlers = self.handlers.borrow_mut();
            let before = handlers.len();
            handlers.retain(|h| !same_handler(h, handler));
            if before == handlers.len() {
                return false;
            }
        }
        handler.next().unlink();
        self.rebuild_chain();
        true
    }

    /// Number of registered decorators
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    fn rebuild_chain(&self) {
        // decorators are user code; no borrow may be held while they run
        let mut handlers = self.handlers.borrow().clone();
        let chain = build_chain(&mut handlers);
        *self.handlers.borrow_mut() = handlers;
        *self.chain.borrow_mut() = chain;
    }

    /// Call `catcher` with every listener that joins the live set from now on
    pub fn register_catcher(&self, catcher: impl Fn(&Rc<I>) + 'static) -> Subscription {
        self.catchers.add(Rc::new(catcher))
    }

    /// Call `catcher` with every listener right before it leaves the live set
    pub fn register_remove_catcher(&self, catcher: impl Fn(&Rc<I>) + 'static) -> Subscription {
        self.remove_catchers.add(Rc::new(catcher))
    }

    /// Number of (add, remove) catchers currently registered
    pub fn catcher_count(&self) -> (usize, usize) {
        (self.catchers.len(), self.remove_catchers.len())
    }

    fn fire(&self, list: &CatcherList<I>, listener: &Rc<I>) {
        for catcher in list.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| catcher(listener))) {
                let err = LocatorError::ListenerFailed {
                    interface: self.key.name(),
                    message: panic_message(payload.as_ref()),
                };
                error!(interface = self.key.name(), error = %err, "catcher failed");
            }
        }
    }
}

impl<I: ?Sized + 'static> Default for Channel<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ?Sized + 'static> fmt::Debug for Channel<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("interface", &self.key.name())
            .field("listeners", &self.len())
            .field("depth", &self.depth.get())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

pub(crate) fn same<I: ?Sized>(a: &Rc<I>, b: &Rc<I>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

fn queued<I: ?Sized>(queue: &RefCell<VecDeque<Rc<I>>>, listener: &Rc<I>) -> bool {
    queue.borrow().iter().any(|l| same(l, listener))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handler::Next;
    use crate::testing::CallLog;
    use pretty_assertions::assert_eq;

    trait Foo {
        fn m(&self);
    }

    struct Named {
        name: &'static str,
        log: CallLog,
    }

    impl Foo for Named {
        fn m(&self) {
            self.log.push(self.name);
        }
    }

    fn named(name: &'static str, log: &CallLog) -> Rc<dyn Foo> {
        Rc::new(Named {
            name,
            log: log.clone(),
        })
    }

    struct Panics;

    impl Foo for Panics {
        fn m(&self) {
            panic!("listener exploded");
        }
    }

    /// Registers another listener from inside its own callback
    struct Spawner {
        channel: Weak<Channel<dyn Foo>>,
        child: Rc<dyn Foo>,
        log: CallLog,
    }

    impl Foo for Spawner {
        fn m(&self) {
            self.log.push("spawner");
            if let Some(channel) = self.channel.upgrade() {
                let status = channel.register_listener(self.child.clone());
                self.log.push(format!("{status:?}"));
            }
        }
    }

    /// Removes itself from inside its own callback
    struct Quitter {
        channel: Weak<Channel<dyn Foo>>,
        me: RefCell<Option<Weak<dyn Foo>>>,
        log: CallLog,
    }

    impl Foo for Quitter {
        fn m(&self) {
            self.log.push("quitter");
            let me = self.me.borrow().as_ref().and_then(Weak::upgrade);
            if let (Some(channel), Some(me)) = (self.channel.upgrade(), me) {
                channel.remove_listener(&me);
            }
        }
    }

    #[test]
    fn test_dispatch_in_insertion_order() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(named("l1", &log));
        channel.register_listener(named("l2", &log));

        channel.invoke(|l| l.m());
        assert_eq!(log.entries(), vec!["l1", "l2"]);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        let l1 = named("l1", &log);
        assert_eq!(channel.register_listener(l1.clone()), ListenerStatus::Added);
        assert_eq!(channel.register_listener(l1), ListenerStatus::AlreadyPresent);
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(Rc::new(Panics));
        channel.register_listener(named("l2", &log));

        channel.invoke(|l| l.m());
        assert_eq!(log.entries(), vec!["l2"]);
        assert_eq!(channel.depth(), 0);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_try_invoke_logs_errors_and_continues() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(named("l1", &log));
        channel.register_listener(named("l2", &log));

        let mut calls = 0;
        channel.try_invoke(|l| {
            calls += 1;
            l.m();
            if calls == 1 {
                Err("first failed")
            } else {
                Ok(())
            }
        });
        assert_eq!(log.entries(), vec!["l1", "l2"]);
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_pass() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        let child = named("child", &log);
        channel.register_listener(Rc::new(Spawner {
            channel: Rc::downgrade(&channel),
            child: child.clone(),
            log: log.clone(),
        }));

        channel.invoke(|l| l.m());
        assert_eq!(log.take(), vec!["spawner", "QueuedForAdd"]);
        assert!(channel.contains(&child));

        channel.invoke(|l| l.m());
        assert_eq!(log.take(), vec!["spawner", "AlreadyPresent", "child"]);
    }

    #[test]
    fn test_listener_removing_itself_mid_dispatch() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        let quitter = Rc::new(Quitter {
            channel: Rc::downgrade(&channel),
            me: RefCell::new(None),
            log: log.clone(),
        });
        let as_listener: Rc<dyn Foo> = quitter.clone();
        *quitter.me.borrow_mut() = Some(Rc::downgrade(&as_listener));

        channel.register_listener(as_listener.clone());
        channel.register_listener(named("l2", &log));

        channel.invoke(|l| l.m());
        assert_eq!(log.take(), vec!["quitter", "l2"]);
        assert!(!channel.contains(&as_listener));

        channel.invoke(|l| l.m());
        assert_eq!(log.take(), vec!["l2"]);
    }

    #[test]
    fn test_queue_statuses_during_dispatch() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        channel.register_listener(named("l1", &log));
        let late = named("late", &log);

        let statuses = RefCell::new(Vec::new());
        channel.invoke(|_| {
            statuses.borrow_mut().push(channel.register_listener(late.clone()));
            statuses.borrow_mut().push(channel.register_listener(late.clone()));
            assert_eq!(channel.pending(), (1, 0));
        });
        assert_eq!(
            statuses.into_inner(),
            vec![ListenerStatus::QueuedForAdd, ListenerStatus::AlreadyPendingAdd]
        );
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_removals_apply_before_additions() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        let l1 = named("l1", &log);
        channel.register_listener(l1.clone());

        let events = log.clone();
        let _added = channel.register_catcher(move |_| events.push("added"));
        let events = log.clone();
        let _removed = channel.register_remove_catcher(move |_| events.push("removed"));
        log.take();

        channel.invoke(|_| {
            channel.remove_listener(&l1);
            channel.register_listener(l1.clone());
        });
        assert_eq!(log.take(), vec!["removed", "added"]);
        assert!(channel.contains(&l1));
    }

    #[test]
    fn test_remove_cancels_pending_add() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        channel.register_listener(named("l1", &log));
        let late = named("late", &log);

        channel.invoke(|_| {
            channel.register_listener(late.clone());
            assert!(channel.remove_listener(&late));
        });
        assert!(!channel.contains(&late));
        assert_eq!(channel.pending(), (0, 0));
    }

    #[test]
    fn test_nested_dispatch_defers_until_outermost_returns() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        channel.register_listener(named("l1", &log));
        let late = named("late", &log);

        let mut outer_calls = 0;
        channel.invoke(|_| {
            outer_calls += 1;
            channel.invoke(|_| {
                channel.register_listener(late.clone());
            });
            assert_eq!(channel.depth(), 1);
            assert!(!channel.contains(&late));
        });
        assert_eq!(outer_calls, 1);
        assert!(channel.contains(&late));
    }

    #[test]
    fn test_catchers_fire_and_dispose() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        let events = log.clone();
        let catcher = channel.register_catcher(move |_| events.push("caught"));
        assert_eq!(channel.catcher_count(), (1, 0));

        channel.register_listener(named("l1", &log));
        catcher.dispose();
        channel.register_listener(named("l2", &log));

        assert_eq!(log.entries(), vec!["caught"]);
        assert_eq!(channel.catcher_count(), (0, 0));
    }

    #[test]
    fn test_disposing_one_catcher_keeps_the_other() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        let events = log.clone();
        let first = channel.register_catcher(move |_| events.push("first"));
        let events = log.clone();
        let _second = channel.register_catcher(move |_| events.push("second"));

        drop(first);
        channel.register_listener(named("l1", &log));
        assert_eq!(log.entries(), vec!["second"]);
    }

    struct Prefix {
        label: &'static str,
        priority: i32,
        log: CallLog,
        next: Next<dyn Foo>,
    }

    impl Foo for Prefix {
        fn m(&self) {
            self.log.push(self.label);
            if let Some(next) = self.next.get() {
                next.m();
            }
        }
    }

    impl Handler<dyn Foo> for Prefix {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn next(&self) -> &Next<dyn Foo> {
            &self.next
        }

        fn as_listener(self: Rc<Self>) -> Rc<dyn Foo> {
            self
        }
    }

    fn prefix(label: &'static str, priority: i32, log: &CallLog) -> Rc<dyn Handler<dyn Foo>> {
        Rc::new(Prefix {
            label,
            priority,
            log: log.clone(),
            next: Next::new(),
        })
    }

    #[test]
    fn test_decorators_wrap_by_priority() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(named("l1", &log));
        channel.register_listener(named("l2", &log));

        for (label, priority) in [("p5", 5), ("p1", 1), ("p3", 3)] {
            assert!(channel.register_handler(prefix(label, priority, &log)));
        }

        channel.invoke(|l| l.m());
        assert_eq!(
            log.take(),
            vec!["p5", "p3", "p1", "l1", "p5", "p3", "p1", "l2"]
        );
    }

    #[test]
    fn test_removing_decorator_rebuilds_chain() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(named("l1", &log));
        let outer = prefix("outer", 2, &log);
        let inner = prefix("inner", 1, &log);
        channel.register_handler(outer.clone());
        channel.register_handler(inner);
        assert!(!channel.register_handler(outer.clone()));

        assert!(channel.remove_handler(&outer));
        assert!(!channel.remove_handler(&outer));
        channel.invoke(|l| l.m());
        assert_eq!(log.take(), vec!["inner", "l1"]);
        assert_eq!(channel.handler_count(), 1);
    }

    #[test]
    fn test_enumeration_is_decorated_and_depth_free() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(named("l1", &log));
        channel.register_listener(named("l2", &log));
        channel.register_handler(prefix("wrap", 0, &log));

        channel.for_each(|l| {
            l.m();
        });
        assert_eq!(channel.depth(), 0);
        assert_eq!(log.take(), vec!["wrap", "l1", "wrap", "l2"]);
        assert_eq!(channel.listeners().len(), 2);
    }

    #[test]
    fn test_enumeration_leaves_chain_unlinked() {
        let log = CallLog::new();
        let channel = Channel::<dyn Foo>::new();
        channel.register_listener(named("l1", &log));
        channel.register_listener(named("l2", &log));
        let wrap = prefix("wrap", 0, &log);
        channel.register_handler(wrap.clone());

        let mut seen = 0;
        channel.for_each(|_| seen += 1);
        assert_eq!(seen, 2);
        assert!(!wrap.next().is_linked());

        for listener in channel.listeners() {
            listener.m();
        }
        assert_eq!(log.take(), vec!["l1", "l2"]);
    }

    /// Reads the channel it decorates while the chain is being built
    struct Inspector {
        channel: Weak<Channel<dyn Foo>>,
        next: Next<dyn Foo>,
    }

    impl Foo for Inspector {
        fn m(&self) {
            if let Some(next) = self.next.get() {
                next.m();
            }
        }
    }

    impl Handler<dyn Foo> for Inspector {
        fn priority(&self) -> i32 {
            self.channel.upgrade().map_or(0, |c| c.handler_count() as i32)
        }

        fn next(&self) -> &Next<dyn Foo> {
            &self.next
        }

        fn as_listener(self: Rc<Self>) -> Rc<dyn Foo> {
            self
        }
    }

    #[test]
    fn test_decorator_may_inspect_channel_during_rebuild() {
        let log = CallLog::new();
        let channel = Rc::new(Channel::<dyn Foo>::new());
        channel.register_listener(named("l1", &log));
        let inspector = Rc::new(Inspector {
            channel: Rc::downgrade(&channel),
            next: Next::new(),
        });

        assert!(channel.register_handler(inspector));
        assert!(channel.register_handler(prefix("wrap", 0, &log)));
        channel.invoke(|l| l.m());
        assert_eq!(log.take(), vec!["wrap", "l1"]);
    }
}
