//! Priority-ordered decorators threaded in front of every listener
//!
//! A decorator is itself an implementation of the listener interface `I`
//! that forwards to whatever its [`Next`] link currently points at. The
//! owning [`Channel`](super::Channel) relinks the chain whenever the set of
//! decorators changes, and points the innermost link at the raw listener
//! right before each call.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use plinth::{Handler, Next};
//!
//! pub trait Damage {
//!     fn hit(&self, amount: u32);
//! }
//!
//! /// Halves incoming damage before the listener sees it
//! #[derive(Default)]
//! struct Armor {
//!     next: Next<dyn Damage>,
//! }
//!
//! impl Damage for Armor {
//!     fn hit(&self, amount: u32) {
//!         if let Some(next) = self.next.get() {
//!             next.hit(amount / 2);
//!         }
//!     }
//! }
//!
//! impl Handler<dyn Damage> for Armor {
//!     fn priority(&self) -> i32 {
//!         10
//!     }
//!
//!     fn next(&self) -> &Next<dyn Damage> {
//!         &self.next
//!     }
//!
//!     fn as_listener(self: Rc<Self>) -> Rc<dyn Damage> {
//!         self
//!     }
//! }
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Mutable back-reference from a decorator to the next element of the chain
pub struct Next<I: ?Sized> {
    target: RefCell<Option<Rc<I>>>,
}

impl<I: ?Sized> Next<I> {
    /// An unlinked back-reference
    pub fn new() -> Self {
        Self {
            target: RefCell::new(None),
        }
    }

    /// The element this decorator forwards to
    pub fn get(&self) -> Option<Rc<I>> {
        self.target.borrow().clone()
    }

    /// Whether the link currently points anywhere
    pub fn is_linked(&self) -> bool {
        self.target.borrow().is_some()
    }

    pub(crate) fn link(&self, target: Rc<I>) {
        *self.target.borrow_mut() = Some(target);
    }

    pub(crate) fn unlink(&self) {
        self.target.borrow_mut().take();
    }
}

impl<I: ?Sized> Default for Next<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ?Sized> fmt::Debug for Next<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// A decorator inserted ahead of the raw listener of interface `I`
pub trait Handler<I: ?Sized + 'static>: 'static {
    /// Higher priorities wrap lower ones; the highest is called first
    fn priority(&self) -> i32 {
        0
    }

    /// The back-reference the channel relinks
    fn next(&self) -> &Next<I>;

    /// View this decorator as a listener of `I`
    fn as_listener(self: Rc<Self>) -> Rc<I>;
}

/// The linked decorator chain of one channel
pub(crate) struct Chain<I: ?Sized + 'static> {
    /// Highest-priority decorator, viewed as a listener
    pub(crate) outermost: Rc<I>,
    /// Lowest-priority decorator; its link is pointed at each raw listener
    pub(crate) innermost: Rc<dyn Handler<I>>,
}

/// Sort descending by priority (stable) and relink every back-reference
///
/// Returns `None` when no decorators remain.
pub(crate) fn build_chain<I: ?Sized + 'static>(
    handlers: &mut [Rc<dyn Handler<I>>],
) -> Option<Chain<I>> {
    handlers.sort_by_key(|handler| std::cmp::Reverse(handler.priority()));

    for pair in handlers.windows(2) {
        pair[0].next().link(pair[1].clone().as_listener());
    }

    let innermost = handlers.last()?.clone();
    innermost.next().unlink();
    let outermost = handlers.first()?.clone().as_listener();
    Some(Chain {
        outermost,
        innermost,
    })
}

pub(crate) fn same_handler<I: ?Sized + 'static>(
    a: &Rc<dyn Handler<I>>,
    b: &Rc<dyn Handler<I>>,
) -> bool {
    std::ptr::eq(
        Rc::as_ptr(a) as *const (),
        Rc::as_ptr(b) as *const (),
    )
}
