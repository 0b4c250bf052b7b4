//! Disposable capability returned by catcher and observer registrations

use std::fmt;

/// Removes exactly one registered callback when dropped
///
/// Returned by [`Channel::register_catcher`](crate::Channel::register_catcher),
/// [`ValueProvider::subscribe`](crate::ValueProvider::subscribe) and friends.
/// Keep it alive for as long as the callback should stay registered, or call
/// [`detach`](Subscription::detach) to keep the callback for good.
#[must_use = "dropping a Subscription removes the callback immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Remove the callback now
    pub fn dispose(self) {
        drop(self);
    }

    /// Keep the callback registered for the lifetime of its owner
    pub fn detach(mut self) {
        self.remove = None;
    }

    /// Whether dropping this value still removes something
    pub fn is_active(&self) -> bool {
        self.remove.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_drop_runs_remover_once() {
        let removed = Rc::new(Cell::new(0));
        let counter = removed.clone();
        let sub = Subscription::new(move || counter.set(counter.get() + 1));
        assert!(sub.is_active());
        sub.dispose();
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn test_detach_keeps_callback() {
        let removed = Rc::new(Cell::new(false));
        let flag = removed.clone();
        Subscription::new(move || flag.set(true)).detach();
        assert!(!removed.get());
    }
}
