//! Test isolation for the installed registry
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use plinth::testing::TestLocator;
//! use plinth::Locator;
//!
//! #[derive(Default)]
//! struct FakeClock;
//!
//! {
//!     let guard = TestLocator::fake();
//!     guard.registry().register_instance(Rc::new(FakeClock));
//!     assert!(Locator::get::<FakeClock>().is_some());
//! }
//! // previous registry (none here) is back in place
//! assert!(Locator::get::<FakeClock>().is_none());
//! ```

use std::rc::Rc;

use super::global::Locator;
use super::Registry;

/// Entry point for test registries
pub struct TestLocator;

impl TestLocator {
    /// Install an empty registry until the returned guard is dropped
    pub fn fake() -> TestLocatorGuard {
        Self::with_registry(Registry::new())
    }

    /// Install `registry` until the returned guard is dropped
    pub fn with_registry(registry: Registry) -> TestLocatorGuard {
        let registry = Rc::new(registry);
        let previous = Locator::install(registry.clone());
        TestLocatorGuard { registry, previous }
    }
}

/// Restores the previously installed registry on drop
#[must_use = "the fake registry is uninstalled when the guard is dropped"]
pub struct TestLocatorGuard {
    registry: Rc<Registry>,
    previous: Option<Rc<Registry>>,
}

impl TestLocatorGuard {
    /// The registry installed by this guard
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }
}

impl Drop for TestLocatorGuard {
    fn drop(&mut self) {
        Locator::restore(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_nest() {
        let outer = TestLocator::fake();
        {
            let inner = TestLocator::fake();
            assert!(Locator::current().is_some_and(|r| Rc::ptr_eq(&r, inner.registry())));
        }
        assert!(Locator::current().is_some_and(|r| Rc::ptr_eq(&r, outer.registry())));
    }
}
