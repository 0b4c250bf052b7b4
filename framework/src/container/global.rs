//! Process-wide registry access
//!
//! Code that cannot be handed a `&Registry` (constructors, trait impls on
//! host types) reaches the installed registry through [`Locator`]. The slot
//! is thread-local; the registry is single-threaded anyway.

use std::cell::RefCell;
use std::rc::Rc;

use super::Registry;
use crate::error::LocatorError;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Registry>>> = const { RefCell::new(None) };
}

/// Facade over the installed [`Registry`]
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use plinth::{Locator, Registry};
///
/// #[derive(Default)]
/// struct Score(u32);
///
/// let previous = Locator::install(Rc::new(Registry::new()));
/// assert!(previous.is_none());
///
/// Locator::with(|registry| registry.register_instance(Rc::new(Score(3))));
/// assert_eq!(Locator::get::<Score>().map(|s| s.0), Some(3));
///
/// Locator::uninstall();
/// assert!(Locator::current().is_none());
/// ```
pub struct Locator;

impl Locator {
    /// Make `registry` the current one, returning whatever was installed before
    pub fn install(registry: Rc<Registry>) -> Option<Rc<Registry>> {
        CURRENT.with(|slot| slot.borrow_mut().replace(registry))
    }

    /// Remove the current registry
    pub fn uninstall() -> Option<Rc<Registry>> {
        CURRENT.with(|slot| slot.borrow_mut().take())
    }

    /// Put `previous` back (or clear the slot when `None`)
    pub fn restore(previous: Option<Rc<Registry>>) {
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }

    /// The installed registry
    pub fn current() -> Option<Rc<Registry>> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Whether a registry is installed
    pub fn is_installed() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Run `f` against the installed registry
    ///
    /// The slot is not borrowed while `f` runs, so `f` may install or
    /// uninstall registries itself.
    pub fn with<R>(f: impl FnOnce(&Registry) -> R) -> Option<R> {
        let registry = Self::current()?;
        Some(f(&registry))
    }

    /// [`Registry::get`] on the installed registry
    pub fn get<T: 'static>() -> Option<Rc<T>> {
        Self::with(|registry| registry.get::<T>()).flatten()
    }

    /// [`Registry::try_get`] on the installed registry
    pub fn try_get<T: 'static>() -> Option<Rc<T>> {
        Self::with(|registry| registry.try_get::<T>()).flatten()
    }

    /// [`Registry::resolve`] on the installed registry
    pub fn resolve<T: 'static>() -> Result<Rc<T>, LocatorError> {
        Self::with(|registry| registry.resolve::<T>())
            .unwrap_or_else(|| Err(LocatorError::not_registered::<T>()))
    }
}
