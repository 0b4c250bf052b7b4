//! Update contract and schedule entry types

use std::rc::Rc;

/// Per-frame hook of a scheduled instance
///
/// Services declare it with `Declaration::updatable` (or `#[updatable]` on
/// the derive) and are added to the registry's [`Schedule`](super::Schedule)
/// when the registry creates them.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use plinth::Update;
///
/// #[derive(Default)]
/// pub struct FrameCounter {
///     frames: Cell<u64>,
/// }
///
/// impl Update for FrameCounter {
///     fn update(&self) {
///         self.frames.set(self.frames.get() + 1);
///     }
/// }
/// ```
pub trait Update {
    /// Advance one tick
    fn update(&self);
}

/// Closure-based update hook
pub(crate) struct ClosureTask<F: Fn()> {
    pub(crate) f: F,
}

impl<F: Fn()> Update for ClosureTask<F> {
    fn update(&self) {
        (self.f)()
    }
}

/// A registered entry in the schedule
#[derive(Clone)]
pub struct TaskEntry {
    /// Name for logging, the service type name for registry-created entries
    pub name: &'static str,
    /// The update hook
    pub task: Rc<dyn Update>,
}

impl TaskEntry {
    /// Run the hook once
    pub fn run(&self) {
        self.task.update();
    }

    pub(crate) fn address(&self) -> *const () {
        Rc::as_ptr(&self.task) as *const ()
    }
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry").field("name", &self.name).finish()
    }
}
