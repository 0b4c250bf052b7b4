//! Update scheduler
//!
//! A flat list of [`Update`] hooks polled once per host tick. The registry
//! adds services that declare the update contract when it creates them and
//! drops them again when they are removed.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use plinth::Schedule;
//!
//! let schedule = Schedule::new();
//! let ticks = Rc::new(Cell::new(0));
//! let counter = ticks.clone();
//! schedule.call("count", move || counter.set(counter.get() + 1));
//!
//! schedule.tick();
//! schedule.tick();
//! assert_eq!(ticks.get(), 2);
//! ```

pub mod task;

pub use task::{TaskEntry, Update};

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tracing::error;

use crate::error::{panic_message, LocatorError};
use task::ClosureTask;

/// The list of update hooks driven by the host tick
#[derive(Default)]
pub struct Schedule {
    tasks: RefCell<Vec<TaskEntry>>,
    ticks: Cell<u64>,
}

impl Schedule {
    /// Create a new empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an update hook; returns `false` if the same instance is already scheduled
    pub fn add(&self, name: &'static str, task: Rc<dyn Update>) -> bool {
        let entry = TaskEntry { name, task };
        let mut tasks = self.tasks.borrow_mut();
        if tasks.iter().any(|t| t.address() == entry.address()) {
            return false;
        }
        tasks.push(entry);
        true
    }

    /// Add a closure as an update hook
    pub fn call(&self, name: &'static str, f: impl Fn() + 'static) -> Rc<dyn Update> {
        let task: Rc<dyn Update> = Rc::new(ClosureTask { f });
        self.add(name, task.clone());
        task
    }

    /// Remove the entry whose hook is `task`
    pub fn remove(&self, task: &Rc<dyn Update>) -> bool {
        self.remove_address(Rc::as_ptr(task) as *const ())
    }

    /// Remove the entry whose hook lives at `address`
    pub(crate) fn remove_address(&self, address: *const ()) -> bool {
        let mut tasks = self.tasks.borrow_mut();
        let before = tasks.len();
        tasks.retain(|t| t.address() != address);
        before != tasks.len()
    }

    /// Run every hook once
    ///
    /// Iterates a snapshot: hooks added or removed during the tick take
    /// effect on the next one. A panicking hook is logged and the rest still
    /// run. Returns the number of hooks that completed.
    pub fn tick(&self) -> usize {
        let snapshot = self.tasks.borrow().clone();
        self.ticks.set(self.ticks.get() + 1);

        let mut completed = 0;
        for entry in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| entry.run())) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    let err = LocatorError::UpdateFailed {
                        name: entry.name,
                        message: panic_message(payload.as_ref()),
                    };
                    error!(task = entry.name, error = %err, "update hook failed");
                }
            }
        }
        completed
    }

    /// Names of the scheduled hooks, in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.borrow().iter().map(|t| t.name).collect()
    }

    /// Get the number of scheduled hooks
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Check if there are no scheduled hooks
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("tasks", &self.names())
            .field("ticks", &self.ticks.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CallLog;
    use pretty_assertions::assert_eq;

    struct Named(&'static str, CallLog);

    impl Update for Named {
        fn update(&self) {
            self.1.push(self.0);
        }
    }

    #[test]
    fn test_tick_runs_in_order() {
        let log = CallLog::new();
        let schedule = Schedule::new();
        schedule.add("a", Rc::new(Named("a", log.clone())));
        schedule.add("b", Rc::new(Named("b", log.clone())));

        assert_eq!(schedule.tick(), 2);
        assert_eq!(log.entries(), vec!["a", "b"]);
        assert_eq!(schedule.ticks(), 1);
    }

    #[test]
    fn test_duplicate_instance_is_rejected() {
        let schedule = Schedule::new();
        let task: Rc<dyn Update> = Rc::new(Named("a", CallLog::new()));
        assert!(schedule.add("a", task.clone()));
        assert!(!schedule.add("a", task.clone()));
        assert!(schedule.remove(&task));
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_panicking_hook_does_not_stop_tick() {
        let log = CallLog::new();
        let schedule = Schedule::new();
        schedule.call("boom", || panic!("update exploded"));
        schedule.add("after", Rc::new(Named("after", log.clone())));

        assert_eq!(schedule.tick(), 1);
        assert_eq!(log.entries(), vec!["after"]);
    }

    #[test]
    fn test_additions_during_tick_wait_for_next_tick() {
        let log = CallLog::new();
        let schedule = Rc::new(Schedule::new());
        let inner = Rc::downgrade(&schedule);
        let late_log = log.clone();
        let spawned = Cell::new(false);
        schedule.call("spawner", move || {
            if spawned.replace(true) {
                return;
            }
            if let Some(schedule) = inner.upgrade() {
                schedule.add("late", Rc::new(Named("late", late_log.clone())));
            }
        });

        schedule.tick();
        assert!(log.entries().is_empty());
        schedule.tick();
        assert_eq!(log.entries(), vec!["late"]);
        assert_eq!(schedule.names(), vec!["spawner", "late"]);
    }
}
