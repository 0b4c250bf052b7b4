//! Frame clock

use plinth::{service, Injectable, ProvidesValue, Service, Update, ValueProvider};

/// Counts update ticks; other objects follow the frame through its provider
#[service(order = -10)]
#[derive(Default, Injectable)]
#[updatable]
pub struct Clock {
    frame: ValueProvider<u64>,
}

impl Clock {
    pub fn frame(&self) -> u64 {
        self.frame.get()
    }
}

impl Update for Clock {
    fn update(&self) {
        self.frame.update(|frame| frame + 1);
    }
}

impl ProvidesValue<u64> for Clock {
    fn provider(&self) -> &ValueProvider<u64> {
        &self.frame
    }
}

impl Service for Clock {}
