//! Scoring

use std::rc::Rc;

use plinth::{
    service, Handler, Inject, Injectable, Next, ProvidesValue, Service, ValueProvider,
};
use tracing::{debug, info};

use crate::config::GameSettings;

/// Score notifications, dispatched through the event bus
pub trait ScoreEvents {
    fn scored(&self, player: &str, points: u32);
}

/// Running total of every score event
#[service]
#[derive(Default, Injectable)]
#[listens(dyn ScoreEvents)]
pub struct ScoreBoard {
    #[inject]
    settings: Inject<GameSettings>,
    total: ValueProvider<u32>,
}

impl ScoreBoard {
    pub fn total(&self) -> u32 {
        self.total.get()
    }
}

impl ScoreEvents for ScoreBoard {
    fn scored(&self, player: &str, points: u32) {
        self.total.update(|total| total + points);
        let target = self.settings.with(|s| s.target_score).unwrap_or(u32::MAX);
        if self.total() >= target {
            info!(player, total = self.total(), target, "target score reached");
        }
    }
}

impl ProvidesValue<u32> for ScoreBoard {
    fn provider(&self) -> &ValueProvider<u32> {
        &self.total
    }
}

impl Service for ScoreBoard {}

/// Decorator logging every score event before listeners see it
#[derive(Default)]
pub struct ScoreLog {
    next: Next<dyn ScoreEvents>,
}

impl ScoreEvents for ScoreLog {
    fn scored(&self, player: &str, points: u32) {
        debug!(player, points, "score event");
        if let Some(next) = self.next.get() {
            next.scored(player, points);
        }
    }
}

impl Handler<dyn ScoreEvents> for ScoreLog {
    fn next(&self) -> &Next<dyn ScoreEvents> {
        &self.next
    }

    fn as_listener(self: Rc<Self>) -> Rc<dyn ScoreEvents> {
        self
    }
}
