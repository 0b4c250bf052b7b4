//! Player

use plinth::{Channel, Inject, Injectable};

use super::score::ScoreEvents;
use crate::config::GameSettings;

/// A scene object; injected by the bootstrap rather than created by the registry
#[derive(Default, Injectable)]
pub struct Player {
    name: String,
    #[inject(channel, global)]
    score: Inject<Channel<dyn ScoreEvents>>,
    #[inject(global)]
    settings: Inject<GameSettings>,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Report a hit to every score listener
    pub fn hit(&self) {
        let points = self.settings.with(|s| s.points_per_hit).unwrap_or(1);
        self.score
            .with(|channel| channel.invoke(|listener| listener.scored(&self.name, points)));
    }
}
