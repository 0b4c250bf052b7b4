//! Audio

use std::cell::Cell;

use plinth::{service, Inject, Injectable, Service};
use tracing::{debug, info, warn};

use super::score::ScoreEvents;
use crate::config::GameSettings;

/// Replaceable at runtime; the jukebox follows whichever mixer is current
#[service(dynamic, lazy)]
#[derive(Default, Injectable)]
pub struct AudioMixer {
    generation: Cell<u32>,
    played: Cell<u32>,
}

impl AudioMixer {
    pub fn with_generation(generation: u32) -> Self {
        Self {
            generation: Cell::new(generation),
            played: Cell::new(0),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation.get()
    }

    pub fn play(&self, cue: &str, volume: f32) {
        self.played.set(self.played.get() + 1);
        debug!(
            cue,
            volume,
            generation = self.generation(),
            played = self.played.get(),
            "playing cue"
        );
    }
}

impl Service for AudioMixer {}

/// Plays a cue for every score event
#[service(order = 5)]
#[derive(Default, Injectable)]
#[listens(dyn ScoreEvents)]
pub struct Jukebox {
    #[inject(on_injected = mixer_changed)]
    mixer: Inject<AudioMixer>,
    #[inject]
    settings: Inject<GameSettings>,
}

impl Jukebox {
    fn mixer_changed(&self) {
        match self.mixer.get() {
            Some(mixer) => info!(generation = mixer.generation(), "jukebox attached to mixer"),
            None => warn!("jukebox lost its mixer"),
        }
    }
}

impl ScoreEvents for Jukebox {
    fn scored(&self, _player: &str, _points: u32) {
        let volume = self.settings.with(|s| s.volume).unwrap_or(1.0);
        self.mixer.with(|mixer| mixer.play("score", volume));
    }
}

impl Service for Jukebox {}
