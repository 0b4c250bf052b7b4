//! Application Bootstrap
//!
//! Runs after the configuration pass. This is where objects the registry
//! does not create itself are injected, decorators are installed and the
//! per-frame game logic is scheduled.

use std::rc::Rc;

use plinth::{Locator, Observable, Registry};
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::services::{AudioMixer, Clock, Player, ScoreBoard, ScoreEvents, ScoreLog};

/// Wire up the scene and schedule game logic
///
/// Called by `Application::start` with every eager service in place.
pub fn register(registry: &Registry) {
    let game = GameConfig::from_env();

    registry
        .bus()
        .channel::<dyn ScoreEvents>()
        .register_handler(Rc::new(ScoreLog::default()));

    match Observable::subscribe::<ScoreBoard, u32>(registry, |total| info!(total, "score changed")) {
        Some(hud) => hud.detach(),
        None => warn!("no score board, score display disabled"),
    }

    // lazy and dynamic: nothing creates it until asked
    registry.try_get::<AudioMixer>();

    let player = Rc::new(Player::new("player-one"));
    registry.inject(&player, false, true);

    let interval = game.score_interval.max(1);
    registry.schedule().call("player", move || {
        let frame = Locator::get::<Clock>().map_or(0, |clock| clock.frame());
        if frame % interval == 0 {
            player.hit();
        }
    });

    let swap_frame = game.mixer_swap_frame;
    registry.schedule().call("mixer-swap", move || {
        Locator::with(|registry| {
            let frame = registry.get::<Clock>().map_or(0, |clock| clock.frame());
            if frame != swap_frame {
                return;
            }
            let generation = registry.get::<AudioMixer>().map_or(0, |m| m.generation());
            registry.remove_instance::<AudioMixer>();
            registry.register_instance(Rc::new(AudioMixer::with_generation(generation + 1)));
            info!(frame, generation = generation + 1, "audio mixer replaced");
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsLoader;
    use plinth::{Application, LocatorConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_demo_loop_scores_and_swaps_mixer() {
        let mut runtime = Application::new()
            .config(LocatorConfig::default())
            .assets(Rc::new(SettingsLoader::new("missing-settings.json")))
            .bootstrap(register)
            .start();
        for _ in 0..40 {
            runtime.tick();
        }

        let registry = runtime.registry();
        // a hit every 10 frames at 5 points each
        assert_eq!(registry.get::<ScoreBoard>().map(|b| b.total()), Some(20));
        assert_eq!(registry.get::<AudioMixer>().map(|m| m.generation()), Some(1));
    }
}
