pub mod audio;
pub mod clock;
pub mod player;
pub mod score;

pub use audio::AudioMixer;
pub use clock::Clock;
pub use player::Player;
pub use score::{ScoreBoard, ScoreEvents, ScoreLog};
