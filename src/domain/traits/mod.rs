//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod media;
pub mod store;

pub use bot::{Acknowledgement, Bot, BotInfo};
pub use media::{MediaConnection, MediaPlayer, PlayerState, VoiceGateway};
pub use store::SessionStore;
