use async_trait::async_trait;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::domain::entities::{Item, SessionId};

/// A live voice connection owned by a session
pub trait MediaConnection: Send + Sync {
    fn channel_id(&self) -> &str;

    /// Tear the connection down. Called exactly once by the registry.
    fn disconnect(&self);
}

/// Playback state of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// A player bound to a session's connection
pub trait MediaPlayer: Send + Sync {
    fn state(&self) -> PlayerState;

    fn play(&self, item: &Item);

    fn pause(&self);

    fn resume(&self);

    /// Stop the current item but keep the player usable
    fn halt(&self);

    /// Stop playback for good. Called exactly once by the registry.
    fn stop(&self);

    fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    fn is_paused(&self) -> bool {
        self.state() == PlayerState::Paused
    }
}

/// Opens voice connections for sessions
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        session_id: &SessionId,
        channel_id: &str,
    ) -> Result<(Arc<dyn MediaConnection>, Arc<dyn MediaPlayer>), BotError>;
}
