//! Simulated voice gateway for the console adapter and tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::application::errors::BotError;
use crate::domain::entities::{Item, SessionId};
use crate::domain::traits::{MediaConnection, MediaPlayer, PlayerState, VoiceGateway};

/// Hands out connections that only log what a real one would do
#[derive(Default)]
pub struct SimulatedGateway {
    opened: AtomicUsize,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for SimulatedGateway {
    async fn connect(
        &self,
        session_id: &SessionId,
        channel_id: &str,
    ) -> Result<(Arc<dyn MediaConnection>, Arc<dyn MediaPlayer>), BotError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::info!(session = %session_id, channel = channel_id, "Opened simulated voice connection");
        let connection = SimulatedConnection {
            session_id: session_id.clone(),
            channel_id: channel_id.to_string(),
            open: AtomicBool::new(true),
        };
        Ok((Arc::new(connection), Arc::new(SimulatedPlayer::new(session_id.clone()))))
    }
}

pub struct SimulatedConnection {
    session_id: SessionId,
    channel_id: String,
    open: AtomicBool,
}

impl SimulatedConnection {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl MediaConnection for SimulatedConnection {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn disconnect(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::info!(session = %self.session_id, channel = %self.channel_id, "Closed simulated voice connection");
        }
    }
}

pub struct SimulatedPlayer {
    session_id: SessionId,
    state: Mutex<(PlayerState, Option<Item>)>,
}

impl SimulatedPlayer {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: Mutex::new((PlayerState::Idle, None)),
        }
    }

    pub fn current(&self) -> Option<Item> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1.clone()
    }

    fn set(&self, state: PlayerState, item: Option<Item>) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.0 = state;
        if state == PlayerState::Idle || item.is_some() {
            guard.1 = item;
        }
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn state(&self) -> PlayerState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn play(&self, item: &Item) {
        tracing::info!(session = %self.session_id, item = %item, "Playing");
        self.set(PlayerState::Playing, Some(item.clone()));
    }

    fn pause(&self) {
        if self.state() == PlayerState::Playing {
            self.set(PlayerState::Paused, None);
        }
    }

    fn resume(&self) {
        if self.state() == PlayerState::Paused {
            self.set(PlayerState::Playing, None);
        }
    }

    fn halt(&self) {
        self.set(PlayerState::Idle, None);
    }

    fn stop(&self) {
        tracing::debug!(session = %self.session_id, "Player stopped");
        self.set(PlayerState::Idle, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_hands_out_idle_player() {
        let gateway = SimulatedGateway::new();
        let (connection, player) = gateway.connect(&SessionId::new("guild"), "voice").await.unwrap();

        assert_eq!(gateway.opened(), 1);
        assert_eq!(connection.channel_id(), "voice");
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn test_player_transitions() {
        let player = SimulatedPlayer::new(SessionId::new("guild"));
        player.pause();
        assert_eq!(player.state(), PlayerState::Idle);

        player.play(&Item::new("song"));
        player.pause();
        assert!(player.is_paused());
        assert_eq!(player.current(), Some(Item::new("song")));

        player.resume();
        assert!(player.is_playing());

        player.halt();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.current(), None);
    }
}
