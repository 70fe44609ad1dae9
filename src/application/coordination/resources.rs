//! Per-session shared resources: voice connection, player, refresh flag

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::entities::SessionId;
use crate::domain::traits::{MediaConnection, MediaPlayer};

/// Resource slots held per session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Connection,
    Player,
}

#[derive(Default)]
struct SessionResources {
    connection: Option<Arc<dyn MediaConnection>>,
    player: Option<Arc<dyn MediaPlayer>>,
    already_refreshed: bool,
}

impl SessionResources {
    fn is_empty(&self) -> bool {
        self.connection.is_none() && self.player.is_none() && !self.already_refreshed
    }
}

/// Sole owner of per-session resource handles.
///
/// Handles returned by the getters are borrowed for the duration of a
/// command; replacing or clearing a slot tears the old resource down, so a
/// lookup after a clear never yields a live handle.
#[derive(Default)]
pub struct SessionResourceRegistry {
    sessions: Mutex<HashMap<SessionId, SessionResources>>,
}

enum Teardown {
    Connection(Arc<dyn MediaConnection>),
    Player(Arc<dyn MediaPlayer>),
}

impl Teardown {
    fn run(self, session_id: &SessionId) {
        match self {
            Teardown::Connection(connection) => {
                tracing::info!(session = %session_id, channel = connection.channel_id(), "Disconnecting voice connection");
                connection.disconnect();
            }
            Teardown::Player(player) => {
                tracing::debug!(session = %session_id, "Stopping player");
                player.stop();
            }
        }
    }
}

impl SessionResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionResources>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection(&self, session_id: &SessionId) -> Option<Arc<dyn MediaConnection>> {
        self.lock().get(session_id).and_then(|r| r.connection.clone())
    }

    pub fn player(&self, session_id: &SessionId) -> Option<Arc<dyn MediaPlayer>> {
        self.lock().get(session_id).and_then(|r| r.player.clone())
    }

    pub fn has(&self, session_id: &SessionId, kind: ResourceKind) -> bool {
        self.lock()
            .get(session_id)
            .map(|r| match kind {
                ResourceKind::Connection => r.connection.is_some(),
                ResourceKind::Player => r.player.is_some(),
            })
            .unwrap_or(false)
    }

    /// Store a connection, or clear the slot with `None`.
    ///
    /// Any connection previously held is disconnected.
    pub fn set_connection(&self, session_id: &SessionId, connection: Option<Arc<dyn MediaConnection>>) {
        let previous = self.update(session_id, |r| std::mem::replace(&mut r.connection, connection));
        if let Some(previous) = previous {
            Teardown::Connection(previous).run(session_id);
        }
    }

    /// Store a player, or clear the slot with `None`.
    ///
    /// Any player previously held is stopped.
    pub fn set_player(&self, session_id: &SessionId, player: Option<Arc<dyn MediaPlayer>>) {
        let previous = self.update(session_id, |r| std::mem::replace(&mut r.player, player));
        if let Some(previous) = previous {
            Teardown::Player(previous).run(session_id);
        }
    }

    pub fn clear(&self, session_id: &SessionId, kind: ResourceKind) {
        match kind {
            ResourceKind::Connection => self.set_connection(session_id, None),
            ResourceKind::Player => self.set_player(session_id, None),
        }
    }

    pub fn already_refreshed(&self, session_id: &SessionId) -> bool {
        self.lock()
            .get(session_id)
            .map(|r| r.already_refreshed)
            .unwrap_or(false)
    }

    pub fn set_already_refreshed(&self, session_id: &SessionId, value: bool) {
        self.update(session_id, |r| r.already_refreshed = value);
    }

    /// Tear down everything held for a session and forget it
    pub fn clear_session(&self, session_id: &SessionId) {
        let removed = self.lock().remove(session_id);
        let Some(resources) = removed else {
            return;
        };
        if let Some(player) = resources.player {
            Teardown::Player(player).run(session_id);
        }
        if let Some(connection) = resources.connection {
            Teardown::Connection(connection).run(session_id);
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    fn update<R>(&self, session_id: &SessionId, f: impl FnOnce(&mut SessionResources) -> R) -> R {
        let mut sessions = self.lock();
        let resources = sessions.entry(session_id.clone()).or_default();
        let result = f(resources);
        if resources.is_empty() {
            sessions.remove(session_id);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Item;
    use crate::domain::traits::PlayerState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingConnection {
        disconnects: AtomicUsize,
    }

    impl MediaConnection for CountingConnection {
        fn channel_id(&self) -> &str {
            "voice"
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingPlayer {
        stops: AtomicUsize,
    }

    impl MediaPlayer for CountingPlayer {
        fn state(&self) -> PlayerState {
            PlayerState::Idle
        }
        fn play(&self, _item: &Item) {}
        fn pause(&self) {}
        fn resume(&self) {}
        fn halt(&self) {}
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_clearing_connection_disconnects_once() {
        let registry = SessionResourceRegistry::new();
        let session = SessionId::new("guild");
        let connection = Arc::new(CountingConnection::default());

        registry.set_connection(&session, Some(connection.clone()));
        assert!(registry.has(&session, ResourceKind::Connection));

        registry.clear(&session, ResourceKind::Connection);
        registry.clear(&session, ResourceKind::Connection);

        assert_eq!(connection.disconnects.load(Ordering::SeqCst), 1);
        assert!(registry.connection(&session).is_none());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_replacing_player_stops_previous() {
        let registry = SessionResourceRegistry::new();
        let session = SessionId::new("guild");
        let first = Arc::new(CountingPlayer::default());
        let second = Arc::new(CountingPlayer::default());

        registry.set_player(&session, Some(first.clone()));
        registry.set_player(&session, Some(second.clone()));

        assert_eq!(first.stops.load(Ordering::SeqCst), 1);
        assert_eq!(second.stops.load(Ordering::SeqCst), 0);
        assert!(registry.player(&session).is_some());
    }

    #[test]
    fn test_clear_session_tears_down_everything() {
        let registry = SessionResourceRegistry::new();
        let session = SessionId::new("guild");
        let connection = Arc::new(CountingConnection::default());
        let player = Arc::new(CountingPlayer::default());

        registry.set_connection(&session, Some(connection.clone()));
        registry.set_player(&session, Some(player.clone()));
        registry.set_already_refreshed(&session, true);

        registry.clear_session(&session);

        assert_eq!(connection.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(player.stops.load(Ordering::SeqCst), 1);
        assert!(!registry.already_refreshed(&session));
        assert!(!registry.has(&session, ResourceKind::Player));
    }

    #[test]
    fn test_refresh_flag_defaults_to_false() {
        let registry = SessionResourceRegistry::new();
        let session = SessionId::new("guild");
        assert!(!registry.already_refreshed(&session));
        registry.set_already_refreshed(&session, true);
        assert!(registry.already_refreshed(&session));
        registry.set_already_refreshed(&session, false);
        assert_eq!(registry.session_count(), 0);
    }
}
