use std::sync::Arc;

use super::{Services, StatusService};
use crate::application::errors::BotError;
use crate::domain::entities::{Session, SessionId};

/// Service for creating and destroying sessions
pub struct SessionService {
    services: Arc<Services>,
}

impl SessionService {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Find the session of a group, creating and persisting it on first use
    pub async fn open(&self, group_id: &SessionId, channel_id: &str) -> Result<Session, BotError> {
        if let Some(session) = self.services.store.find_session(group_id).await? {
            StatusService::new(self.services.clone()).refresh(group_id, None);
            return Ok(session);
        }

        let session = Session::new(group_id.clone(), channel_id);
        self.services.store.save_session(&session).await?;
        tracing::info!(session = %group_id, channel = channel_id, "Opened session");
        StatusService::new(self.services.clone()).refresh(group_id, None);
        Ok(session)
    }

    /// Destroy a session and everything it owns.
    ///
    /// With `thread_id`, the session is only destroyed if that thread is the
    /// one it renders into. Returns whether a session was destroyed.
    pub async fn destroy(&self, group_id: &SessionId, thread_id: Option<&str>) -> Result<bool, BotError> {
        let Some(session) = self.services.store.find_session(group_id).await? else {
            return Ok(false);
        };
        if let Some(thread_id) = thread_id {
            if session.thread_id.as_deref() != Some(thread_id) {
                tracing::debug!(session = %group_id, thread = thread_id, "Ignoring deletion of a foreign thread");
                return Ok(false);
            }
        }

        self.services.store.delete_session(group_id).await?;
        self.services.resources.clear_session(group_id);
        self.services.coordinator.clear_session(group_id);
        tracing::info!(session = %group_id, "Destroyed session");
        Ok(true)
    }
}
