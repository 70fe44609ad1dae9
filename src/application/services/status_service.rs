use std::sync::Arc;

use super::Services;
use crate::application::coordination::ExecutionHandoff;
use crate::application::errors::BotError;
use crate::domain::entities::{Control, Session, SessionId};

/// Queue name under which status refreshes of one session are serialized
pub const STATUS_QUEUE: &str = "status";

/// Buttons per control row
const ROW_WIDTH: usize = 5;

/// Service for re-rendering a session's status message
pub struct StatusService {
    services: Arc<Services>,
}

impl StatusService {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Queue a status refresh for the session.
    ///
    /// Refreshes for one session never reorder. With a `handoff`, the
    /// execution it owns is closed once the refresh went out (or failed) and
    /// the command body returned, so acknowledgements waiting on that command
    /// are flushed only after the user can see the result.
    pub fn refresh(&self, session_id: &SessionId, handoff: Option<ExecutionHandoff>) {
        let services = self.services.clone();
        let id = session_id.clone();
        self.services.queue.enqueue(STATUS_QUEUE, session_id.as_str(), async move {
            let result = push_status(&services, &id).await;
            if let Some(handoff) = handoff {
                handoff.finish(result.is_ok()).await;
            }
            result
        });
    }

    /// Refresh every stored session not refreshed since the last restart
    pub async fn reconcile(&self) -> Result<usize, BotError> {
        let sessions = self.services.store.list_sessions().await?;
        let mut refreshed = 0;
        for session in sessions {
            let id = &session.session_id;
            if self.services.resources.already_refreshed(id) {
                continue;
            }
            self.services.resources.set_already_refreshed(id, true);
            self.refresh(id, None);
            refreshed += 1;
        }
        tracing::info!(refreshed, "Reconciled stored sessions");
        Ok(refreshed)
    }

    /// Render the catalog's controls against the session's current state
    pub fn render_rows(&self, session: &Session) -> Vec<Vec<Control>> {
        render_rows(&self.services, session)
    }
}

async fn push_status(services: &Services, session_id: &SessionId) -> Result<(), BotError> {
    let Some(session) = services.store.find_session(session_id).await? else {
        tracing::debug!(session = %session_id, "Skipping status refresh of a closed session");
        return Ok(());
    };
    let rows = render_rows(services, &session);
    let message_id = services.bot.update_status(&session, rows).await?;
    if session.message_id.as_deref() == Some(message_id.as_str()) {
        return Ok(());
    }
    remember_status_message(services, session_id, message_id).await
}

/// Record a newly posted status message and the thread opened on it
async fn remember_status_message(
    services: &Services,
    session_id: &SessionId,
    message_id: String,
) -> Result<(), BotError> {
    // Re-read so a save made while rendering is kept
    let Some(mut session) = services.store.find_session(session_id).await? else {
        return Ok(());
    };
    tracing::debug!(session = %session_id, message = %message_id, "Status message posted");
    session.thread_id = Some(message_id.clone());
    session.message_id = Some(message_id);
    services.store.save_session(&session).await?;
    Ok(())
}

fn render_rows(services: &Services, session: &Session) -> Vec<Vec<Control>> {
    let view = services.view(session);
    let (menus, buttons): (Vec<Control>, Vec<Control>) = services
        .catalog
        .iter()
        .filter_map(|command| command.control(&view))
        .partition(Control::is_menu);

    let mut rows: Vec<Vec<Control>> = buttons.chunks(ROW_WIDTH).map(<[Control]>::to_vec).collect();
    rows.extend(menus.into_iter().map(|menu| vec![menu]));
    rows
}
