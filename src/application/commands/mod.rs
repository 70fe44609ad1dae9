//! Command catalog - the fixed set of user-triggerable commands

pub mod editing;
pub mod help;
pub mod paging;
pub mod playback;
pub mod toggles;

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::application::coordination::{ExecutionGuard, ExecutionHandoff, SessionResourceRegistry};
use crate::application::errors::CommandError;
use crate::application::services::{RenderView, Services, StatusService};
use crate::domain::entities::{CommandKind, Control, Interaction, Session, SessionId};
use crate::domain::traits::{Acknowledgement, MediaPlayer};

/// Result of a command body: how to answer the triggering interaction
pub type CommandResult = Result<Acknowledgement, CommandError>;

/// A class of user-triggerable action
#[async_trait]
pub trait Command: Send + Sync {
    fn kind(&self) -> CommandKind;

    fn description(&self) -> &'static str;

    /// Stateless commands skip coordination and debouncing entirely
    fn always_execute(&self) -> bool {
        false
    }

    /// Debounce of this command when the configuration has no override
    fn debounce(&self) -> Option<Duration> {
        None
    }

    /// The control rendered on the status message, if visible in this state
    fn control(&self, _view: &RenderView<'_>) -> Option<Control> {
        None
    }

    /// The control an incoming click is matched against.
    ///
    /// Defaults to [`control`](Self::control); commands whose button may
    /// disappear between render and click override this.
    fn match_control(&self, view: &RenderView<'_>) -> Option<Control> {
        self.control(view)
    }

    async fn execute(&self, ctx: &CommandContext, interaction: &Interaction) -> CommandResult;

    /// Handle a selection on this command's dropdown
    async fn execute_selection(&self, _ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        Err(CommandError::NotFound(format!("{} has no dropdown", self.kind())))
    }
}

/// Ordered, process-wide registry of commands
pub struct CommandCatalog {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self { commands: Vec::new() }
    }

    /// Every built-in command in render order
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(playback::Join);
        catalog.register(paging::PageBackward);
        catalog.register(paging::PageForward);
        catalog.register(toggles::Loop);
        catalog.register(toggles::LoopQueue);
        catalog.register(playback::Pause);
        catalog.register(playback::Replay);
        catalog.register(playback::Skip);
        catalog.register(playback::Stop);
        catalog.register(toggles::Edit);
        catalog.register(editing::Shuffle);
        catalog.register(editing::Forward);
        catalog.register(editing::Clear);
        catalog.register(toggles::Expand);
        catalog.register(editing::Resend);
        catalog.register(editing::Remove);
        catalog.register(playback::Play);
        catalog.register(help::Help);
        catalog
    }

    /// Register a command; a command of the same kind is replaced in place
    pub fn register<C: Command + 'static>(&mut self, command: C) {
        let command: Arc<dyn Command> = Arc::new(command);
        match self.commands.iter_mut().find(|c| c.kind() == command.kind()) {
            Some(slot) => *slot = command,
            None => self.commands.push(command),
        }
    }

    pub fn get(&self, kind: CommandKind) -> Option<&Arc<dyn Command>> {
        self.commands.iter().find(|c| c.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// What a command body may touch while it runs
pub struct CommandContext {
    pub session_id: SessionId,
    pub kind: CommandKind,
    services: Arc<Services>,
    guard: Mutex<Option<ExecutionGuard>>,
    body_outcome: Mutex<Option<oneshot::Sender<bool>>>,
}

impl CommandContext {
    pub fn new(services: Arc<Services>, kind: CommandKind, session_id: SessionId, guard: Option<ExecutionGuard>) -> Self {
        Self {
            session_id,
            kind,
            services,
            guard: Mutex::new(guard),
            body_outcome: Mutex::new(None),
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn resources(&self) -> &SessionResourceRegistry {
        &self.services.resources
    }

    pub fn player(&self) -> Option<Arc<dyn MediaPlayer>> {
        self.services.resources.player(&self.session_id)
    }

    pub fn items_per_page(&self) -> usize {
        self.services.settings.items_per_page
    }

    pub async fn load_session(&self) -> Result<Session, CommandError> {
        self.services
            .store
            .find_session(&self.session_id)
            .await?
            .ok_or_else(|| CommandError::SessionGone(self.session_id.to_string()))
    }

    pub async fn save_session(&self, session: &Session) -> Result<(), CommandError> {
        self.services.store.save_session(session).await?;
        Ok(())
    }

    /// Queue a status refresh.
    ///
    /// The first refresh of a coordinated command also takes over its
    /// execution window: deferred clicks are acknowledged once the refresh
    /// landed and the body returned. A body that fails after this call still
    /// fails them.
    pub fn refresh_status(&self) {
        let handoff = self.take_guard().map(|guard| {
            let (handoff, outcome) = ExecutionHandoff::new(guard);
            *self.body_outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
            handoff
        });
        StatusService::new(self.services.clone()).refresh(&self.session_id, handoff);
    }

    /// Run `task` once `delay` elapsed, detached from this execution
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.services.spawn_after(delay, task);
    }

    pub(crate) fn take_guard(&self) -> Option<ExecutionGuard> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Tell a refresh holding the execution window how the body ended
    pub(crate) fn report_outcome(&self, succeeded: bool) {
        let outcome = self.body_outcome.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(outcome) = outcome {
            let _ = outcome.send(succeeded);
        }
    }
}

/// Save `session` and queue a refresh; the common tail of mutating commands
pub(crate) async fn persist_and_refresh(ctx: &CommandContext, session: &Session) -> Result<(), CommandError> {
    ctx.save_session(session).await?;
    ctx.refresh_status();
    Ok(())
}
