//! Application services - Shared collaborators and session orchestration

pub mod session_service;
pub mod status_service;

pub use session_service::SessionService;
pub use status_service::{StatusService, STATUS_QUEUE};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::application::commands::{Command, CommandCatalog};
use crate::application::coordination::{CommandDeferCoordinator, KeyedAsyncQueue, SessionResourceRegistry};
use crate::domain::entities::{CommandKind, Interaction, Session, DEFAULT_ITEMS_PER_PAGE};
use crate::domain::traits::{Acknowledgement, Bot, PlayerState, SessionStore, VoiceGateway};

/// Timing and paging knobs of the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub items_per_page: usize,
    /// Debounce applied to coordinated commands without an override
    pub default_debounce: Duration,
    pub debounce_overrides: HashMap<CommandKind, Duration>,
    /// Extra delay before flushing acknowledgements of a command that did
    /// not refresh the status message
    pub flush_delay: Duration,
    /// How long a stop/clear request waits for its confirming click
    pub confirm_window: Duration,
    pub shutdown_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            default_debounce: Duration::from_millis(250),
            debounce_overrides: HashMap::new(),
            flush_delay: Duration::from_millis(100),
            confirm_window: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl EngineSettings {
    /// Delay between a trigger and the execution of `command`
    pub fn debounce_for(&self, command: &dyn Command) -> Duration {
        if command.always_execute() {
            return Duration::ZERO;
        }
        self.debounce_overrides
            .get(&command.kind())
            .copied()
            .or_else(|| command.debounce())
            .unwrap_or(self.default_debounce)
    }
}

/// Read-only picture of a session that controls render against
pub struct RenderView<'a> {
    pub session: &'a Session,
    pub connected: bool,
    pub player: Option<PlayerState>,
    pub items_per_page: usize,
}

impl RenderView<'_> {
    pub fn is_paused(&self) -> bool {
        self.player == Some(PlayerState::Paused)
    }
}

/// Process-lifetime collaborators shared by the dispatcher, services and commands
pub struct Services {
    pub store: Arc<dyn SessionStore>,
    pub bot: Arc<dyn Bot>,
    pub voice: Arc<dyn VoiceGateway>,
    pub catalog: Arc<CommandCatalog>,
    pub resources: SessionResourceRegistry,
    pub coordinator: Arc<CommandDeferCoordinator>,
    pub queue: KeyedAsyncQueue,
    pub settings: EngineSettings,
    tasks: TaskTracker,
}

impl Services {
    pub fn new(
        store: Arc<dyn SessionStore>,
        bot: Arc<dyn Bot>,
        voice: Arc<dyn VoiceGateway>,
        catalog: CommandCatalog,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            bot,
            voice,
            catalog: Arc::new(catalog),
            resources: SessionResourceRegistry::new(),
            coordinator: Arc::new(CommandDeferCoordinator::new()),
            queue: KeyedAsyncQueue::new(),
            settings,
            tasks: TaskTracker::new(),
        }
    }

    pub fn view<'a>(&self, session: &'a Session) -> RenderView<'a> {
        RenderView {
            session,
            connected: self.resources.connection(&session.session_id).is_some(),
            player: self.resources.player(&session.session_id).map(|p| p.state()),
            items_per_page: self.settings.items_per_page,
        }
    }

    /// Answer an interaction; failures are logged, never propagated
    pub async fn acknowledge(&self, interaction: &Interaction, ack: Acknowledgement) {
        if let Err(e) = self.bot.acknowledge(interaction, ack).await {
            tracing::warn!(interaction = %interaction.id, "Failed to acknowledge interaction: {}", e);
        }
    }

    /// Run `task` in the background, tracked for shutdown
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Run `task` after `delay`.
    ///
    /// The timer cannot be cancelled; shutdown waits for it at most
    /// `shutdown_grace`.
    pub fn spawn_after<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
    }

    /// Wait until no background task, timer or queue drain is left
    pub async fn wait_idle(&self) {
        loop {
            self.tasks.close();
            self.tasks.wait().await;
            self.tasks.reopen();
            self.queue.wait_idle().await;
            if self.tasks.is_empty() && self.queue.is_empty() {
                break;
            }
        }
    }

    /// Give outstanding work `shutdown_grace` to finish
    pub async fn shutdown(&self) {
        let grace = self.settings.shutdown_grace;
        tracing::info!(outstanding = self.tasks.len(), "Waiting for outstanding tasks");
        if tokio::time::timeout(grace, self.wait_idle()).await.is_err() {
            tracing::warn!(?grace, "Shutdown grace period elapsed with tasks still running");
        }
    }
}
