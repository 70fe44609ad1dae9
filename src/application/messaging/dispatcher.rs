//! Interaction dispatcher - routes platform events to commands
//!
//! Every event runs the guard chain, resolves its session, then resolves the
//! command whose rendered control matches what the user clicked. Commands
//! that are not stateless go through the [`CommandDeferCoordinator`]: the
//! first trigger of a (kind, session) executes after the kind's debounce
//! delay, later triggers are acknowledged once that execution finished.
//!
//! [`CommandDeferCoordinator`]: crate::application::coordination::CommandDeferCoordinator

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::middleware::{Context, Middleware, Next};
use crate::application::commands::{Command, CommandContext, CommandResult};
use crate::application::coordination::{panic_message, AckOutcome, Admission, ExecutionGuard, PendingAck};
use crate::application::errors::CommandError;
use crate::application::services::{Services, SessionService, StatusService};
use crate::domain::entities::{CommandKind, Control, Interaction, InteractionKind, PlatformEvent, Session};
use crate::domain::traits::Acknowledgement;

/// Slash invocation that opens a session for its group
pub const START_COMMAND: &str = "start";

/// Queue name under which deferred acknowledgements of one session are sent
pub const ACK_QUEUE: &str = "ack";

const FAILURE_TEXT: &str = "Something went wrong, please try again.";

/// Why an event did not reach a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Stopped by the guard chain
    Rejected,
    NoSession,
    NoMatch,
    StoreUnavailable,
}

/// What the dispatcher did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dropped(DropReason),
    /// A stateless command or dropdown selection is running
    Executing(CommandKind),
    /// The trigger opened an execution that starts after `delay`
    Scheduled { kind: CommandKind, delay: Duration },
    /// An execution of the same kind is in flight; the trigger waits for it
    Deferred(CommandKind),
    Opened,
    Destroyed,
    Reconciled(usize),
}

/// How a resolved command is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Click,
    Selection,
}

pub struct InteractionDispatcher {
    services: Arc<Services>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl InteractionDispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            middleware: Vec::new(),
        }
    }

    /// Add middleware to the guard chain
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn with_chain(mut self, chain: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware.extend(chain);
        self
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Handle events in arrival order until the sender side closes
    pub async fn run(&self, mut events: mpsc::Receiver<PlatformEvent>) {
        while let Some(event) = events.recv().await {
            let outcome = self.handle_event(event).await;
            tracing::trace!(?outcome, "Event handled");
        }
        tracing::info!("Event stream closed");
        self.shutdown().await;
    }

    pub async fn handle_event(&self, event: PlatformEvent) -> DispatchOutcome {
        match event {
            PlatformEvent::Ready => match StatusService::new(self.services.clone()).reconcile().await {
                Ok(count) => DispatchOutcome::Reconciled(count),
                Err(e) => {
                    tracing::warn!("Startup reconciliation failed: {}", e);
                    DispatchOutcome::Dropped(DropReason::StoreUnavailable)
                }
            },
            PlatformEvent::Interaction(interaction) => self.dispatch(interaction).await,
            PlatformEvent::ThreadDeleted { group_id, thread_id } => {
                let sessions = SessionService::new(self.services.clone());
                match sessions.destroy(&group_id, Some(&thread_id)).await {
                    Ok(true) => DispatchOutcome::Destroyed,
                    Ok(false) => DispatchOutcome::Dropped(DropReason::NoSession),
                    Err(e) => {
                        tracing::warn!(session = %group_id, "Could not destroy session: {}", e);
                        DispatchOutcome::Dropped(DropReason::StoreUnavailable)
                    }
                }
            }
        }
    }

    pub async fn dispatch(&self, interaction: Interaction) -> DispatchOutcome {
        let interaction = match Next::new(self.middleware.clone()).run(Context::new(interaction.clone())) {
            Ok(ctx) => ctx.interaction,
            Err(e) => {
                if let Some(reply) = e.user_message() {
                    self.services
                        .acknowledge(&interaction, Acknowledgement::ephemeral(reply))
                        .await;
                }
                return DispatchOutcome::Dropped(DropReason::Rejected);
            }
        };

        if matches!(&interaction.kind, InteractionKind::Slash { name } if name == START_COMMAND) {
            return self.open_session(&interaction).await;
        }

        let session = match self.services.store.find_session(&interaction.group_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!(session = %interaction.group_id, "No session for interaction");
                return DispatchOutcome::Dropped(DropReason::NoSession);
            }
            Err(e) => {
                tracing::warn!(session = %interaction.group_id, "Session lookup failed: {}", e);
                self.services
                    .acknowledge(&interaction, Acknowledgement::failure(FAILURE_TEXT))
                    .await;
                return DispatchOutcome::Dropped(DropReason::StoreUnavailable);
            }
        };

        let Some((command, route)) = self.resolve(&session, &interaction) else {
            tracing::debug!(
                session = %interaction.group_id,
                label = interaction.label().unwrap_or("-"),
                "No command matches interaction"
            );
            return DispatchOutcome::Dropped(DropReason::NoMatch);
        };
        let kind = command.kind();

        if route == Route::Selection || command.always_execute() {
            let services = self.services.clone();
            self.services.spawn(run_direct(services, command, interaction, route));
            return DispatchOutcome::Executing(kind);
        }

        self.coordinate(command, interaction)
    }

    /// Find the command an interaction targets, walking the catalog in order
    fn resolve(&self, session: &Session, interaction: &Interaction) -> Option<(Arc<dyn Command>, Route)> {
        let catalog = &self.services.catalog;
        match &interaction.kind {
            InteractionKind::Button => {
                let label = interaction.label()?;
                let view = self.services.view(session);
                catalog
                    .iter()
                    .find(|command| {
                        command
                            .match_control(&view)
                            .is_some_and(|control| !control.is_menu() && control.label == label)
                    })
                    .map(|command| (command.clone(), Route::Click))
            }
            InteractionKind::SelectMenu => {
                let kind = Control::kind_of(&interaction.component.custom_id)?;
                catalog.get(kind).map(|command| (command.clone(), Route::Selection))
            }
            InteractionKind::Slash { name } => {
                let kind: CommandKind = name.parse().ok()?;
                catalog.get(kind).map(|command| (command.clone(), Route::Click))
            }
        }
    }

    fn coordinate(&self, command: Arc<dyn Command>, interaction: Interaction) -> DispatchOutcome {
        let kind = command.kind();
        let session_id = interaction.group_id.clone();
        let ack = deferred_ack(&self.services, interaction.clone());

        match self.services.coordinator.begin_or_defer(kind, &session_id, ack) {
            Admission::Deferred => {
                tracing::debug!(command = %kind, session = %session_id, "Deferred trigger behind running execution");
                DispatchOutcome::Deferred(kind)
            }
            Admission::Began { generation } => {
                let delay = self.services.settings.debounce_for(command.as_ref());
                let guard =
                    ExecutionGuard::new(self.services.coordinator.clone(), kind, session_id.clone(), generation);
                tracing::debug!(command = %kind, session = %session_id, ?delay, "Scheduled execution");
                let services = self.services.clone();
                self.services
                    .spawn(run_coordinated(services, command, interaction, guard, delay));
                DispatchOutcome::Scheduled { kind, delay }
            }
        }
    }

    async fn open_session(&self, interaction: &Interaction) -> DispatchOutcome {
        let channel_id = interaction
            .channel_id
            .clone()
            .unwrap_or_else(|| interaction.group_id.to_string());
        match SessionService::new(self.services.clone())
            .open(&interaction.group_id, &channel_id)
            .await
        {
            Ok(_) => {
                self.services
                    .acknowledge(interaction, Acknowledgement::ephemeral("Session ready."))
                    .await;
                DispatchOutcome::Opened
            }
            Err(e) => {
                tracing::warn!(session = %interaction.group_id, "Could not open session: {}", e);
                self.services
                    .acknowledge(interaction, Acknowledgement::failure(FAILURE_TEXT))
                    .await;
                DispatchOutcome::Dropped(DropReason::StoreUnavailable)
            }
        }
    }

    /// Wait until every scheduled execution, timer and queued task finished
    pub async fn wait_idle(&self) {
        self.services.wait_idle().await;
    }

    pub async fn shutdown(&self) {
        self.services.shutdown().await;
    }
}

/// Acknowledgement of a trigger captured behind a running execution.
///
/// Sent through the session's ack queue so deferred triggers are answered in
/// arrival order.
fn deferred_ack(services: &Services, interaction: Interaction) -> PendingAck {
    let queue = services.queue.clone();
    let bot = services.bot.clone();
    Box::new(move |outcome| {
        let ack = match outcome {
            AckOutcome::Completed => Acknowledgement::Update,
            AckOutcome::Failed => Acknowledgement::failure(FAILURE_TEXT),
        };
        let group = interaction.group_id.clone();
        queue.enqueue(ACK_QUEUE, group.as_str(), async move {
            bot.acknowledge(&interaction, ack).await
        });
    })
}

async fn run_coordinated(
    services: Arc<Services>,
    command: Arc<dyn Command>,
    interaction: Interaction,
    guard: ExecutionGuard,
    delay: Duration,
) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let kind = command.kind();
    let ctx = CommandContext::new(services.clone(), kind, interaction.group_id.clone(), Some(guard));
    let result = run_body(command.as_ref(), &ctx, &interaction, Route::Click).await;
    ctx.report_outcome(result.is_ok());
    match result {
        Ok(ack) => {
            services.acknowledge(&interaction, ack).await;
            // Still holding the guard means no refresh carries the completion
            if let Some(guard) = ctx.take_guard() {
                let flush_delay = services.settings.flush_delay;
                if !flush_delay.is_zero() {
                    tokio::time::sleep(flush_delay).await;
                }
                guard.complete();
            }
        }
        Err(e) => {
            tracing::error!(command = %kind, session = %interaction.group_id, "Command failed: {}", e);
            services
                .acknowledge(&interaction, Acknowledgement::failure(FAILURE_TEXT))
                .await;
            if let Some(guard) = ctx.take_guard() {
                guard.fail();
            }
        }
    }
}

async fn run_direct(services: Arc<Services>, command: Arc<dyn Command>, interaction: Interaction, route: Route) {
    let kind = command.kind();
    let ctx = CommandContext::new(services.clone(), kind, interaction.group_id.clone(), None);
    let ack = match run_body(command.as_ref(), &ctx, &interaction, route).await {
        Ok(ack) => ack,
        Err(e) => {
            tracing::error!(command = %kind, session = %interaction.group_id, "Command failed: {}", e);
            Acknowledgement::failure(FAILURE_TEXT)
        }
    };
    services.acknowledge(&interaction, ack).await;
}

/// Run a command body, turning a panic into an error
async fn run_body(command: &dyn Command, ctx: &CommandContext, interaction: &Interaction, route: Route) -> CommandResult {
    let body = async {
        match route {
            Route::Click => command.execute(ctx, interaction).await,
            Route::Selection => command.execute_selection(ctx, interaction).await,
        }
    };
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(CommandError::Panicked(panic_message(payload.as_ref()))),
    }
}
