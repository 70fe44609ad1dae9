use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{persist_and_refresh, Command, CommandContext, CommandResult};
use crate::application::errors::CommandError;
use crate::application::services::{RenderView, Services, SessionService, StatusService};
use crate::domain::entities::{CommandKind, Control, ControlStyle, Interaction, Item, SessionFlag, SessionId};
use crate::domain::traits::Acknowledgement;

/// Connect the session to its voice channel
pub struct Join;

#[async_trait]
impl Command for Join {
    fn kind(&self) -> CommandKind {
        CommandKind::Join
    }

    fn description(&self) -> &'static str {
        "Connect to the voice channel and start playing"
    }

    fn debounce(&self) -> Option<Duration> {
        Some(Duration::from_millis(300))
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if view.connected {
            return None;
        }
        Some(Control::button(CommandKind::Join, "Join").with_style(ControlStyle::Primary))
    }

    // The button vanishes as soon as the first click connects, later clicks
    // of the same burst still have to land here.
    fn match_control(&self, _view: &RenderView<'_>) -> Option<Control> {
        Some(Control::button(CommandKind::Join, "Join"))
    }

    async fn execute(&self, ctx: &CommandContext, interaction: &Interaction) -> CommandResult {
        let session = ctx.load_session().await?;
        if ctx.resources().connection(&ctx.session_id).is_some() {
            return Ok(Acknowledgement::Update);
        }

        let channel_id = interaction.channel_id.as_deref().unwrap_or(&session.channel_id);
        let (connection, player) = ctx
            .services()
            .voice
            .connect(&ctx.session_id, channel_id)
            .await
            .map_err(|e| CommandError::ExecutionFailed(format!("could not join: {}", e)))?;

        if let Some(head) = session.head() {
            player.play(head);
        }
        let resources = ctx.resources();
        resources.set_connection(&ctx.session_id, Some(connection));
        resources.set_player(&ctx.session_id, Some(player));
        resources.set_already_refreshed(&ctx.session_id, false);
        tracing::info!(session = %ctx.session_id, channel = channel_id, "Joined voice channel");

        ctx.refresh_status();
        Ok(Acknowledgement::Update)
    }
}

/// Toggle between paused and playing
pub struct Pause;

#[async_trait]
impl Command for Pause {
    fn kind(&self) -> CommandKind {
        CommandKind::Pause
    }

    fn description(&self) -> &'static str {
        "Pause or resume playback"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        Some(
            Control::button(CommandKind::Pause, "Pause")
                .highlighted_if(view.is_paused())
                .disabled_if(view.session.size() == 0),
        )
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let player = ctx.player().ok_or(CommandError::NotConnected)?;
        if player.is_paused() {
            player.resume();
        } else {
            player.pause();
        }
        ctx.refresh_status();
        Ok(Acknowledgement::Update)
    }
}

/// Restart the current item from the beginning
pub struct Replay;

#[async_trait]
impl Command for Replay {
    fn kind(&self) -> CommandKind {
        CommandKind::Replay
    }

    fn description(&self) -> &'static str {
        "Play the current item again from the start"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        Some(Control::button(CommandKind::Replay, "Replay").disabled_if(view.session.size() == 0 || view.is_paused()))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let Some(player) = ctx.player() else {
            return Ok(Acknowledgement::Update);
        };
        if player.is_paused() {
            return Ok(Acknowledgement::Update);
        }

        let session = ctx.load_session().await?;
        let Some(head) = session.head() else {
            return Ok(Acknowledgement::Update);
        };
        player.halt();
        player.play(head);
        tracing::debug!(session = %ctx.session_id, item = %head.title, "Replaying item");
        ctx.refresh_status();
        Ok(Acknowledgement::Update)
    }
}

/// Move on to the next item
pub struct Skip;

#[async_trait]
impl Command for Skip {
    fn kind(&self) -> CommandKind {
        CommandKind::Skip
    }

    fn description(&self) -> &'static str {
        "Skip the current item"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        Some(Control::button(CommandKind::Skip, "Skip").disabled_if(view.session.size() == 0 || view.is_paused()))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let player = ctx.player().ok_or(CommandError::NotConnected)?;
        if player.is_paused() {
            return Ok(Acknowledgement::Update);
        }

        let mut session = ctx.load_session().await?;
        match session.advance() {
            Some(next) => player.play(next),
            None => player.halt(),
        }
        session.normalize_offset(ctx.items_per_page());
        persist_and_refresh(ctx, &session).await?;
        Ok(Acknowledgement::Update)
    }
}

/// Destroy the session after a confirming second click
pub struct Stop;

#[async_trait]
impl Command for Stop {
    fn kind(&self) -> CommandKind {
        CommandKind::Stop
    }

    fn description(&self) -> &'static str {
        "Stop playback and close the session"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        let style = if view.session.has_flag(SessionFlag::StopRequest) {
            ControlStyle::Primary
        } else {
            ControlStyle::Secondary
        };
        Some(Control::button(CommandKind::Stop, "Stop").with_style(style))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let mut session = ctx.load_session().await?;
        if session.has_flag(SessionFlag::StopRequest) {
            let titles = list_titles(&session.items);
            SessionService::new(ctx.services().clone())
                .destroy(&ctx.session_id, None)
                .await
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
            if titles.is_empty() {
                return Ok(Acknowledgement::ephemeral("Stopped."));
            }
            return Ok(Acknowledgement::ephemeral(format!("Stopped. The queue was:\n{}", titles)));
        }

        session.set_flag(SessionFlag::StopRequest);
        persist_and_refresh(ctx, &session).await?;
        let window = ctx.services().settings.confirm_window;
        let services = ctx.services().clone();
        let session_id = ctx.session_id.clone();
        ctx.schedule(window, async move {
            expire_request(services, session_id, SessionFlag::StopRequest).await;
        });
        Ok(Acknowledgement::ephemeral("Click Stop again to confirm."))
    }
}

/// Append items to the session; slash only
pub struct Play;

#[async_trait]
impl Command for Play {
    fn kind(&self) -> CommandKind {
        CommandKind::Play
    }

    fn description(&self) -> &'static str {
        "Add items to the queue: /play <title or url>..."
    }

    async fn execute(&self, ctx: &CommandContext, interaction: &Interaction) -> CommandResult {
        let items: Vec<Item> = interaction
            .values
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(parse_item)
            .collect();
        if items.is_empty() {
            return Err(CommandError::InvalidArgs("nothing to play".to_string()));
        }

        let mut session = ctx.load_session().await?;
        let was_empty = session.size() == 0;
        let added = items.len();
        session.items.extend(items);

        if was_empty {
            if let (Some(player), Some(head)) = (ctx.player(), session.head()) {
                player.play(head);
            }
        }
        persist_and_refresh(ctx, &session).await?;
        tracing::debug!(session = %ctx.session_id, added, "Queued items");
        Ok(Acknowledgement::ephemeral(format!("Queued {} item(s).", added)))
    }
}

fn parse_item(value: &str) -> Item {
    if value.starts_with("http://") || value.starts_with("https://") {
        Item::new(value).with_url(value)
    } else {
        Item::new(value)
    }
}

pub(crate) fn list_titles(items: &[Item]) -> String {
    items
        .iter()
        .map(|item| format!("`{}`", item.title))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop an unconfirmed request flag once its window elapsed
pub(crate) async fn expire_request(services: Arc<Services>, session_id: SessionId, flag: SessionFlag) {
    let mut session = match services.store.find_session(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(session = %session_id, ?flag, "Could not expire request: {}", e);
            return;
        }
    };
    if !session.has_flag(flag) {
        return;
    }
    session.remove_flag(flag);
    if let Err(e) = services.store.save_session(&session).await {
        tracing::warn!(session = %session_id, ?flag, "Could not expire request: {}", e);
        return;
    }
    tracing::debug!(session = %session_id, ?flag, "Request expired unconfirmed");
    StatusService::new(services).refresh(&session_id, None);
}
