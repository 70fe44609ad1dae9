use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::playback::{expire_request, list_titles};
use std::time::Duration;

use super::{persist_and_refresh, Command, CommandContext, CommandResult};
use crate::application::errors::CommandError;
use crate::application::services::RenderView;
use crate::domain::entities::{CommandKind, Control, ControlStyle, Interaction, Item, MenuOption, SessionFlag};
use crate::domain::traits::Acknowledgement;

/// Most options a dropdown may carry
const MAX_MENU_OPTIONS: usize = 25;

/// How long the replaced status message lingers after a resend
const RESEND_DELETE_DELAY: Duration = Duration::from_millis(300);

fn editing(view: &RenderView<'_>) -> bool {
    view.connected && view.session.has_flag(SessionFlag::Editing)
}

/// Dropdown options for the visible page, valued by absolute item index
fn page_options(view: &RenderView<'_>) -> Vec<MenuOption> {
    let session = view.session;
    let first = session.offset.min(session.size().saturating_sub(1)) + 1;
    session
        .page(view.items_per_page)
        .iter()
        .take(MAX_MENU_OPTIONS)
        .enumerate()
        .map(|(i, item)| MenuOption {
            label: format!("{}. {}", first + i, item.title),
            value: (first + i).to_string(),
        })
        .collect()
}

fn parse_indexes(values: &[String]) -> Result<Vec<usize>, CommandError> {
    values
        .iter()
        .map(|value| {
            value
                .parse::<usize>()
                .map_err(|_| CommandError::InvalidArgs(format!("not an item index: {}", value)))
        })
        .collect()
}

/// Shuffle every item after the head
pub struct Shuffle;

#[async_trait]
impl Command for Shuffle {
    fn kind(&self) -> CommandKind {
        CommandKind::Shuffle
    }

    fn description(&self) -> &'static str {
        "Shuffle the upcoming items"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !editing(view) {
            return None;
        }
        Some(Control::button(CommandKind::Shuffle, "Shuffle").disabled_if(view.session.size() < 3))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let mut session = ctx.load_session().await?;
        if session.size() < 3 {
            return Ok(Acknowledgement::Update);
        }
        session.items[1..].shuffle(&mut rand::thread_rng());
        persist_and_refresh(ctx, &session).await?;
        Ok(Acknowledgement::Update)
    }
}

/// Move items picked from a dropdown of the current page up next
pub struct Forward;

#[async_trait]
impl Command for Forward {
    fn kind(&self) -> CommandKind {
        CommandKind::Forward
    }

    fn description(&self) -> &'static str {
        "Move selected items to the front of the queue"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !editing(view) || view.session.size() < 3 {
            return None;
        }
        let options = page_options(view);
        if options.is_empty() {
            return None;
        }
        Some(Control::menu(CommandKind::Forward, "Play next", options))
    }

    async fn execute(&self, _ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        Ok(Acknowledgement::ephemeral("Pick the items to play next from the dropdown."))
    }

    async fn execute_selection(&self, ctx: &CommandContext, interaction: &Interaction) -> CommandResult {
        let indexes = parse_indexes(&interaction.values)?;
        let mut session = ctx.load_session().await?;

        // Selection order is the order they will play in
        let mut picked: Vec<usize> = Vec::new();
        for index in indexes {
            if index == 0 || index >= session.size() || picked.contains(&index) {
                continue;
            }
            picked.push(index);
        }
        if picked.is_empty() {
            return Ok(Acknowledgement::Update);
        }

        let moved: Vec<Item> = picked.iter().map(|&index| session.items[index].clone()).collect();
        picked.sort_unstable_by(|a, b| b.cmp(a));
        for index in picked {
            session.items.remove(index);
        }
        let count = moved.len();
        session.items.splice(1..1, moved);
        session.normalize_offset(ctx.items_per_page());
        persist_and_refresh(ctx, &session).await?;
        tracing::debug!(session = %ctx.session_id, count, "Moved items forward");
        Ok(Acknowledgement::Update)
    }
}

/// Post a fresh status message and delete the old one
pub struct Resend;

#[async_trait]
impl Command for Resend {
    fn kind(&self) -> CommandKind {
        CommandKind::Resend
    }

    fn description(&self) -> &'static str {
        "Post the status message again at the bottom of the channel"
    }

    fn always_execute(&self) -> bool {
        true
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !editing(view) {
            return None;
        }
        Some(Control::button(CommandKind::Resend, "Resend"))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let mut session = ctx.load_session().await?;
        let previous = session.message_id.take();
        session.thread_id = None;
        persist_and_refresh(ctx, &session).await?;

        if let Some(message_id) = previous {
            tracing::debug!(session = %ctx.session_id, message = %message_id, "Resending status message");
            let bot = ctx.services().bot.clone();
            let channel_id = session.channel_id.clone();
            ctx.schedule(RESEND_DELETE_DELAY, async move {
                if let Err(e) = bot.delete_message(&channel_id, &message_id).await {
                    tracing::warn!(message = %message_id, "Could not delete old status message: {}", e);
                }
            });
        }
        Ok(Acknowledgement::Update)
    }
}

/// Drop every item after the head after a confirming second click
pub struct Clear;

#[async_trait]
impl Command for Clear {
    fn kind(&self) -> CommandKind {
        CommandKind::Clear
    }

    fn description(&self) -> &'static str {
        "Remove every upcoming item"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !editing(view) {
            return None;
        }
        let style = if view.session.has_flag(SessionFlag::ClearRequest) {
            ControlStyle::Primary
        } else {
            ControlStyle::Secondary
        };
        Some(
            Control::button(CommandKind::Clear, "Clear")
                .with_style(style)
                .disabled_if(view.session.size() < 2),
        )
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let mut session = ctx.load_session().await?;
        if session.has_flag(SessionFlag::ClearRequest) {
            session.remove_flag(SessionFlag::ClearRequest);
            let keep = session.items.len().min(1);
            let removed: Vec<_> = session.items.drain(keep..).collect();
            session.offset = 0;
            persist_and_refresh(ctx, &session).await?;
            tracing::info!(session = %ctx.session_id, removed = removed.len(), "Cleared queue");
            return Ok(Acknowledgement::ephemeral(format!("Cleared:\n{}", list_titles(&removed))));
        }

        session.set_flag(SessionFlag::ClearRequest);
        persist_and_refresh(ctx, &session).await?;
        let services = ctx.services().clone();
        let session_id = ctx.session_id.clone();
        ctx.schedule(ctx.services().settings.confirm_window, async move {
            expire_request(services, session_id, SessionFlag::ClearRequest).await;
        });
        Ok(Acknowledgement::ephemeral("Click Clear again to confirm."))
    }
}

/// Remove items picked from a dropdown of the current page
pub struct Remove;

#[async_trait]
impl Command for Remove {
    fn kind(&self) -> CommandKind {
        CommandKind::Remove
    }

    fn description(&self) -> &'static str {
        "Remove selected items from the queue"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !editing(view) {
            return None;
        }
        let options = page_options(view);
        if options.is_empty() {
            return None;
        }
        Some(Control::menu(CommandKind::Remove, "Remove items", options))
    }

    async fn execute(&self, _ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        Ok(Acknowledgement::ephemeral("Pick the items to remove from the dropdown."))
    }

    async fn execute_selection(&self, ctx: &CommandContext, interaction: &Interaction) -> CommandResult {
        let mut indexes = parse_indexes(&interaction.values)?;
        indexes.sort_unstable_by(|a, b| b.cmp(a));
        indexes.dedup();

        let mut session = ctx.load_session().await?;
        let mut removed = 0;
        for index in indexes {
            // The head is playing and stays put
            if index == 0 || index >= session.size() {
                continue;
            }
            session.items.remove(index);
            removed += 1;
        }
        if removed == 0 {
            return Ok(Acknowledgement::Update);
        }
        session.normalize_offset(ctx.items_per_page());
        persist_and_refresh(ctx, &session).await?;
        tracing::debug!(session = %ctx.session_id, removed, "Removed items");
        Ok(Acknowledgement::Update)
    }
}
