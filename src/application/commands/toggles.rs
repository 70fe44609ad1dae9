use async_trait::async_trait;

use super::{persist_and_refresh, Command, CommandContext, CommandResult};
use crate::application::services::RenderView;
use crate::domain::entities::{CommandKind, Control, Interaction, SessionFlag};
use crate::domain::traits::Acknowledgement;

/// Flip `flag`, clearing `exclusive` when the flag turned on
async fn toggle(ctx: &CommandContext, flag: SessionFlag, exclusive: Option<SessionFlag>) -> CommandResult {
    let mut session = ctx.load_session().await?;
    let enabled = session.toggle_flag(flag);
    if let (true, Some(other)) = (enabled, exclusive) {
        session.remove_flag(other);
    }
    if flag == SessionFlag::Expanded || flag == SessionFlag::Editing {
        session.normalize_offset(ctx.items_per_page());
    }
    persist_and_refresh(ctx, &session).await?;
    tracing::debug!(session = %ctx.session_id, ?flag, enabled, "Toggled session flag");
    Ok(Acknowledgement::Update)
}

/// Repeat the current item
pub struct Loop;

#[async_trait]
impl Command for Loop {
    fn kind(&self) -> CommandKind {
        CommandKind::Loop
    }

    fn description(&self) -> &'static str {
        "Repeat the current item"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        Some(
            Control::button(CommandKind::Loop, "Loop")
                .highlighted_if(view.session.has_flag(SessionFlag::Loop))
                .disabled_if(view.session.size() == 0),
        )
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        toggle(ctx, SessionFlag::Loop, Some(SessionFlag::LoopQueue)).await
    }
}

/// Send finished items to the back of the queue
pub struct LoopQueue;

#[async_trait]
impl Command for LoopQueue {
    fn kind(&self) -> CommandKind {
        CommandKind::LoopQueue
    }

    fn description(&self) -> &'static str {
        "Repeat the whole queue"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        Some(
            Control::button(CommandKind::LoopQueue, "Loop queue")
                .highlighted_if(view.session.has_flag(SessionFlag::LoopQueue))
                .disabled_if(view.session.size() == 0),
        )
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        toggle(ctx, SessionFlag::LoopQueue, Some(SessionFlag::Loop)).await
    }
}

/// Show or hide the editing controls
pub struct Edit;

#[async_trait]
impl Command for Edit {
    fn kind(&self) -> CommandKind {
        CommandKind::Edit
    }

    fn description(&self) -> &'static str {
        "Show or hide the queue editing controls"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected {
            return None;
        }
        Some(Control::button(CommandKind::Edit, "Edit").highlighted_if(view.session.has_flag(SessionFlag::Editing)))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        toggle(ctx, SessionFlag::Editing, None).await
    }
}

pub struct Expand;

#[async_trait]
impl Command for Expand {
    fn kind(&self) -> CommandKind {
        CommandKind::Expand
    }

    fn description(&self) -> &'static str {
        "Show the whole queue instead of the current page"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected || !view.session.has_flag(SessionFlag::Editing) {
            return None;
        }
        Some(
            Control::button(CommandKind::Expand, "Expand")
                .highlighted_if(view.session.has_flag(SessionFlag::Expanded))
                .disabled_if(view.session.size() < 2),
        )
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        toggle(ctx, SessionFlag::Expanded, None).await
    }
}
