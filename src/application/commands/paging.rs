use async_trait::async_trait;
use std::time::Duration;

use super::{persist_and_refresh, Command, CommandContext, CommandResult};
use crate::application::services::RenderView;
use crate::domain::entities::{CommandKind, Control, Interaction};
use crate::domain::traits::Acknowledgement;

pub struct PageBackward;

#[async_trait]
impl Command for PageBackward {
    fn kind(&self) -> CommandKind {
        CommandKind::PageBackward
    }

    fn description(&self) -> &'static str {
        "Show the previous page of the queue"
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected || !view.session.can_page_forward(view.items_per_page) {
            return None;
        }
        Some(Control::button(CommandKind::PageBackward, "<").disabled_if(!view.session.can_page_backward()))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let mut session = ctx.load_session().await?;
        if session.page_backward(ctx.items_per_page()) {
            persist_and_refresh(ctx, &session).await?;
        }
        Ok(Acknowledgement::Update)
    }
}

pub struct PageForward;

#[async_trait]
impl Command for PageForward {
    fn kind(&self) -> CommandKind {
        CommandKind::PageForward
    }

    fn description(&self) -> &'static str {
        "Show the next page of the queue"
    }

    fn debounce(&self) -> Option<Duration> {
        Some(Duration::from_millis(100))
    }

    fn control(&self, view: &RenderView<'_>) -> Option<Control> {
        if !view.connected || !view.session.can_page_forward(view.items_per_page) {
            return None;
        }
        Some(Control::button(CommandKind::PageForward, ">"))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let mut session = ctx.load_session().await?;
        if session.page_forward(ctx.items_per_page()) {
            persist_and_refresh(ctx, &session).await?;
        }
        Ok(Acknowledgement::Update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Item, Session};

    fn session_with(count: usize) -> Session {
        Session::new("guild", "channel").with_items((0..count).map(|i| Item::new(format!("item {}", i))))
    }

    fn view(session: &Session) -> RenderView<'_> {
        RenderView {
            session,
            connected: true,
            player: None,
            items_per_page: 3,
        }
    }

    #[test]
    fn test_paging_hidden_when_everything_fits() {
        let session = session_with(4);
        assert!(PageForward.control(&view(&session)).is_none());
        assert!(PageBackward.control(&view(&session)).is_none());
    }

    #[test]
    fn test_page_backward_disabled_on_first_page() {
        let mut session = session_with(5);
        assert!(PageBackward.control(&view(&session)).unwrap().disabled);

        session.page_forward(3);
        assert!(!PageBackward.control(&view(&session)).unwrap().disabled);
        assert_eq!(PageForward.control(&view(&session)).unwrap().label, ">");
    }
}
