use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};
use crate::application::services::RenderView;
use crate::domain::entities::{CommandKind, Control, Interaction};
use crate::domain::traits::Acknowledgement;

/// List every command; stateless, so it always executes
pub struct Help;

#[async_trait]
impl Command for Help {
    fn kind(&self) -> CommandKind {
        CommandKind::Help
    }

    fn description(&self) -> &'static str {
        "Show this help"
    }

    fn always_execute(&self) -> bool {
        true
    }

    fn control(&self, _view: &RenderView<'_>) -> Option<Control> {
        Some(Control::button(CommandKind::Help, "Help"))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        let lines: Vec<String> = ctx
            .services()
            .catalog
            .iter()
            .map(|command| format!("{} - {}", command.kind(), command.description()))
            .collect();
        Ok(Acknowledgement::ephemeral(format!("Available commands:\n{}", lines.join("\n"))))
    }
}
