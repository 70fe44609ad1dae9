//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::application::messaging::InteractionParser;
use crate::domain::entities::{Control, ControlStyle, Interaction, PlatformEvent, Session, SessionFlag, DEFAULT_ITEMS_PER_PAGE};
use crate::domain::traits::{Acknowledgement, Bot, BotInfo};

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    items_per_page: usize,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: name.into(),
                username: "console".to_string(),
            },
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }

    pub fn with_items_per_page(mut self, items_per_page: usize) -> Self {
        self.items_per_page = items_per_page;
        self
    }

    /// Read stdin line by line, forwarding parsed events until EOF or `quit`
    pub async fn read_events(parser: InteractionParser, events: mpsc::Sender<PlatformEvent>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if matches!(line.trim(), "quit" | "exit") {
                break;
            }
            match parser.parse(&line) {
                Ok(Some(event)) => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("[console] {}", e),
            }
        }
    }

    /// Text rendering of a session's status message
    pub fn render_status(&self, session: &Session, rows: &[Vec<Control>]) -> String {
        let mut out = format!("== {} ==\n", session.session_id);
        match session.head() {
            Some(head) => out.push_str(&format!("Now: {}\n", head)),
            None => out.push_str("Nothing queued\n"),
        }

        let upcoming = if session.has_flag(SessionFlag::Expanded) {
            session.items.get(1..).unwrap_or_default()
        } else {
            session.page(self.items_per_page)
        };
        let first = if session.has_flag(SessionFlag::Expanded) {
            1
        } else {
            session.offset + 1
        };
        for (i, item) in upcoming.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", first + i, item));
        }

        if !session.flags.is_empty() {
            let flags: Vec<String> = session.flags.iter().map(|f| format!("{:?}", f)).collect();
            out.push_str(&format!("Flags: {}\n", flags.join(", ")));
        }

        for row in rows {
            let rendered: Vec<String> = row.iter().map(render_control).collect();
            out.push_str(&rendered.join(" "));
            out.push('\n');
        }
        out
    }
}

fn render_control(control: &Control) -> String {
    if control.is_menu() {
        let options: Vec<String> = control
            .options
            .iter()
            .map(|o| format!("{}={}", o.value, o.label))
            .collect();
        return format!("<select {}: {}>", control.kind, options.join(" | "));
    }
    let label = match control.style {
        ControlStyle::Primary => format!("*{}*", control.label),
        ControlStyle::Success => format!("+{}+", control.label),
        ControlStyle::Secondary => control.label.clone(),
    };
    if control.disabled {
        format!("({})", label)
    } else {
        format!("[{}]", label)
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new("cadence-bot")
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        Ok(())
    }

    async fn send_message(&self, _channel_id: &str, text: &str) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        Ok("console_msg".to_string())
    }

    async fn acknowledge(&self, interaction: &Interaction, ack: Acknowledgement) -> Result<(), BotError> {
        match ack {
            Acknowledgement::Update => {
                tracing::debug!(interaction = %interaction.id, "Acknowledged");
            }
            Acknowledgement::Reply { content, ephemeral } => {
                let scope = if ephemeral { interaction.user_id.as_str() } else { "all" };
                println!("[BOT -> {}] {}", scope, content);
            }
            Acknowledgement::Failure { content } => {
                println!("[BOT -> {}] ! {}", interaction.user_id, content);
            }
        }
        Ok(())
    }

    async fn update_status(&self, session: &Session, rows: Vec<Vec<Control>>) -> Result<String, BotError> {
        let message_id = session
            .message_id
            .clone()
            .unwrap_or_else(|| format!("status-{}", uuid::Uuid::new_v4()));
        print!("{}", self.render_status(session, &rows));
        Ok(message_id)
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), BotError> {
        tracing::debug!(channel = channel_id, message = message_id, "Deleted message");
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
