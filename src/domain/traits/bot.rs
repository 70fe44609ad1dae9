use async_trait::async_trait;
use crate::domain::entities::{Control, Interaction, Session};
use crate::application::errors::BotError;

/// Bot trait - abstraction for the chat platform client
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot and begin delivering events
    async fn start(&self) -> Result<(), BotError>;

    /// Send a plain message to a channel
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    /// Acknowledge an interaction.
    ///
    /// Duplicate acknowledgements are the platform's concern.
    async fn acknowledge(&self, interaction: &Interaction, ack: Acknowledgement) -> Result<(), BotError>;

    /// Re-render the session's status message with the given control rows.
    ///
    /// Posts a new message when `session.message_id` is unset. Returns the id
    /// of the status message, which also identifies the thread opened on it.
    async fn update_status(&self, session: &Session, rows: Vec<Vec<Control>>) -> Result<String, BotError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// How an interaction is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Silent acknowledgement; the status message carries the result
    Update,
    /// A reply visible in the channel, or only to the user when `ephemeral`
    Reply { content: String, ephemeral: bool },
    /// The triggering command failed
    Failure { content: String },
}

impl Acknowledgement {
    pub fn reply(content: impl Into<String>) -> Self {
        Acknowledgement::Reply {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Acknowledgement::Reply {
            content: content.into(),
            ephemeral: true,
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Acknowledgement::Failure {
            content: content.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Acknowledgement::Failure { .. })
    }
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
