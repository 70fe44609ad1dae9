//! Interaction parser - turns console lines into platform events
//!
//! Line grammar:
//! - `ready` reconciles stored sessions
//! - `/name args...` is a slash invocation (`/start`, `/play`, ...)
//! - `select <command> <value>...` picks options on a command's dropdown
//! - `delete-thread <thread>` reports a deleted thread
//! - `@group <line>` targets another group for that line
//! - anything else clicks the button with that label

use crate::application::errors::BotError;
use crate::domain::entities::{CommandKind, Interaction, PlatformEvent, SessionId, CUSTOM_ID_SEPARATOR};

pub struct InteractionParser {
    group_id: SessionId,
    user_id: String,
    channel_id: String,
    roles: Vec<String>,
}

impl InteractionParser {
    pub fn new(group_id: impl Into<SessionId>, user_id: impl Into<String>) -> Self {
        let group_id = group_id.into();
        Self {
            channel_id: group_id.to_string(),
            group_id,
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Parse one line; blank lines yield `None`
    pub fn parse(&self, line: &str) -> Result<Option<PlatformEvent>, BotError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (group, line) = match line.strip_prefix('@') {
            Some(rest) => {
                let (group, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                (SessionId::new(group), rest.trim())
            }
            None => (self.group_id.clone(), line),
        };
        if line.is_empty() {
            return Err(BotError::Parse("nothing to send".to_string()));
        }

        let mut words = line.split_whitespace();
        let event = match words.next() {
            Some("ready") => PlatformEvent::Ready,
            Some("delete-thread") => {
                let thread_id = words
                    .next()
                    .ok_or_else(|| BotError::Parse("delete-thread needs a thread id".to_string()))?;
                PlatformEvent::ThreadDeleted {
                    group_id: group,
                    thread_id: thread_id.to_string(),
                }
            }
            Some("select") => {
                let kind: CommandKind = words
                    .next()
                    .ok_or_else(|| BotError::Parse("select needs a command".to_string()))?
                    .parse()
                    .map_err(|_| BotError::Parse(format!("unknown command in: {}", line)))?;
                let custom_id = format!("{}{}console", kind, CUSTOM_ID_SEPARATOR);
                let values = words.map(str::to_string).collect();
                self.wrap(Interaction::select_menu(group, self.user_id.as_str(), custom_id, values))
            }
            Some(word) if word.starts_with('/') => {
                let name = word.trim_start_matches('/');
                if name.is_empty() {
                    return Err(BotError::Parse("missing command name".to_string()));
                }
                let args = words.map(str::to_string).collect();
                self.wrap(Interaction::slash(group, self.user_id.as_str(), name, args))
            }
            _ => self.wrap(Interaction::button(group, self.user_id.as_str(), line)),
        };
        Ok(Some(event))
    }

    fn wrap(&self, interaction: Interaction) -> PlatformEvent {
        PlatformEvent::Interaction(
            interaction
                .with_channel(self.channel_id.as_str())
                .with_roles(self.roles.clone()),
        )
    }
}
