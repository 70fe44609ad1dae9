use std::fmt;
use std::str::FromStr;

use super::SessionId;

/// Stable identity of a class of command.
///
/// The catalog is a closed set; variants are listed in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    Join,
    PageBackward,
    PageForward,
    Loop,
    LoopQueue,
    Pause,
    Replay,
    Skip,
    Stop,
    Edit,
    Shuffle,
    Forward,
    Clear,
    Expand,
    Resend,
    Remove,
    Play,
    Help,
}

impl CommandKind {
    pub const ALL: [CommandKind; 18] = [
        CommandKind::Join,
        CommandKind::PageBackward,
        CommandKind::PageForward,
        CommandKind::Loop,
        CommandKind::LoopQueue,
        CommandKind::Pause,
        CommandKind::Replay,
        CommandKind::Skip,
        CommandKind::Stop,
        CommandKind::Edit,
        CommandKind::Shuffle,
        CommandKind::Forward,
        CommandKind::Clear,
        CommandKind::Expand,
        CommandKind::Resend,
        CommandKind::Remove,
        CommandKind::Play,
        CommandKind::Help,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Join => "join",
            CommandKind::PageBackward => "page-backward",
            CommandKind::PageForward => "page-forward",
            CommandKind::Loop => "loop",
            CommandKind::LoopQueue => "loop-queue",
            CommandKind::Pause => "pause",
            CommandKind::Replay => "replay",
            CommandKind::Skip => "skip",
            CommandKind::Stop => "stop",
            CommandKind::Edit => "edit",
            CommandKind::Shuffle => "shuffle",
            CommandKind::Forward => "forward",
            CommandKind::Clear => "clear",
            CommandKind::Expand => "expand",
            CommandKind::Resend => "resend",
            CommandKind::Remove => "remove",
            CommandKind::Play => "play",
            CommandKind::Help => "help",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| format!("unknown command kind: {}", s))
    }
}

/// Coordination key: one in-flight execution per command kind and session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub kind: CommandKind,
    pub session_id: SessionId,
}

impl CommandKey {
    pub fn new(kind: CommandKind, session_id: SessionId) -> Self {
        Self { kind, session_id }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlStyle {
    Primary,
    #[default]
    Secondary,
    Success,
}

/// Separator between the command kind and the unique suffix of a custom id
pub const CUSTOM_ID_SEPARATOR: &str = "||";

/// A rendered UI control (button or dropdown) bound to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub kind: CommandKind,
    pub custom_id: String,
    pub label: String,
    pub style: ControlStyle,
    pub disabled: bool,
    pub options: Vec<MenuOption>,
}

/// A single option of a dropdown control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

impl Control {
    pub fn button(kind: CommandKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            custom_id: format!("{}{}{}", kind, CUSTOM_ID_SEPARATOR, uuid::Uuid::new_v4()),
            label: label.into(),
            style: ControlStyle::Secondary,
            disabled: false,
            options: Vec::new(),
        }
    }

    pub fn menu(kind: CommandKind, placeholder: impl Into<String>, options: Vec<MenuOption>) -> Self {
        let mut control = Self::button(kind, placeholder);
        control.options = options;
        control
    }

    pub fn with_style(mut self, style: ControlStyle) -> Self {
        self.style = style;
        self
    }

    pub fn highlighted_if(self, on: bool) -> Self {
        if on {
            self.with_style(ControlStyle::Success)
        } else {
            self
        }
    }

    pub fn disabled_if(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn is_menu(&self) -> bool {
        !self.options.is_empty()
    }

    /// Extract the command kind prefix from a delivered custom id
    pub fn kind_of(custom_id: &str) -> Option<CommandKind> {
        custom_id
            .split(CUSTOM_ID_SEPARATOR)
            .next()
            .and_then(|prefix| prefix.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.as_str().parse::<CommandKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_custom_id_carries_kind() {
        let control = Control::button(CommandKind::Remove, "Remove");
        assert_eq!(Control::kind_of(&control.custom_id), Some(CommandKind::Remove));
        assert_eq!(Control::kind_of("nonsense||abc"), None);
    }
}
