use chrono::{DateTime, Utc};

use super::SessionId;

/// Kind of inbound interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionKind {
    /// A button press on the status message
    Button,
    /// A selection on a dropdown menu; `values` carries the chosen options
    SelectMenu,
    /// A slash invocation such as `/start`
    Slash { name: String },
}

impl InteractionKind {
    pub fn as_str(&self) -> &str {
        match self {
            InteractionKind::Button => "button",
            InteractionKind::SelectMenu => "select-menu",
            InteractionKind::Slash { .. } => "slash",
        }
    }
}

/// The control a user interacted with, as delivered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentRef {
    pub custom_id: String,
    pub label: Option<String>,
}

impl ComponentRef {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            custom_id: String::new(),
            label: Some(label.into()),
        }
    }

    pub fn with_custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = custom_id.into();
        self
    }
}

/// An interaction record delivered by the chat platform
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: String,
    pub group_id: SessionId,
    pub channel_id: Option<String>,
    pub user_id: String,
    pub member_roles: Vec<String>,
    pub kind: InteractionKind,
    pub component: ComponentRef,
    pub values: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl Interaction {
    pub fn new(group_id: impl Into<SessionId>, user_id: impl Into<String>, kind: InteractionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group_id.into(),
            channel_id: None,
            user_id: user_id.into(),
            member_roles: Vec::new(),
            kind,
            component: ComponentRef::default(),
            values: Vec::new(),
            received_at: Utc::now(),
        }
    }

    pub fn button(group_id: impl Into<SessionId>, user_id: impl Into<String>, label: impl Into<String>) -> Self {
        let mut interaction = Self::new(group_id, user_id, InteractionKind::Button);
        interaction.component = ComponentRef::labelled(label);
        interaction
    }

    pub fn select_menu(
        group_id: impl Into<SessionId>,
        user_id: impl Into<String>,
        custom_id: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        let mut interaction = Self::new(group_id, user_id, InteractionKind::SelectMenu);
        interaction.component = ComponentRef::default().with_custom_id(custom_id);
        interaction.values = values;
        interaction
    }

    pub fn slash(
        group_id: impl Into<SessionId>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        let mut interaction = Self::new(group_id, user_id, InteractionKind::Slash { name: name.into() });
        interaction.values = args;
        interaction
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.member_roles = roles;
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.component.label.as_deref()
    }
}

/// Platform events other than interactions that the engine reacts to
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// The client finished connecting; stored sessions should be reconciled
    Ready,
    Interaction(Interaction),
    /// A thread owned by the bot was deleted
    ThreadDeleted { group_id: SessionId, thread_id: String },
}
