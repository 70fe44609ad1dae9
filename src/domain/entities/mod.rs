//! Domain entities - Core business objects with no external dependencies

pub mod session;
pub mod interaction;
pub mod command;

pub use session::{Item, Session, SessionFlag, SessionId, DEFAULT_ITEMS_PER_PAGE};
pub use interaction::{ComponentRef, Interaction, InteractionKind, PlatformEvent};
pub use command::{CommandKey, CommandKind, Control, ControlStyle, MenuOption, CUSTOM_ID_SEPARATOR};
