//! cadence-bot - interaction coordination engine for collaborative chat bots
//!
//! Users share per-group sessions and drive them by clicking controls on a
//! status message. Rapid repeated clicks of the same control are debounced
//! into one execution; every click is still acknowledged exactly once.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{Command, CommandCatalog, CommandContext};
pub use application::errors::{BotError, CommandError, ConfigError, StorageError};
pub use application::messaging::{DispatchOutcome, DropReason, InteractionDispatcher};
pub use application::services::{EngineSettings, Services};
