//! Domain layer - Core business types with no platform dependencies
//! 
//! This layer contains:
//! - Entities: Sessions, interactions, command kinds and rendered controls
//! - Traits: Abstractions for the collaborators (Bot, SessionStore, media)

pub mod entities;
pub mod traits;
