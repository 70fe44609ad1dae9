//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Session persistence
//! - Adapters: Platform integrations (console)
//! - Media: Voice gateway implementations

pub mod adapters;
pub mod config;
pub mod media;
pub mod storage;
