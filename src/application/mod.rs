//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Coordination: keyed queue, in-flight tracking, session resources
//! - Commands: the catalog of user-triggerable actions
//! - Services: shared collaborators, status and session lifecycle
//! - Messaging: guard chain, parsing, dispatching
//! - Errors: domain-specific errors

pub mod commands;
pub mod coordination;
pub mod errors;
pub mod messaging;
pub mod services;
